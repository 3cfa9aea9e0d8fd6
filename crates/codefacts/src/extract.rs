//! Unit extraction entry point: parse, walk, verify, serialize.
//!
//! Verification runs over the finished stream before anything is handed to
//! the caller. A violated invariant means an extractor bug, not bad input,
//! and surfaces as [`ExtractError::InvariantViolation`] rather than a
//! corrupt stream.

use std::collections::HashSet;

use crate::classpath::TypeIndex;
use crate::emit::{emit_unit, format_fact, FactSink};
use crate::parse::parse_unit;
use crate::walker::walk_unit;
use crate::{ExtractError, Fact, RelationKind, Result};

/// The complete fact stream of one compilation unit, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFacts {
    pub facts: Vec<Fact>,
}

impl UnitFacts {
    /// Canonical serialized lines, one per fact.
    pub fn lines(&self) -> Vec<String> {
        self.facts.iter().map(format_fact).collect()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

/// Extract the fact stream for one compilation unit.
///
/// The unit resolves against `index` only; units never see each other, so
/// extraction order cannot influence any stream.
pub fn extract_unit(source: &str, index: &dyn TypeIndex) -> Result<UnitFacts> {
    let unit = parse_unit(source)?;
    let facts = walk_unit(&unit, source, index);
    verify_stream(&facts)?;
    Ok(UnitFacts { facts })
}

/// Extract one unit and serialize it straight into a sink.
pub fn extract_unit_to_sink(
    source: &str,
    index: &dyn TypeIndex,
    sink: &mut dyn FactSink,
) -> Result<()> {
    let unit = extract_unit(source, index)?;
    emit_unit(&unit.facts, sink)
}

/// Structural invariants every finished stream must satisfy.
fn verify_stream(facts: &[Fact]) -> Result<()> {
    let mut entities: HashSet<&str> = HashSet::new();

    // Entity FQNs are unique, and enclosing entities precede their children
    for fact in facts {
        if let Fact::Entity(entity) = fact {
            if !entities.insert(&entity.fqn) {
                return Err(ExtractError::InvariantViolation(format!(
                    "duplicate entity {}",
                    entity.fqn
                )));
            }
            if let Some(enclosing) = &entity.enclosing {
                if !entities.contains(enclosing.as_str()) {
                    return Err(ExtractError::InvariantViolation(format!(
                        "entity {} emitted before its enclosing {}",
                        entity.fqn, enclosing
                    )));
                }
            }
        }
    }

    // Every relation originates from a declared entity, and every entity
    // has exactly one INSIDE
    let mut inside_counts: std::collections::HashMap<&str, usize> =
        std::collections::HashMap::new();
    for fact in facts {
        if let Fact::Relation(relation) = fact {
            if !entities.contains(relation.source.as_str()) {
                return Err(ExtractError::InvariantViolation(format!(
                    "relation {} from undeclared source {}",
                    relation.kind.keyword(),
                    relation.source
                )));
            }
            if relation.kind == RelationKind::Inside {
                *inside_counts.entry(relation.source.as_str()).or_insert(0) += 1;
            }
        }
    }
    for entity in &entities {
        match inside_counts.get(entity).copied().unwrap_or(0) {
            1 => {}
            n => {
                return Err(ExtractError::InvariantViolation(format!(
                    "entity {} has {} INSIDE relations",
                    entity, n
                )))
            }
        }
    }

    Ok(())
}
