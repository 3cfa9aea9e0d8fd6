//! Relation collection with per-unit deduplication.
//!
//! Relations are facts, never mutated after creation. The collector
//! deduplicates on the full (kind, source, target, context) tuple and
//! preserves first-occurrence order, which is part of the external stream
//! contract.

use std::collections::HashSet;

use crate::{Reference, Relation, RelationKind};

/// Per-unit relation collector.
#[derive(Debug, Default)]
pub struct RelationCollector {
    relations: Vec<Relation>,
    seen: HashSet<Relation>,
}

impl RelationCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a relation fact. Returns false if the exact 4-tuple was
    /// already observed in this unit.
    pub fn add(
        &mut self,
        kind: RelationKind,
        source: impl Into<String>,
        target: Reference,
        context: Option<String>,
    ) -> bool {
        let relation = Relation {
            kind,
            source: source.into(),
            target,
            context,
        };
        if !self.seen.insert(relation.clone()) {
            return false;
        }
        self.relations.push(relation);
        true
    }

    /// Relations in first-observed order.
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}
