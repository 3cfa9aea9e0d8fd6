//! Canonical line-oriented serialization of the fact stream.
//!
//! The format is a regression-diff surface: one fact per line,
//! space-separated columns, byte-stable for a fixed unit and classpath.
//!
//! Entity lines have three columns: keyword, comma-joined modifiers (`-`
//! when none), FQN. Relation lines have keyword, source, target, and a
//! context column - except INSIDE, which never carries context. Absent
//! context and unresolved targets both serialize as the `-` sentinel;
//! the sentinel exists only at this boundary.

use std::io::Write;

use crate::{Entity, Fact, Reference, Relation, RelationKind, Result};

/// Serialization of an absent or unresolved column.
pub const SENTINEL: &str = "-";

/// Destination for serialized fact lines.
pub trait FactSink {
    fn accept(&mut self, line: &str) -> Result<()>;
}

/// Collecting sink for tests and in-memory consumers.
impl FactSink for Vec<String> {
    fn accept(&mut self, line: &str) -> Result<()> {
        self.push(line.to_string());
        Ok(())
    }
}

/// Sink writing one line per fact to any [`Write`] target.
pub struct WriteSink<W: Write> {
    inner: W,
}

impl<W: Write> WriteSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> FactSink for WriteSink<W> {
    fn accept(&mut self, line: &str) -> Result<()> {
        writeln!(self.inner, "{}", line)?;
        Ok(())
    }
}

fn format_reference(reference: &Reference) -> &str {
    match reference {
        Reference::Resolved(fqn) => fqn,
        Reference::Unresolved => SENTINEL,
    }
}

fn format_entity(entity: &Entity) -> String {
    let modifiers = if entity.modifiers.is_empty() {
        SENTINEL.to_string()
    } else {
        entity
            .modifiers
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(",")
    };
    format!("{} {} {}", entity.kind.keyword(), modifiers, entity.fqn)
}

fn format_relation(relation: &Relation) -> String {
    let target = format_reference(&relation.target);
    // INSIDE is pure containment: no context column
    if relation.kind == RelationKind::Inside {
        return format!("{} {} {}", relation.kind.keyword(), relation.source, target);
    }
    let context = relation.context.as_deref().unwrap_or(SENTINEL);
    format!(
        "{} {} {} {}",
        relation.kind.keyword(),
        relation.source,
        target,
        context
    )
}

/// Serialize one fact to its canonical line.
pub fn format_fact(fact: &Fact) -> String {
    match fact {
        Fact::Entity(entity) => format_entity(entity),
        Fact::Relation(relation) => format_relation(relation),
    }
}

/// Serialize a fact stream to a sink, preserving order.
pub fn emit_unit(facts: &[Fact], sink: &mut dyn FactSink) -> Result<()> {
    for fact in facts {
        sink.accept(&format_fact(fact))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntityKind, Modifier};

    fn entity(kind: EntityKind, modifiers: Vec<Modifier>, fqn: &str) -> Fact {
        Fact::Entity(Entity {
            fqn: fqn.to_string(),
            kind,
            modifiers,
            enclosing: None,
        })
    }

    fn relation(
        kind: RelationKind,
        source: &str,
        target: Reference,
        context: Option<&str>,
    ) -> Fact {
        Fact::Relation(Relation {
            kind,
            source: source.to_string(),
            target,
            context: context.map(String::from),
        })
    }

    #[test]
    fn entity_line_with_modifiers() {
        let fact = entity(
            EntityKind::Class,
            vec![Modifier::Public, Modifier::Final],
            "p.A",
        );
        assert_eq!(format_fact(&fact), "CLASS public,final p.A");
    }

    #[test]
    fn entity_line_without_modifiers_uses_sentinel() {
        let fact = entity(EntityKind::Constructor, Vec::new(), "p.A.<init>()");
        assert_eq!(format_fact(&fact), "CONSTRUCTOR - p.A.<init>()");
    }

    #[test]
    fn inside_line_has_no_context_column() {
        let fact = relation(
            RelationKind::Inside,
            "p.A",
            Reference::Resolved("p".to_string()),
            None,
        );
        assert_eq!(format_fact(&fact), "INSIDE p.A p");
    }

    #[test]
    fn relation_line_with_context() {
        let fact = relation(
            RelationKind::Extends,
            "p.B",
            Reference::Resolved("com.example.ClassType$Inner".to_string()),
            Some("ClassType.Inner"),
        );
        assert_eq!(
            format_fact(&fact),
            "EXTENDS p.B com.example.ClassType$Inner ClassType.Inner"
        );
    }

    #[test]
    fn unresolved_target_and_absent_context_serialize_as_sentinel() {
        let fact = relation(RelationKind::Calls, "p.A.<init>()", Reference::Unresolved, None);
        assert_eq!(format_fact(&fact), "CALLS p.A.<init>() - -");
    }

    #[test]
    fn vec_sink_collects_lines_in_order() {
        let facts = vec![
            entity(EntityKind::Class, vec![Modifier::Public], "p.A"),
            relation(
                RelationKind::Inside,
                "p.A",
                Reference::Resolved("p".to_string()),
                None,
            ),
        ];
        let mut lines: Vec<String> = Vec::new();
        emit_unit(&facts, &mut lines).unwrap();
        assert_eq!(lines, vec!["CLASS public p.A", "INSIDE p.A p"]);
    }

    #[test]
    fn write_sink_appends_newlines() {
        let facts = vec![entity(EntityKind::Enum, Vec::new(), "p.Color")];
        let mut sink = WriteSink::new(Vec::<u8>::new());
        emit_unit(&facts, &mut sink).unwrap();
        let bytes = sink.into_inner();
        assert_eq!(String::from_utf8(bytes).unwrap(), "ENUM - p.Color\n");
    }
}
