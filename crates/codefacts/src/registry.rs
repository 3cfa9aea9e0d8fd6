//! Entity registration and canonical FQN assignment.
//!
//! The registry is scoped to one compilation unit's extraction pass. It is
//! idempotent: registering the same declaration node twice (keyed by
//! tree-sitter node id) returns the same FQN and reports nothing new, which
//! guards re-entrant traversal such as revisiting synthetic default
//! constructors.
//!
//! FQN construction follows binary-name conventions: `$` between nested
//! types, `.` between package segments and members, erased parameter
//! signatures on methods and constructors. Anonymous and local classes get a
//! per-unit occurrence counter rather than source positions, so FQNs are
//! stable across whitespace-only edits.

use std::collections::HashMap;

use crate::{Entity, EntityKind, Modifier};

/// Outcome of a registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterOutcome {
    pub fqn: String,
    /// False when the node (or synthetic key) was already registered
    pub newly_registered: bool,
}

/// Per-unit entity registry.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    /// tree-sitter node id -> assigned FQN
    by_node: HashMap<usize, String>,
    /// synthetic key (no backing node) -> assigned FQN
    by_synthetic_key: HashMap<String, String>,
    /// FQN -> entity, for invariant verification
    entities: HashMap<String, Entity>,
    /// Entity FQNs in registration order
    order: Vec<String>,
    /// Per-unit counter for anonymous and local classes
    occurrence_counter: u32,
    /// (type FQN, initializer name) -> next ordinal
    initializer_ordinals: HashMap<(String, &'static str), u32>,
    /// "callable#name" -> occurrences seen, for shadowing locals
    local_occurrences: HashMap<String, u32>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a declaration node under a computed FQN.
    pub fn register(
        &mut self,
        node_id: usize,
        fqn: String,
        kind: EntityKind,
        modifiers: Vec<Modifier>,
        enclosing: Option<String>,
    ) -> RegisterOutcome {
        if let Some(existing) = self.by_node.get(&node_id) {
            return RegisterOutcome {
                fqn: existing.clone(),
                newly_registered: false,
            };
        }
        self.by_node.insert(node_id, fqn.clone());
        self.record(fqn, kind, modifiers, enclosing)
    }

    /// Register an entity with no backing syntax node (e.g. the synthetic
    /// default constructor of a class that declares none). Idempotent on the
    /// FQN itself.
    pub fn register_synthetic(
        &mut self,
        fqn: String,
        kind: EntityKind,
        modifiers: Vec<Modifier>,
        enclosing: Option<String>,
    ) -> RegisterOutcome {
        if let Some(existing) = self.by_synthetic_key.get(&fqn) {
            return RegisterOutcome {
                fqn: existing.clone(),
                newly_registered: false,
            };
        }
        self.by_synthetic_key.insert(fqn.clone(), fqn.clone());
        self.record(fqn, kind, modifiers, enclosing)
    }

    fn record(
        &mut self,
        fqn: String,
        kind: EntityKind,
        mut modifiers: Vec<Modifier>,
        enclosing: Option<String>,
    ) -> RegisterOutcome {
        modifiers.sort();
        modifiers.dedup();
        let entity = Entity {
            fqn: fqn.clone(),
            kind,
            modifiers,
            enclosing,
        };
        let newly = self.entities.insert(fqn.clone(), entity).is_none();
        if newly {
            self.order.push(fqn.clone());
        }
        RegisterOutcome {
            fqn,
            newly_registered: newly,
        }
    }

    pub fn is_registered(&self, fqn: &str) -> bool {
        self.entities.contains_key(fqn)
    }

    pub fn entity(&self, fqn: &str) -> Option<&Entity> {
        self.entities.get(fqn)
    }

    /// Entities in registration order.
    pub fn entities_in_order(&self) -> impl Iterator<Item = &Entity> {
        self.order.iter().filter_map(|fqn| self.entities.get(fqn))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// FQN for the next anonymous class under an enclosing type:
    /// `Outer$1`, `Outer$2`, ... in traversal order.
    pub fn next_anonymous_fqn(&mut self, enclosing_type: &str) -> String {
        self.occurrence_counter += 1;
        format!("{}${}", enclosing_type, self.occurrence_counter)
    }

    /// FQN for the next local class under an enclosing type: `Outer$1Name`.
    pub fn next_local_class_fqn(&mut self, enclosing_type: &str, name: &str) -> String {
        self.occurrence_counter += 1;
        format!("{}${}{}", enclosing_type, self.occurrence_counter, name)
    }

    /// FQN for the next initializer block of a type: `Owner.<clinit>-1` for
    /// static blocks, `Owner.<iinit>-1` for instance blocks.
    pub fn next_initializer_fqn(&mut self, owner: &str, is_static: bool) -> String {
        let name = if is_static { "<clinit>" } else { "<iinit>" };
        let ordinal = self
            .initializer_ordinals
            .entry((owner.to_string(), name))
            .or_insert(0);
        *ordinal += 1;
        format!("{}.{}-{}", owner, name, ordinal)
    }

    /// FQN for a parameter or local variable: `Callable#name`, with `#2`,
    /// `#3`... appended when the same name is re-declared (shadowing).
    pub fn next_local_fqn(&mut self, callable: &str, name: &str) -> String {
        let base = format!("{}#{}", callable, name);
        let count = self.local_occurrences.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{}#{}", base, count)
        }
    }
}

/// FQN of a member (field, enum constant) within a type.
pub fn member_fqn(owner: &str, name: &str) -> String {
    format!("{}.{}", owner, name)
}

/// FQN of a method or constructor: owner, name, erased parameter list.
pub fn callable_fqn(owner: &str, name: &str, erased_params: &[String]) -> String {
    format!("{}.{}({})", owner, name, erased_params.join(","))
}

/// FQN of a type nested directly inside another type.
pub fn nested_type_fqn(outer: &str, name: &str) -> String {
    format!("{}${}", outer, name)
}

/// FQN of a top-level type within a package.
pub fn top_level_type_fqn(package: &str, name: &str) -> String {
    format!("{}.{}", package, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_idempotent_per_node() {
        let mut registry = EntityRegistry::new();
        let first = registry.register(
            7,
            "p.A".to_string(),
            EntityKind::Class,
            vec![Modifier::Public],
            None,
        );
        assert!(first.newly_registered);

        let second = registry.register(
            7,
            "p.A".to_string(),
            EntityKind::Class,
            vec![Modifier::Public],
            None,
        );
        assert!(!second.newly_registered);
        assert_eq!(second.fqn, "p.A");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn synthetic_registration_is_idempotent_per_fqn() {
        let mut registry = EntityRegistry::new();
        let ctor = "p.A.<init>()".to_string();
        let first = registry.register_synthetic(
            ctor.clone(),
            EntityKind::Constructor,
            Vec::new(),
            Some("p.A".to_string()),
        );
        assert!(first.newly_registered);
        let second =
            registry.register_synthetic(ctor, EntityKind::Constructor, Vec::new(), None);
        assert!(!second.newly_registered);
    }

    #[test]
    fn modifiers_are_canonicalized() {
        let mut registry = EntityRegistry::new();
        registry.register(
            1,
            "p.A.f".to_string(),
            EntityKind::Field,
            vec![Modifier::Final, Modifier::Static, Modifier::Private],
            Some("p.A".to_string()),
        );
        let entity = registry.entity("p.A.f").unwrap();
        assert_eq!(
            entity.modifiers,
            vec![Modifier::Private, Modifier::Static, Modifier::Final]
        );
    }

    #[test]
    fn anonymous_and_local_share_one_counter() {
        let mut registry = EntityRegistry::new();
        assert_eq!(registry.next_anonymous_fqn("p.A"), "p.A$1");
        assert_eq!(registry.next_local_class_fqn("p.A", "Helper"), "p.A$2Helper");
        assert_eq!(registry.next_anonymous_fqn("p.B"), "p.B$3");
    }

    #[test]
    fn initializer_ordinals_are_per_type_and_flavor() {
        let mut registry = EntityRegistry::new();
        assert_eq!(registry.next_initializer_fqn("p.A", true), "p.A.<clinit>-1");
        assert_eq!(registry.next_initializer_fqn("p.A", false), "p.A.<iinit>-1");
        assert_eq!(registry.next_initializer_fqn("p.A", true), "p.A.<clinit>-2");
        assert_eq!(registry.next_initializer_fqn("p.B", true), "p.B.<clinit>-1");
    }

    #[test]
    fn shadowed_locals_get_ordinal_suffixes() {
        let mut registry = EntityRegistry::new();
        let m = "p.A.f()";
        assert_eq!(registry.next_local_fqn(m, "i"), "p.A.f()#i");
        assert_eq!(registry.next_local_fqn(m, "i"), "p.A.f()#i#2");
        assert_eq!(registry.next_local_fqn(m, "j"), "p.A.f()#j");
    }

    #[test]
    fn fqn_builders() {
        assert_eq!(member_fqn("p.A", "count"), "p.A.count");
        assert_eq!(
            callable_fqn("p.A", "<init>", &["int".to_string(), "java.lang.String".to_string()]),
            "p.A.<init>(int,java.lang.String)"
        );
        assert_eq!(nested_type_fqn("p.Outer", "Inner"), "p.Outer$Inner");
        assert_eq!(top_level_type_fqn("p.q", "A"), "p.q.A");
    }

    #[test]
    fn entities_iterate_in_registration_order() {
        let mut registry = EntityRegistry::new();
        registry.register(1, "p.A".into(), EntityKind::Class, Vec::new(), None);
        registry.register(
            2,
            "p.A.x".into(),
            EntityKind::Field,
            Vec::new(),
            Some("p.A".into()),
        );
        let order: Vec<&str> = registry
            .entities_in_order()
            .map(|e| e.fqn.as_str())
            .collect();
        assert_eq!(order, vec!["p.A", "p.A.x"]);
    }
}
