//! FQN resolution: syntactic references to canonical entity identifiers.
//!
//! Resolution mirrors Java scoping: local bindings in the innermost block,
//! member lookup up the enclosing-type chain (inherited members included via
//! supertype linearization), single-type imports, wildcard imports,
//! same-package types, `java.lang`, then the classpath's global index.
//!
//! Resolution is all-or-nothing. When a reference cannot be pinned to exactly
//! one target - classpath gap, ambiguous wildcard import, ambiguous overload -
//! the result is [`Reference::Unresolved`], never a guess.

use std::collections::HashMap;

use crate::classpath::{linearize_supertypes, MethodDescriptor, TypeDescriptor, TypeIndex};
use crate::registry::{callable_fqn, nested_type_fqn};
use crate::Reference;

const PRIMITIVES: &[&str] = &[
    "boolean", "byte", "char", "short", "int", "long", "float", "double", "void",
];

pub fn is_primitive(name: &str) -> bool {
    PRIMITIVES.contains(&name)
}

/// A local variable or parameter binding in scope.
#[derive(Debug, Clone)]
pub struct LocalBinding {
    /// Entity FQN of the declaration: `Callable#name`
    pub fqn: String,
    /// Declared type as written (generics intact), None when not statically
    /// useful (e.g. `var`)
    pub ty: Option<String>,
}

#[derive(Debug)]
enum Scope {
    Type {
        fqn: String,
        type_params: Vec<String>,
    },
    Callable {
        fqn: String,
        type_params: Vec<String>,
        locals: HashMap<String, LocalBinding>,
    },
    Block {
        locals: HashMap<String, LocalBinding>,
    },
}

/// Explicit scope stack maintained by the tree walker: pushed on entry and
/// popped on exit of each scope-introducing construct.
#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_type(&mut self, fqn: String, type_params: Vec<String>) {
        self.scopes.push(Scope::Type { fqn, type_params });
    }

    pub fn push_callable(&mut self, fqn: String, type_params: Vec<String>) {
        self.scopes.push(Scope::Callable {
            fqn,
            type_params,
            locals: HashMap::new(),
        });
    }

    pub fn push_block(&mut self) {
        self.scopes.push(Scope::Block {
            locals: HashMap::new(),
        });
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    /// Declare a local in the innermost callable or block scope.
    pub fn declare_local(&mut self, name: String, binding: LocalBinding) {
        for scope in self.scopes.iter_mut().rev() {
            match scope {
                Scope::Callable { locals, .. } | Scope::Block { locals } => {
                    locals.insert(name, binding);
                    return;
                }
                Scope::Type { .. } => continue,
            }
        }
    }

    /// Innermost binding for a name, searching outward through blocks and
    /// callables (captured enclosing-method locals included).
    pub fn lookup_local(&self, name: &str) -> Option<&LocalBinding> {
        for scope in self.scopes.iter().rev() {
            match scope {
                Scope::Callable { locals, .. } | Scope::Block { locals } => {
                    if let Some(binding) = locals.get(name) {
                        return Some(binding);
                    }
                }
                Scope::Type { .. } => continue,
            }
        }
        None
    }

    /// FQN of the innermost enclosing type.
    pub fn enclosing_type(&self) -> Option<&str> {
        self.scopes.iter().rev().find_map(|scope| match scope {
            Scope::Type { fqn, .. } => Some(fqn.as_str()),
            _ => None,
        })
    }

    /// Enclosing type FQNs, innermost first.
    pub fn enclosing_type_chain(&self) -> Vec<&str> {
        self.scopes
            .iter()
            .rev()
            .filter_map(|scope| match scope {
                Scope::Type { fqn, .. } => Some(fqn.as_str()),
                _ => None,
            })
            .collect()
    }

    /// FQN of the innermost enclosing entity, callable or type.
    pub fn innermost_entity(&self) -> Option<&str> {
        self.scopes.iter().rev().find_map(|scope| match scope {
            Scope::Type { fqn, .. } | Scope::Callable { fqn, .. } => Some(fqn.as_str()),
            Scope::Block { .. } => None,
        })
    }

    /// FQN of the innermost enclosing method, constructor, or initializer.
    pub fn enclosing_callable(&self) -> Option<&str> {
        self.scopes.iter().rev().find_map(|scope| match scope {
            Scope::Callable { fqn, .. } => Some(fqn.as_str()),
            _ => None,
        })
    }

    /// All type parameter names visible at this point.
    pub fn type_params_in_scope(&self) -> Vec<&str> {
        self.scopes
            .iter()
            .flat_map(|scope| match scope {
                Scope::Type { type_params, .. } | Scope::Callable { type_params, .. } => {
                    type_params.iter().map(|s| s.as_str()).collect::<Vec<_>>()
                }
                Scope::Block { .. } => Vec::new(),
            })
            .collect()
    }
}

/// Compilation-unit-level resolution context: package, imports, and the
/// declared-type table built by the walker's pre-scan.
#[derive(Debug, Default)]
pub struct UnitScope {
    /// Package FQN, [`crate::DEFAULT_PACKAGE`] for the unnamed package
    pub package: String,
    /// Simple name -> imported qualified name (single-type imports)
    pub single_imports: HashMap<String, String>,
    /// On-demand import prefixes (`java.util.*` stores `java.util`)
    pub wildcard_imports: Vec<String>,
    /// Types declared in this unit, keyed by canonical FQN
    pub unit_types: HashMap<String, TypeDescriptor>,
    /// Simple name -> FQN for this unit's top-level types
    pub top_level_names: HashMap<String, String>,
}

/// Per-unit resolver over the unit's own declarations plus the classpath.
pub struct Resolver<'a> {
    index: &'a dyn TypeIndex,
    pub unit: UnitScope,
}

impl<'a> Resolver<'a> {
    pub fn new(index: &'a dyn TypeIndex, unit: UnitScope) -> Self {
        Self { index, unit }
    }

    /// Look up a type by canonical FQN: unit declarations shadow the
    /// classpath.
    pub fn lookup(&self, qualified: &str) -> Option<&TypeDescriptor> {
        self.unit
            .unit_types
            .get(qualified)
            .or_else(|| self.index.lookup_type(qualified))
    }

    /// Ordered supertype linearization across unit-local and classpath types.
    pub fn supertypes(&self, descriptor: &TypeDescriptor) -> Vec<TypeDescriptor> {
        // Unit-local supertype references are source text: a simple name must
        // go through the unit's imports and package, not just the index
        let unit_level = ScopeStack::new();
        linearize_supertypes(descriptor, &|name| {
            self.lookup(name).cloned().or_else(|| {
                match self.resolve_type_name(name, &unit_level) {
                    Reference::Resolved(fqn) => self.lookup(&fqn).cloned(),
                    Reference::Unresolved => None,
                }
            })
        })
    }

    /// Resolve a type reference as written (generics intact or stripped,
    /// simple or dot-qualified) to a canonical FQN.
    pub fn resolve_type_name(&self, text: &str, scopes: &ScopeStack) -> Reference {
        let name = strip_generics(text);
        let name = name.trim();

        if is_primitive(name) {
            return Reference::Resolved(name.to_string());
        }
        // Type variables erase; they never name an entity
        if !name.contains('.') && scopes.type_params_in_scope().contains(&name) {
            return Reference::Unresolved;
        }

        if let Some((first, _rest)) = name.split_once('.') {
            // Qualified: if the head names a type in scope, the tail is a
            // nested-type chain; otherwise treat the whole thing as
            // package-qualified.
            if let Reference::Resolved(outer) = self.resolve_simple_type(first, scopes) {
                return self.resolve_nested_chain(&outer, &name[first.len() + 1..]);
            }
            return match self.canonicalize_qualified(name) {
                Some(fqn) => Reference::Resolved(fqn),
                None => Reference::Unresolved,
            };
        }

        self.resolve_simple_type(name, scopes)
    }

    /// Resolution order for a simple type name.
    fn resolve_simple_type(&self, name: &str, scopes: &ScopeStack) -> Reference {
        // 1. Nested types of the enclosing-type chain, inherited included
        for enclosing in scopes.enclosing_type_chain() {
            let candidate = nested_type_fqn(enclosing, name);
            if self.lookup(&candidate).is_some() {
                return Reference::Resolved(candidate);
            }
            if let Some(descriptor) = self.lookup(enclosing) {
                let descriptor = descriptor.clone();
                for supertype in self.supertypes(&descriptor) {
                    let candidate = nested_type_fqn(&supertype.fqn, name);
                    if self.lookup(&candidate).is_some() {
                        return Reference::Resolved(candidate);
                    }
                }
            }
        }

        // 2. This unit's top-level types
        if let Some(fqn) = self.unit.top_level_names.get(name) {
            return Reference::Resolved(fqn.clone());
        }

        // 3. Single-type imports: the import itself fixes the canonical name,
        //    classpath presence not required
        if let Some(imported) = self.unit.single_imports.get(name) {
            let fqn = self
                .canonicalize_qualified(imported)
                .unwrap_or_else(|| imported.clone());
            return Reference::Resolved(fqn);
        }

        // 4. On-demand imports: membership must be confirmed by the index,
        //    and two confirmed candidates are an ambiguity
        let mut wildcard_hit: Option<String> = None;
        for prefix in &self.unit.wildcard_imports {
            let candidate = format!("{}.{}", prefix, name);
            let candidate = self
                .canonicalize_qualified(&candidate)
                .unwrap_or(candidate);
            if self.lookup(&candidate).is_some() {
                if wildcard_hit.is_some() {
                    return Reference::Unresolved;
                }
                wildcard_hit = Some(candidate);
            }
        }
        if let Some(fqn) = wildcard_hit {
            return Reference::Resolved(fqn);
        }

        // 5. Same package (types in the unnamed package have bare FQNs)
        let candidate = if self.unit.package == crate::DEFAULT_PACKAGE {
            name.to_string()
        } else {
            format!("{}.{}", self.unit.package, name)
        };
        if self.lookup(&candidate).is_some() {
            return Reference::Resolved(candidate);
        }

        // 6. java.lang
        let candidate = format!("java.lang.{}", name);
        if self.lookup(&candidate).is_some() {
            return Reference::Resolved(candidate);
        }

        Reference::Unresolved
    }

    /// Resolve `rest` as a nested-type chain under a resolved outer type.
    /// The owner may be a supertype when the nested type is inherited.
    fn resolve_nested_chain(&self, outer: &str, rest: &str) -> Reference {
        let mut owner = outer.to_string();
        for segment in rest.split('.') {
            let direct = nested_type_fqn(&owner, segment);
            if self.lookup(&direct).is_some() {
                owner = direct;
                continue;
            }
            let mut inherited = None;
            if let Some(descriptor) = self.lookup(&owner) {
                let descriptor = descriptor.clone();
                for supertype in self.supertypes(&descriptor) {
                    let candidate = nested_type_fqn(&supertype.fqn, segment);
                    if self.lookup(&candidate).is_some() {
                        inherited = Some(candidate);
                        break;
                    }
                }
            }
            // Unknown member type: identity is still determined by the outer
            owner = inherited.unwrap_or(direct);
        }
        Reference::Resolved(owner)
    }

    /// Canonicalize a dotted qualified name against the index: exact match
    /// first, then progressively re-interpreting trailing segments as nested
    /// types (`a.b.Outer.Inner` -> `a.b.Outer$Inner`).
    pub fn canonicalize_qualified(&self, dotted: &str) -> Option<String> {
        if self.lookup(dotted).is_some() {
            return Some(dotted.to_string());
        }
        let parts: Vec<&str> = dotted.split('.').collect();
        for split in (1..parts.len()).rev() {
            let prefix = parts[..split].join(".");
            if self.lookup(&prefix).is_some() {
                let mut fqn = prefix;
                for part in &parts[split..] {
                    fqn = nested_type_fqn(&fqn, part);
                }
                return Some(fqn);
            }
        }
        None
    }

    /// Erase a parameter type for a callable signature: strip generics
    /// arguments, erase in-scope type variables to `java.lang.Object`,
    /// resolve what remains to an FQN when possible, and keep the erased
    /// source text otherwise (deterministic for a fixed unit and classpath).
    pub fn erase_param_type(
        &self,
        text: &str,
        extra_type_params: &[String],
        scopes: &ScopeStack,
    ) -> String {
        let stripped = strip_generics(text);
        let stripped = stripped.trim();
        let (root, suffix) = split_array_suffix(stripped);

        if is_primitive(root) {
            return format!("{}{}", root, suffix);
        }
        if extra_type_params.iter().any(|p| p == root)
            || (!root.contains('.') && scopes.type_params_in_scope().contains(&root))
        {
            return format!("java.lang.Object{}", suffix);
        }
        match self.resolve_type_name(root, scopes) {
            Reference::Resolved(fqn) => format!("{}{}", fqn, suffix),
            Reference::Unresolved => format!("{}{}", root, suffix),
        }
    }

    /// Owner and declared type of a field, searching the type itself and then
    /// its supertype linearization.
    pub fn resolve_field(&self, type_fqn: &str, name: &str) -> Option<(String, String)> {
        let descriptor = self.lookup(type_fqn)?.clone();
        if let Some(field) = descriptor.field(name) {
            return Some((descriptor.fqn.clone(), field.ty.clone()));
        }
        for supertype in self.supertypes(&descriptor) {
            if let Some(field) = supertype.field(name) {
                return Some((supertype.fqn.clone(), field.ty.clone()));
            }
        }
        None
    }

    /// A field named `name` on any type of the enclosing-type chain.
    pub fn resolve_field_in_scope(
        &self,
        name: &str,
        scopes: &ScopeStack,
    ) -> Option<(String, String)> {
        for enclosing in scopes.enclosing_type_chain() {
            if let Some(hit) = self.resolve_field(enclosing, name) {
                return Some(hit);
            }
        }
        None
    }

    /// Resolve a method or constructor call on a known receiver type.
    ///
    /// Candidates match by name and arity across the receiver type and its
    /// supertypes; overriding declarations shadow inherited ones with the
    /// same erased signature. When several candidates survive and the static
    /// argument types cannot single one out, the call is Unresolved.
    ///
    /// Returns the resolved callable reference and its return type, if known.
    pub fn resolve_method(
        &self,
        type_fqn: &str,
        name: &str,
        arg_types: &[Option<String>],
        scopes: &ScopeStack,
    ) -> (Reference, Option<String>) {
        let Some(descriptor) = self.lookup(type_fqn).cloned() else {
            return (Reference::Unresolved, None);
        };

        // (owner fqn, erased params, return type), innermost declaration first
        let mut candidates: Vec<(String, Vec<String>, Option<String>)> = Vec::new();
        let mut seen_signatures: Vec<String> = Vec::new();
        let mut collect = |owner: &TypeDescriptor| {
            for method in owner.methods_named(name) {
                if method.params.len() != arg_types.len() {
                    continue;
                }
                let erased = self.erase_method_params(owner, method, scopes);
                let signature = erased.join(",");
                if seen_signatures.contains(&signature) {
                    continue;
                }
                seen_signatures.push(signature);
                candidates.push((owner.fqn.clone(), erased, method.ret.clone()));
            }
        };

        collect(&descriptor);
        for supertype in self.supertypes(&descriptor) {
            // Constructors are not inherited
            if name == "<init>" {
                break;
            }
            collect(&supertype);
        }

        match candidates.len() {
            0 => (Reference::Unresolved, None),
            1 => {
                let (owner, params, ret) = candidates.remove(0);
                (
                    Reference::Resolved(callable_fqn(&owner, name, &params)),
                    ret,
                )
            }
            _ => {
                // Arity alone is ambiguous: static argument types must select
                // exactly one candidate
                let matching: Vec<&(String, Vec<String>, Option<String>)> = candidates
                    .iter()
                    .filter(|(_, params, _)| {
                        arg_types.iter().zip(params.iter()).all(|(arg, param)| {
                            match arg {
                                Some(ty) => ty == param,
                                None => false,
                            }
                        })
                    })
                    .collect();
                if matching.len() == 1 {
                    let (owner, params, ret) = matching[0];
                    (
                        Reference::Resolved(callable_fqn(owner, name, params)),
                        ret.clone(),
                    )
                } else {
                    (Reference::Unresolved, None)
                }
            }
        }
    }

    /// Resolve an unqualified call by walking the enclosing-type chain
    /// outward. A type that declares matching candidates shadows outer types,
    /// even when those candidates are ambiguous.
    pub fn resolve_unqualified_method(
        &self,
        name: &str,
        arg_types: &[Option<String>],
        scopes: &ScopeStack,
    ) -> (Reference, Option<String>) {
        for enclosing in scopes.enclosing_type_chain() {
            let has_candidates = self.type_has_method(enclosing, name, arg_types.len());
            if has_candidates {
                return self.resolve_method(enclosing, name, arg_types, scopes);
            }
        }
        (Reference::Unresolved, None)
    }

    /// Resolve a method reference (`T::m`) where the arity is not syntactic:
    /// resolvable only when exactly one method with the name is visible.
    pub fn resolve_unique_method(
        &self,
        type_fqn: &str,
        name: &str,
        scopes: &ScopeStack,
    ) -> Reference {
        let Some(descriptor) = self.lookup(type_fqn).cloned() else {
            return Reference::Unresolved;
        };
        let mut found: Option<(String, Vec<String>)> = None;
        let mut seen_signatures: Vec<String> = Vec::new();
        let mut owners = vec![descriptor.clone()];
        if name != "<init>" {
            owners.extend(self.supertypes(&descriptor));
        }
        for owner in &owners {
            for method in owner.methods_named(name) {
                let erased = self.erase_method_params(owner, method, scopes);
                let signature = erased.join(",");
                if seen_signatures.contains(&signature) {
                    continue;
                }
                seen_signatures.push(signature);
                if found.is_some() {
                    return Reference::Unresolved;
                }
                found = Some((owner.fqn.clone(), erased));
            }
        }
        match found {
            Some((owner, params)) => Reference::Resolved(callable_fqn(&owner, name, &params)),
            None => Reference::Unresolved,
        }
    }

    fn type_has_method(&self, type_fqn: &str, name: &str, arity: usize) -> bool {
        let Some(descriptor) = self.lookup(type_fqn).cloned() else {
            return false;
        };
        let matches = |d: &TypeDescriptor| {
            d.methods_named(name).any(|m| m.params.len() == arity)
        };
        matches(&descriptor) || self.supertypes(&descriptor).iter().any(matches)
    }

    /// Resolve the declared type text of a member (field type, method return)
    /// to an FQN usable as the next link of an access chain.
    pub fn resolve_member_type(
        &self,
        owner: &TypeDescriptor,
        ty_text: &str,
        scopes: &ScopeStack,
    ) -> Option<String> {
        let stripped = strip_generics(ty_text);
        let stripped = stripped.trim();
        if stripped.ends_with("[]") {
            return None;
        }
        if owner.type_params.iter().any(|p| p == stripped) {
            return None;
        }
        if is_primitive(stripped) {
            return Some(stripped.to_string());
        }
        match self.resolve_type_name(stripped, scopes) {
            Reference::Resolved(fqn) => Some(fqn),
            Reference::Unresolved => None,
        }
    }

    fn erase_method_params(
        &self,
        owner: &TypeDescriptor,
        method: &MethodDescriptor,
        scopes: &ScopeStack,
    ) -> Vec<String> {
        let mut type_params = owner.type_params.clone();
        type_params.extend(method.type_params.iter().cloned());
        method
            .params
            .iter()
            .map(|p| self.erase_param_type(p, &type_params, scopes))
            .collect()
    }
}

/// Remove generic argument lists: `Map<K, List<V>>` -> `Map`,
/// `List<String>[]` -> `List[]`.
pub fn strip_generics(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for ch in text.chars() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Split trailing array dimensions off an erased type text.
fn split_array_suffix(text: &str) -> (&str, &str) {
    let mut root_end = text.len();
    while text[..root_end].ends_with("[]") {
        root_end -= 2;
    }
    (&text[..root_end], &text[root_end..])
}
