//! Classpath / type-index capability.
//!
//! The extractor never assembles a classpath itself: it consumes a read-only
//! [`TypeIndex`] built externally before extraction begins. The index maps
//! qualified names to [`TypeDescriptor`]s and supplies supertype chains for
//! inherited-member lookup.
//!
//! A partial classpath is the normal case, not an error: any lookup miss
//! surfaces downstream as an unresolved reference.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A field visible on a type, as known to the classpath.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    /// Declared type: an FQN for classpath entries, the erased source text
    /// for unit-local descriptors built by the pre-scan
    pub ty: String,
}

/// A method or constructor visible on a type.
///
/// Constructors use the name `<init>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    /// Erased parameter types, in declaration order
    pub params: Vec<String>,
    /// Return type; None for constructors
    pub ret: Option<String>,
    /// Type parameter names declared on the method itself
    pub type_params: Vec<String>,
}

/// Everything the resolver needs to know about one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Canonical FQN, `$`-separated for nested types
    pub fqn: String,
    /// Direct superclass; None means the implicit `java.lang.Object`
    pub superclass: Option<String>,
    /// Directly implemented (or, for interfaces, extended) interfaces
    pub interfaces: Vec<String>,
    /// Type parameter names declared on the type
    pub type_params: Vec<String>,
    /// True for interfaces and annotation types
    pub is_interface: bool,
    pub fields: Vec<FieldDescriptor>,
    pub methods: Vec<MethodDescriptor>,
}

impl TypeDescriptor {
    pub fn new(fqn: impl Into<String>) -> Self {
        Self {
            fqn: fqn.into(),
            superclass: None,
            interfaces: Vec::new(),
            type_params: Vec::new(),
            is_interface: false,
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Mark this descriptor as an interface or annotation type.
    pub fn as_interface(mut self) -> Self {
        self.is_interface = true;
        self
    }

    pub fn with_superclass(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            ty: ty.into(),
        });
        self
    }

    pub fn with_method(
        mut self,
        name: impl Into<String>,
        params: Vec<String>,
        ret: Option<String>,
    ) -> Self {
        self.methods.push(MethodDescriptor {
            name: name.into(),
            params,
            ret,
            type_params: Vec::new(),
        });
        self
    }

    /// Add a no-argument constructor.
    pub fn with_default_constructor(self) -> Self {
        self.with_method("<init>", Vec::new(), None)
    }

    /// Find a field declared directly on this type.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Methods declared directly on this type with the given name.
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodDescriptor> {
        self.methods.iter().filter(move |m| m.name == name)
    }
}

/// Read-only lookup capability over the known classpath.
///
/// Shared across parallel unit extractions, so implementations must be safe
/// for concurrent read-only access.
pub trait TypeIndex: Send + Sync {
    /// Look up a type by its canonical qualified name.
    fn lookup_type(&self, qualified: &str) -> Option<&TypeDescriptor>;

    /// Ordered supertype linearization of a type: the superclass chain first,
    /// then interfaces breadth-first, deduplicated, self excluded. Types
    /// missing from the index are silently skipped (partial classpath).
    fn supertypes_of(&self, descriptor: &TypeDescriptor) -> Vec<TypeDescriptor> {
        linearize_supertypes(descriptor, &|name| self.lookup_type(name).cloned())
    }
}

/// Supertype linearization over an arbitrary lookup function.
///
/// Classes without an explicit superclass get the implicit `java.lang.Object`
/// appended when the index knows it.
pub fn linearize_supertypes(
    descriptor: &TypeDescriptor,
    lookup: &dyn Fn(&str) -> Option<TypeDescriptor>,
) -> Vec<TypeDescriptor> {
    fn effective_superclass(descriptor: &TypeDescriptor) -> Option<String> {
        match &descriptor.superclass {
            Some(name) => Some(name.clone()),
            // Implicit root supertype
            None if descriptor.fqn != "java.lang.Object" => {
                Some("java.lang.Object".to_string())
            }
            None => None,
        }
    }

    let mut out: Vec<TypeDescriptor> = Vec::new();
    let mut seen: Vec<String> = vec![descriptor.fqn.clone()];
    let mut queue: Vec<String> = Vec::new();

    // Superclass chain takes priority over interfaces
    let mut current = effective_superclass(descriptor);
    while let Some(name) = current {
        if seen.contains(&name) {
            break;
        }
        seen.push(name.clone());
        match lookup(&name) {
            Some(desc) => {
                current = effective_superclass(&desc);
                queue.extend(desc.interfaces.iter().cloned());
                out.push(desc);
            }
            None => break,
        }
    }

    // Then interfaces, breadth-first
    let mut interfaces: Vec<String> = descriptor.interfaces.clone();
    interfaces.append(&mut queue);
    let mut i = 0;
    while i < interfaces.len() {
        let name = interfaces[i].clone();
        i += 1;
        if seen.contains(&name) {
            continue;
        }
        seen.push(name.clone());
        if let Some(desc) = lookup(&name) {
            interfaces.extend(desc.interfaces.iter().cloned());
            out.push(desc);
        }
    }

    out
}

/// In-memory [`TypeIndex`] backed by a hash map.
///
/// Intended for tests and for callers that assemble the classpath externally
/// (e.g. from extracted library jars) before running extraction.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct InMemoryTypeIndex {
    types: HashMap<String, TypeDescriptor>,
}

impl InMemoryTypeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// An index pre-seeded with `java.lang.Object`, which nearly every
    /// extraction needs for implicit supertypes and super-constructor calls.
    pub fn with_jdk_root() -> Self {
        let mut index = Self::new();
        index.insert(
            TypeDescriptor::new("java.lang.Object")
                .with_default_constructor()
                .with_method("equals", vec!["java.lang.Object".to_string()], Some("boolean".to_string()))
                .with_method("hashCode", Vec::new(), Some("int".to_string()))
                .with_method("toString", Vec::new(), Some("java.lang.String".to_string())),
        );
        index
    }

    pub fn insert(&mut self, descriptor: TypeDescriptor) {
        self.types.insert(descriptor.fqn.clone(), descriptor);
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl TypeIndex for InMemoryTypeIndex {
    fn lookup_type(&self, qualified: &str) -> Option<&TypeDescriptor> {
        self.types.get(qualified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> InMemoryTypeIndex {
        let mut index = InMemoryTypeIndex::with_jdk_root();
        index.insert(
            TypeDescriptor::new("com.example.Base")
                .with_method("run", Vec::new(), Some("void".to_string()))
                .with_field("count", "int"),
        );
        index.insert(
            TypeDescriptor::new("com.example.Derived")
                .with_superclass("com.example.Base")
                .with_interface("com.example.Marker"),
        );
        index.insert(TypeDescriptor::new("com.example.Marker"));
        index
    }

    #[test]
    fn lookup_hit_and_miss() {
        let index = sample_index();
        assert!(index.lookup_type("com.example.Base").is_some());
        assert!(index.lookup_type("com.example.Missing").is_none());
    }

    #[test]
    fn supertypes_superclass_before_interfaces() {
        let index = sample_index();
        let derived = index.lookup_type("com.example.Derived").unwrap();
        let supers: Vec<String> = index
            .supertypes_of(derived)
            .into_iter()
            .map(|d| d.fqn)
            .collect();
        // Base has no explicit superclass, so Object closes the chain
        assert_eq!(
            supers,
            vec!["com.example.Base", "java.lang.Object", "com.example.Marker"]
        );
    }

    #[test]
    fn supertypes_skip_missing_entries() {
        let mut index = InMemoryTypeIndex::new();
        index.insert(TypeDescriptor::new("a.Leaf").with_superclass("a.Gone"));
        let leaf = index.lookup_type("a.Leaf").unwrap();
        // The superclass is outside the classpath: chain ends, no panic
        assert!(index.supertypes_of(leaf).is_empty());
    }

    #[test]
    fn implicit_object_supertype() {
        let index = sample_index();
        let base = index.lookup_type("com.example.Base").unwrap();
        let supers = index.supertypes_of(base);
        assert_eq!(supers.len(), 1);
        assert_eq!(supers[0].fqn, "java.lang.Object");
    }

    #[test]
    fn method_and_field_lookup_on_descriptor() {
        let index = sample_index();
        let base = index.lookup_type("com.example.Base").unwrap();
        assert!(base.field("count").is_some());
        assert_eq!(base.methods_named("run").count(), 1);
        assert_eq!(base.methods_named("walk").count(), 0);
    }
}
