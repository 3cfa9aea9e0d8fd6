//! codefacts: deterministic fact extraction from Java source code
//!
//! This crate provides the fact-extraction engine for a large-scale
//! code-analysis pipeline:
//! - Entity extraction (types, members, parameters, locals) with canonical
//!   fully-qualified names
//! - Relation extraction (inheritance, containment, calls, reads/writes, ...)
//! - Symbol resolution against a pluggable classpath index, with an explicit
//!   "unresolved" state when the classpath is incomplete
//! - A canonical, line-oriented fact stream suitable for exact byte-level
//!   regression diffs
//!
//! One compilation unit in, one complete fact stream out. Units are
//! independent; see [`batch`] for parallel extraction across many files.

use serde::{Deserialize, Serialize};

pub mod batch;
pub mod classpath;
pub mod emit;
pub mod extract;
pub mod parse;
pub mod registry;
pub mod relations;
pub mod resolver;
pub mod walker;

// Re-export main types
pub use batch::{extract_paths, extract_sources, BatchStats};
pub use classpath::{InMemoryTypeIndex, TypeDescriptor, TypeIndex};
pub use emit::{emit_unit, FactSink, WriteSink};
pub use extract::{extract_unit, extract_unit_to_sink, UnitFacts};

/// Package FQN used for types declared in the unnamed (default) package.
pub const DEFAULT_PACKAGE: &str = "(default)";

/// The kind of a declared program entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Class,
    Interface,
    Enum,
    AnnotationType,
    Method,
    Constructor,
    Field,
    EnumConstant,
    Parameter,
    LocalVariable,
    Initializer,
}

impl EntityKind {
    /// The keyword used for this kind in the fact stream.
    pub fn keyword(self) -> &'static str {
        match self {
            EntityKind::Class => "CLASS",
            EntityKind::Interface => "INTERFACE",
            EntityKind::Enum => "ENUM",
            EntityKind::AnnotationType => "ANNOTATION",
            EntityKind::Method => "METHOD",
            EntityKind::Constructor => "CONSTRUCTOR",
            EntityKind::Field => "FIELD",
            EntityKind::EnumConstant => "ENUM_CONST",
            EntityKind::Parameter => "PARAM_DECL",
            EntityKind::LocalVariable => "LOCAL_VAR",
            EntityKind::Initializer => "INITIALIZER",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A declaration modifier.
///
/// The derived `Ord` defines the canonical emission order (access modifiers
/// first), so modifier sets serialize identically regardless of source order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Modifier {
    Public,
    Protected,
    Private,
    Abstract,
    Default,
    Static,
    Final,
    Synchronized,
    Native,
    Transient,
    Volatile,
    Strictfp,
}

impl Modifier {
    pub fn from_keyword(text: &str) -> Option<Modifier> {
        match text {
            "public" => Some(Modifier::Public),
            "protected" => Some(Modifier::Protected),
            "private" => Some(Modifier::Private),
            "abstract" => Some(Modifier::Abstract),
            "default" => Some(Modifier::Default),
            "static" => Some(Modifier::Static),
            "final" => Some(Modifier::Final),
            "synchronized" => Some(Modifier::Synchronized),
            "native" => Some(Modifier::Native),
            "transient" => Some(Modifier::Transient),
            "volatile" => Some(Modifier::Volatile),
            "strictfp" => Some(Modifier::Strictfp),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Modifier::Public => "public",
            Modifier::Protected => "protected",
            Modifier::Private => "private",
            Modifier::Abstract => "abstract",
            Modifier::Default => "default",
            Modifier::Static => "static",
            Modifier::Final => "final",
            Modifier::Synchronized => "synchronized",
            Modifier::Native => "native",
            Modifier::Transient => "transient",
            Modifier::Volatile => "volatile",
            Modifier::Strictfp => "strictfp",
        }
    }
}

/// A declared program entity with its canonical FQN.
///
/// Nested types use `$` in their FQN (binary-name convention:
/// `com.example.Outer$Inner`); members use `.`. Methods and constructors
/// carry an erased-parameter signature since plain names are not unique
/// within a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Canonical fully-qualified name: "com.example.User.save(java.lang.String)"
    pub fqn: String,
    /// Kind of entity
    pub kind: EntityKind,
    /// Modifiers in canonical order
    pub modifiers: Vec<Modifier>,
    /// FQN of the lexically enclosing entity (None for top-level types,
    /// whose INSIDE relation targets the package instead)
    pub enclosing: Option<String>,
}

/// Resolved target of a syntactic use.
///
/// Resolution is all-or-nothing: either a concrete FQN or the explicit
/// unresolved state. The `-` sentinel literal exists only at the
/// serialization boundary (see [`emit`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reference {
    Resolved(String),
    Unresolved,
}

impl Reference {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Reference::Resolved(_))
    }

    /// The FQN if resolved.
    pub fn fqn(&self) -> Option<&str> {
        match self {
            Reference::Resolved(fqn) => Some(fqn),
            Reference::Unresolved => None,
        }
    }
}

impl From<Option<String>> for Reference {
    fn from(fqn: Option<String>) -> Self {
        match fqn {
            Some(fqn) => Reference::Resolved(fqn),
            None => Reference::Unresolved,
        }
    }
}

/// The kind of a relation between two entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    Extends,
    Implements,
    Inside,
    Uses,
    Calls,
    Reads,
    Writes,
    Param,
    Returns,
    Throws,
    AnnotatedBy,
}

impl RelationKind {
    /// The keyword used for this kind in the fact stream.
    pub fn keyword(self) -> &'static str {
        match self {
            RelationKind::Extends => "EXTENDS",
            RelationKind::Implements => "IMPLEMENTS",
            RelationKind::Inside => "INSIDE",
            RelationKind::Uses => "USES",
            RelationKind::Calls => "CALLS",
            RelationKind::Reads => "READS",
            RelationKind::Writes => "WRITES",
            RelationKind::Param => "PARAM",
            RelationKind::Returns => "RETURNS",
            RelationKind::Throws => "THROWS",
            RelationKind::AnnotatedBy => "ANNOTATED_BY",
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// An immutable relation fact between a source entity and a target reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub kind: RelationKind,
    /// FQN of the entity the relation originates from
    pub source: String,
    /// Resolved target, or the explicit unresolved state
    pub target: Reference,
    /// Disambiguating context: the reference text as written in source,
    /// a parameter position, etc. INSIDE relations never carry one.
    pub context: Option<String>,
}

/// One record of the fact stream, in first-observed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fact {
    Entity(Entity),
    Relation(Relation),
}

/// Errors that can occur during extraction
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Syntax error at {line}:{column}")]
    SyntaxError { line: u32, column: u32 },

    #[error("Parser failure: {0}")]
    ParserFailure(String),

    #[error("Extractor invariant violated: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, ExtractError>;
