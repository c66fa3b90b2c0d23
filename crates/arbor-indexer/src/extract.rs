//! Shared output shape of the language extractors

use arbor_core::model::{Node, SourceLocation, TypeSource};

/// Everything one file contributed to the index.
///
/// Attribute types are still raw annotation strings at this point; the
/// pipeline resolves them against the full class table once every file has
/// been extracted.
#[derive(Debug, Default, Clone)]
pub struct Extraction {
    pub nodes: Vec<Node>,
    pub raw_attributes: Vec<RawAttribute>,
    /// (class FQN, method FQN) pairs for the attribute registry.
    pub methods: Vec<(String, String)>,
}

/// A class attribute sighting before type names are resolved to FQNs.
#[derive(Debug, Clone)]
pub struct RawAttribute {
    pub class_fqn: String,
    pub name: String,
    /// Type name as written (`UserRepo`, `str`), unresolved.
    pub raw_type: Option<String>,
    pub source: TypeSource,
    pub confidence: f32,
    /// Method the assignment was seen in, when class-level sighting is absent.
    pub assigned_in: Option<String>,
    pub location: SourceLocation,
}
