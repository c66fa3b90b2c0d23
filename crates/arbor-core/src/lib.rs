//! Arbor Core — symbol model, module registry, call graph, and status tracking

pub mod attributes;
pub mod cursor;
pub mod graph;
pub mod index;
pub mod lsp;
pub mod model;
pub mod modules;
pub mod status;

#[cfg(test)]
pub mod tests;

pub use attributes::AttributeRegistry;
pub use graph::{CallGraph, CodeGraph};
pub use index::{Index, IndexInfo, SymbolMatch};
pub use lsp::lsp_symbol_kind;
pub use model::{
    Argument, CallSite, ClassAttribute, ClassAttributes, ConcreteType, Node, NodeKind, Param,
    Scope, SourceLocation, Type, TypeSource, Visibility,
};
pub use modules::{ImportResolution, MatchType, ModuleRegistry, module_fqn_for_path};
pub use status::{IndexState, Phase, StatusSnapshot, StatusTracker};
