//! LSP symbol-kind codes for client display

use crate::model::NodeKind;

/// Map a node kind to its LSP numeric symbol kind and display name.
///
/// Kinds with no LSP counterpart (the statement-level entities) fall back to
/// Variable (13) with the name "Unknown".
pub fn lsp_symbol_kind(kind: NodeKind) -> (u8, &'static str) {
    match kind {
        NodeKind::Function => (12, "Function"),
        NodeKind::Method => (6, "Method"),
        NodeKind::Constructor => (9, "Constructor"),
        NodeKind::Property => (7, "Property"),
        NodeKind::SpecialMethod => (25, "Operator"),
        NodeKind::Class => (5, "Class"),
        NodeKind::Interface => (11, "Interface"),
        NodeKind::Enum => (10, "Enum"),
        NodeKind::Dataclass => (23, "Struct"),
        NodeKind::ModuleVariable => (13, "Variable"),
        NodeKind::Constant => (14, "Constant"),
        NodeKind::ClassField => (8, "Field"),
        NodeKind::DockerInstruction => (14, "Constant"),
        NodeKind::ComposeService => (2, "Module"),
        NodeKind::BreakStmt
        | NodeKind::ContinueStmt
        | NodeKind::YieldStmt
        | NodeKind::AssertStmt
        | NodeKind::ReturnStmt
        | NodeKind::BlockStmt => (13, "Unknown"),
    }
}
