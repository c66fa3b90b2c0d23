//! Thin adapter over tree-sitter parsers
//!
//! Only Python and Java go through tree-sitter. Dockerfile and Compose files
//! are handled by their own extractors in a secondary pass and never reach
//! this module.

use tree_sitter::{Language, Node, Parser, Tree};

use crate::languages::FileKind;

fn grammar_for(kind: FileKind) -> Option<Language> {
    match kind {
        FileKind::Python => Some(tree_sitter_python::LANGUAGE.into()),
        FileKind::Java => Some(tree_sitter_java::LANGUAGE.into()),
        FileKind::Dockerfile | FileKind::Compose => None,
    }
}

/// Parse a source buffer. Returns `None` when the language has no grammar or
/// the parse fails; callers log at debug and skip the file — a bad file is
/// never fatal to indexing.
pub fn parse_source(kind: FileKind, source: &[u8]) -> Option<Tree> {
    let grammar = grammar_for(kind)?;
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&grammar) {
        tracing::debug!("grammar rejected for {kind:?}: {e}");
        return None;
    }
    parser.parse(source, None)
}

/// Text of a node, or the empty string on invalid UTF-8.
pub fn node_text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

/// 1-indexed line of a node's start.
pub fn node_line(node: Node) -> u32 {
    node.start_position().row as u32 + 1
}

/// 1-indexed column of a node's start.
pub fn node_column(node: Node) -> u32 {
    node.start_position().column as u32 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_python() {
        let tree = parse_source(FileKind::Python, b"def f():\n    pass\n").unwrap();
        assert_eq!(tree.root_node().kind(), "module");
    }

    #[test]
    fn parses_java() {
        let tree = parse_source(FileKind::Java, b"class A { void m() {} }").unwrap();
        assert_eq!(tree.root_node().kind(), "program");
    }

    #[test]
    fn non_grammar_kinds_yield_none() {
        assert!(parse_source(FileKind::Dockerfile, b"FROM alpine").is_none());
        assert!(parse_source(FileKind::Compose, b"services: {}").is_none());
    }
}
