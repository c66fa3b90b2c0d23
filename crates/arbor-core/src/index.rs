//! The root index aggregate

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::attributes::AttributeRegistry;
use crate::graph::{CallGraph, CodeGraph};
use crate::lsp::lsp_symbol_kind;
use crate::model::Node;
use crate::modules::ModuleRegistry;

/// Everything the indexing pipeline produced. Immutable once built; the
/// server shares it behind an `Arc` and tools take read-only views.
#[derive(Debug)]
pub struct Index {
    pub call_graph: CallGraph,
    pub modules: ModuleRegistry,
    pub attributes: AttributeRegistry,
    pub code_graph: CodeGraph,
    pub indexed_at: DateTime<Utc>,
    pub build_duration: Duration,
}

impl Index {
    /// Summary counters for `get_index_info`.
    pub fn info(&self) -> IndexInfo {
        let mut symbol_kinds: HashMap<String, usize> = HashMap::new();
        for node in self
            .call_graph
            .functions()
            .chain(self.code_graph.nodes())
        {
            *symbol_kinds.entry(node.kind.name().to_string()).or_default() += 1;
        }
        IndexInfo {
            functions: self.call_graph.function_count(),
            edges: self.call_graph.edge_count(),
            call_sites: self.call_graph.call_site_count(),
            modules: self.modules.len(),
            symbols: self.call_graph.function_count() + self.code_graph.len(),
            symbol_kinds,
            indexed_at: self.indexed_at.to_rfc3339(),
            build_duration_ms: self.build_duration.as_millis() as u64,
        }
    }

    /// Look up a symbol anywhere in the index, callables first.
    pub fn symbol(&self, fqn: &str) -> Option<&Node> {
        self.call_graph
            .function(fqn)
            .or_else(|| self.code_graph.node(fqn))
    }

    /// All symbols whose short name matches, across both graphs, in
    /// deterministic FQN order.
    pub fn symbols_named(&self, name: &str) -> Vec<&Node> {
        let mut hits: Vec<&Node> = self
            .call_graph
            .functions()
            .filter(|n| n.name == name)
            .chain(self.code_graph.nodes().filter(|n| n.name == name))
            .collect();
        hits.sort_by(|a, b| a.fqn.cmp(&b.fqn));
        hits
    }

    /// Every symbol FQN in the index, sorted. Used for suggestion ranking.
    pub fn all_fqns(&self) -> Vec<&str> {
        let mut fqns: Vec<&str> = self
            .call_graph
            .functions()
            .map(|n| n.fqn.as_str())
            .chain(self.code_graph.nodes().map(|n| n.fqn.as_str()))
            .collect();
        fqns.sort_unstable();
        fqns
    }
}

/// Wire shape of `get_index_info`.
#[derive(Debug, Clone, Serialize)]
pub struct IndexInfo {
    pub functions: usize,
    pub edges: usize,
    pub call_sites: usize,
    pub modules: usize,
    pub symbols: usize,
    pub symbol_kinds: HashMap<String, usize>,
    pub indexed_at: String,
    pub build_duration_ms: u64,
}

/// Wire shape of one `find_symbol` match.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolMatch {
    pub fqn: String,
    pub file: String,
    pub line: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub symbol_kind: u8,
    pub symbol_kind_name: String,
    pub scope: crate::model::Scope,
}

impl SymbolMatch {
    pub fn from_node(node: &Node) -> Self {
        let (symbol_kind, symbol_kind_name) = lsp_symbol_kind(node.kind);
        SymbolMatch {
            fqn: node.fqn.clone(),
            file: node.file.to_string_lossy().into_owned(),
            line: node.line,
            kind: node.kind.name().to_string(),
            symbol_kind,
            symbol_kind_name: symbol_kind_name.to_string(),
            scope: node.scope,
        }
    }
}
