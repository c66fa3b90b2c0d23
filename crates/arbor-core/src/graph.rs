//! Call graph and code graph, keyed by FQN strings

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::model::{CallSite, Node};

/// The call graph: callable nodes plus forward/reverse edges and per-caller
/// call-site records.
///
/// Edges are FQN → FQN; the reverse index is maintained as a mirror so that
/// `reverse_edges[t]` contains `c` exactly when `edges[c]` contains `t`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CallGraph {
    functions: HashMap<String, Node>,
    edges: HashMap<String, Vec<String>>,
    reverse_edges: HashMap<String, Vec<String>>,
    call_sites: HashMap<String, Vec<CallSite>>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callable node under its FQN.
    pub fn add_function(&mut self, node: Node) {
        self.functions.insert(node.fqn.clone(), node);
    }

    pub fn function(&self, fqn: &str) -> Option<&Node> {
        self.functions.get(fqn)
    }

    pub fn contains(&self, fqn: &str) -> bool {
        self.functions.contains_key(fqn)
    }

    pub fn functions(&self) -> impl Iterator<Item = &Node> {
        self.functions.values()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Add a caller → callee edge, keeping the reverse index in sync.
    /// Duplicate edges are ignored; insertion order is preserved.
    pub fn add_edge(&mut self, caller: &str, callee: &str) {
        let fwd = self.edges.entry(caller.to_string()).or_default();
        if !fwd.iter().any(|c| c == callee) {
            fwd.push(callee.to_string());
        }
        let rev = self.reverse_edges.entry(callee.to_string()).or_default();
        if !rev.iter().any(|c| c == caller) {
            rev.push(caller.to_string());
        }
    }

    /// Record a call site; resolved sites also materialize an edge.
    pub fn add_call_site(&mut self, site: CallSite) {
        if site.resolved && !site.target_fqn.is_empty() {
            self.add_edge(&site.caller, &site.target_fqn);
        }
        self.call_sites
            .entry(site.caller.clone())
            .or_default()
            .push(site);
    }

    pub fn callees(&self, caller: &str) -> &[String] {
        self.edges.get(caller).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn callers(&self, callee: &str) -> &[String] {
        self.reverse_edges
            .get(callee)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn call_sites_of(&self, caller: &str) -> &[CallSite] {
        self.call_sites
            .get(caller)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All call sites from `caller` whose target matches `callee`, by FQN or
    /// by short name as written.
    pub fn call_sites_between(&self, caller: &str, callee: &str) -> Vec<&CallSite> {
        self.call_sites_of(caller)
            .iter()
            .filter(|cs| {
                cs.target_fqn == callee
                    || cs.target_name == callee
                    || cs.target_fqn.ends_with(&format!(".{callee}"))
            })
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    pub fn call_site_count(&self) -> usize {
        self.call_sites.values().map(Vec::len).sum()
    }

    /// Callables whose short name matches, in deterministic FQN order.
    pub fn functions_named(&self, name: &str) -> Vec<&Node> {
        let mut hits: Vec<&Node> = self
            .functions
            .values()
            .filter(|n| n.name == name)
            .collect();
        hits.sort_by(|a, b| a.fqn.cmp(&b.fqn));
        hits
    }

    /// Iterate all edges as (caller, callee) pairs.
    pub fn all_edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges.iter().flat_map(|(caller, callees)| {
            callees
                .iter()
                .map(move |callee| (caller.as_str(), callee.as_str()))
        })
    }

    /// Iterate all call sites.
    pub fn all_call_sites(&self) -> impl Iterator<Item = &CallSite> {
        self.call_sites.values().flatten()
    }
}

/// All extracted non-callable symbols: classes, constants, fields, Docker
/// entities. Keyed by FQN, with a per-file index for the Docker tools.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CodeGraph {
    nodes: HashMap<String, Node>,
    by_file: HashMap<PathBuf, Vec<String>>,
}

impl CodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) {
        self.by_file
            .entry(node.file.clone())
            .or_default()
            .push(node.fqn.clone());
        self.nodes.insert(node.fqn.clone(), node);
    }

    pub fn node(&self, fqn: &str) -> Option<&Node> {
        self.nodes.get(fqn)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes defined in one file, in extraction order.
    pub fn nodes_in_file(&self, file: &Path) -> Vec<&Node> {
        self.by_file
            .get(file)
            .map(|fqns| fqns.iter().filter_map(|f| self.nodes.get(f)).collect())
            .unwrap_or_default()
    }

    /// Nodes of one kind, in deterministic FQN order.
    pub fn nodes_of_kind(&self, kind: crate::model::NodeKind) -> Vec<&Node> {
        let mut hits: Vec<&Node> = self.nodes.values().filter(|n| n.kind == kind).collect();
        hits.sort_by(|a, b| a.fqn.cmp(&b.fqn));
        hits
    }
}
