//! Unit tests for arbor-core invariants that span modules

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;

use crate::graph::{CallGraph, CodeGraph};
use crate::index::Index;
use crate::model::*;
use crate::modules::ModuleRegistry;

fn func(fqn: &str, name: &str) -> Node {
    Node::new(fqn, NodeKind::Function, name, "/p/x.py", 1, Scope::Module)
}

fn resolved_site(caller: &str, target: &str, fqn: &str) -> CallSite {
    CallSite {
        caller: caller.to_string(),
        target_name: target.to_string(),
        target_fqn: fqn.to_string(),
        file: "/p/x.py".into(),
        line: 3,
        column: 5,
        resolved: true,
        failure_reason: None,
        arguments: Vec::new(),
        inferred_type: None,
        type_confidence: None,
        type_source: None,
    }
}

#[test]
fn reverse_edges_mirror_forward_edges() {
    let mut graph = CallGraph::new();
    graph.add_function(func("a.f", "f"));
    graph.add_function(func("a.g", "g"));
    graph.add_function(func("a.h", "h"));
    graph.add_edge("a.f", "a.g");
    graph.add_edge("a.f", "a.h");
    graph.add_edge("a.g", "a.h");

    // reverse_edges[t] = { c : t in edges[c] }, checked both directions.
    for (caller, callee) in graph.all_edges().collect::<Vec<_>>() {
        assert!(graph.callers(callee).iter().any(|c| c == caller));
    }
    let all: Vec<(String, String)> = graph
        .all_edges()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();
    for node in ["a.f", "a.g", "a.h"] {
        for caller in graph.callers(node) {
            assert!(all.contains(&(caller.clone(), node.to_string())));
        }
    }
}

#[test]
fn duplicate_edges_collapse() {
    let mut graph = CallGraph::new();
    graph.add_edge("a.f", "a.g");
    graph.add_edge("a.f", "a.g");
    assert_eq!(graph.callees("a.f").len(), 1);
    assert_eq!(graph.callers("a.g").len(), 1);
}

#[test]
fn resolved_call_sites_imply_edges() {
    let mut graph = CallGraph::new();
    graph.add_function(func("a.f", "f"));
    graph.add_function(func("a.g", "g"));
    graph.add_call_site(resolved_site("a.f", "g", "a.g"));

    for cs in graph.all_call_sites() {
        if cs.resolved {
            assert!(graph.callees(&cs.caller).iter().any(|c| *c == cs.target_fqn));
        }
    }
}

#[test]
fn resolved_targets_exist_or_sites_carry_reasons() {
    let mut graph = CallGraph::new();
    graph.add_function(func("a.f", "f"));
    graph.add_function(func("a.g", "g"));
    graph.add_call_site(resolved_site("a.f", "g", "a.g"));
    graph.add_call_site(CallSite::unresolved(
        "a.f",
        "mystery",
        "/p/x.py",
        9,
        1,
        "receiver type unknown",
    ));

    for cs in graph.all_call_sites() {
        if cs.resolved {
            assert!(graph.contains(&cs.target_fqn));
        } else {
            assert!(cs.failure_reason.is_some());
            assert!(cs.target_fqn.is_empty());
        }
    }
}

#[test]
fn indexing_twice_yields_identical_graphs() {
    let build = || {
        let mut graph = CallGraph::new();
        graph.add_function(func("m.f", "f"));
        graph.add_function(func("m.g", "g"));
        graph.add_call_site(resolved_site("m.f", "g", "m.g"));
        graph
    };
    let a = build();
    let b = build();
    let ser_a = serde_json::to_value(&a).unwrap();
    let ser_b = serde_json::to_value(&b).unwrap();
    assert_eq!(ser_a, ser_b);
}

#[test]
fn index_info_counts_both_graphs() {
    let mut call_graph = CallGraph::new();
    call_graph.add_function(func("m.f", "f"));
    let mut code_graph = CodeGraph::new();
    code_graph.add_node(Node::new(
        "m.C",
        NodeKind::Class,
        "C",
        "/p/m.py",
        1,
        Scope::Module,
    ));
    let mut modules = ModuleRegistry::new();
    modules.insert("m", "/p/m.py");

    let index = Index {
        call_graph,
        modules,
        attributes: crate::attributes::AttributeRegistry::new(),
        code_graph,
        indexed_at: Utc::now(),
        build_duration: Duration::from_millis(12),
    };
    let info = index.info();
    assert_eq!(info.functions, 1);
    assert_eq!(info.symbols, 2);
    assert_eq!(info.modules, 1);
    assert_eq!(info.symbol_kinds.get("class"), Some(&1));
    assert_eq!(info.symbol_kinds.get("function"), Some(&1));
    assert_eq!(info.build_duration_ms, 12);
}

#[test]
fn symbols_named_is_sorted_and_cross_graph() {
    let mut call_graph = CallGraph::new();
    call_graph.add_function(func("b.run", "run"));
    call_graph.add_function(func("a.run", "run"));
    let mut code_graph = CodeGraph::new();
    code_graph.add_node(Node::new(
        "c.run",
        NodeKind::Constant,
        "run",
        "/p/c.py",
        2,
        Scope::Module,
    ));
    let index = Index {
        call_graph,
        modules: ModuleRegistry::new(),
        attributes: crate::attributes::AttributeRegistry::new(),
        code_graph,
        indexed_at: Utc::now(),
        build_duration: Duration::ZERO,
    };
    let fqns: Vec<&str> = index.symbols_named("run").iter().map(|n| n.fqn.as_str()).collect();
    assert_eq!(fqns, vec!["a.run", "b.run", "c.run"]);
}

#[test]
fn node_kind_names_round_trip() {
    let mut seen = HashSet::new();
    for &kind in NodeKind::ALL {
        let name = kind.name();
        assert!(seen.insert(name), "duplicate kind name {name}");
        assert_eq!(NodeKind::parse(name), Some(kind));
    }
    assert_eq!(NodeKind::parse("not_a_kind"), None);
}

#[test]
fn visibility_follows_python_conventions() {
    assert_eq!(Visibility::from_python_name("save"), Visibility::Public);
    assert_eq!(Visibility::from_python_name("_guard"), Visibility::Protected);
    assert_eq!(Visibility::from_python_name("__secret"), Visibility::Private);
    assert_eq!(Visibility::from_python_name("__init__"), Visibility::Public);
}

#[test]
fn union_type_reports_strongest_member() {
    let ty = Type::Union(vec![
        ConcreteType::new("a.Low", 0.4),
        ConcreteType::new("a.High", 0.9),
    ]);
    assert_eq!(ty.fqn(), Some("a.High"));
    assert!((ty.confidence() - 0.9).abs() < f32::EPSILON);
    assert!(!ty.is_any());
    assert!(Type::Any.is_any());
}

#[test]
fn source_location_enclosure() {
    let outer = SourceLocation::new("/p/x.py", 10, 100);
    assert!(outer.encloses(20, 30));
    assert!(outer.encloses(10, 100));
    assert!(!outer.encloses(5, 30));
    assert!(!outer.encloses(90, 110));
    assert_eq!(outer.len(), 90);
}
