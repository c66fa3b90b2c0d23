//! Symbol and call-graph tools

use std::collections::HashSet;

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use serde_json::{Value, json};

use arbor_core::index::{Index, SymbolMatch};
use arbor_core::model::{Node, NodeKind};

use super::{ToolError, ToolOutcome, pagination, paginated_body, require_str, str_arg};
use crate::rpc::codes;

pub(super) fn find_symbol_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": { "type": "string" },
            "type": { "type": "string" },
            "types": { "type": "array", "items": { "type": "string" } },
            "module": { "type": "string" },
            "limit": { "type": "integer" },
            "cursor": { "type": "string" },
        },
    })
}

pub(super) fn callers_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "function": { "type": "string" },
            "limit": { "type": "integer" },
            "cursor": { "type": "string" },
        },
        "required": ["function"],
    })
}

pub(super) fn call_details_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "caller": { "type": "string" },
            "callee": { "type": "string" },
        },
        "required": ["caller", "callee"],
    })
}

/// Hard cap on a single query's result set, far above any page size.
const RESULT_HARD_CAP: usize = 10_000;

fn valid_types() -> Vec<&'static str> {
    NodeKind::ALL.iter().map(|k| k.name()).collect()
}

fn parse_kind_filter(params: &Value) -> Result<Option<HashSet<NodeKind>>, ToolError> {
    let single = str_arg(params, "type");
    let many = params.get("types").and_then(Value::as_array);

    if single.is_some() && many.is_some() {
        return Err(ToolError::invalid("Cannot specify both 'type' and 'types'"));
    }

    let names: Vec<String> = if let Some(one) = single {
        vec![one.to_string()]
    } else if let Some(list) = many {
        list.iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    } else {
        return Ok(None);
    };

    let mut kinds = HashSet::new();
    for name in &names {
        match NodeKind::parse(name) {
            Some(kind) => {
                kinds.insert(kind);
            }
            None => {
                return Err(ToolError::InvalidParams {
                    message: format!("Invalid symbol type: {name}"),
                    data: Some(json!({ "valid_types": valid_types() })),
                });
            }
        }
    }
    Ok(Some(kinds))
}

/// Top fuzzy matches for a name across every FQN in the index.
pub(crate) fn suggestions_for(index: &Index, query: &str) -> Vec<String> {
    let matcher = SkimMatcherV2::default();
    let mut scored: Vec<(i64, &str)> = index
        .all_fqns()
        .into_iter()
        .filter_map(|fqn| matcher.fuzzy_match(fqn, query).map(|score| (score, fqn)))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(b.1)));
    scored.into_iter().take(5).map(|(_, f)| f.to_string()).collect()
}

pub(super) fn find_symbol(index: &Index, params: &Value) -> ToolOutcome {
    let name = str_arg(params, "name");
    let module = str_arg(params, "module");
    let kinds = parse_kind_filter(params)?;

    if name.is_none() && module.is_none() && kinds.is_none() {
        return Err(ToolError::invalid(
            "At least one filter required: name, type, types, or module",
        ));
    }

    let module_prefix = module.map(|m| format!("{m}."));
    let mut matches: Vec<&Node> = index
        .call_graph
        .functions()
        .chain(index.code_graph.nodes())
        .filter(|n| name.map(|q| n.name == q).unwrap_or(true))
        .filter(|n| {
            kinds
                .as_ref()
                .map(|ks| ks.contains(&n.kind))
                .unwrap_or(true)
        })
        .filter(|n| match (&module_prefix, module) {
            (Some(prefix), Some(m)) => n.fqn.starts_with(prefix) || n.fqn == m,
            _ => true,
        })
        .collect();
    matches.sort_by(|a, b| a.fqn.cmp(&b.fqn));

    if matches.is_empty() {
        let query = name.or(module).unwrap_or_default();
        return Err(ToolError::Rpc {
            code: codes::SYMBOL_NOT_FOUND,
            message: "Symbol not found".to_string(),
            data: Some(json!({ "suggestions": suggestions_for(index, query) })),
        });
    }
    if matches.len() > RESULT_HARD_CAP {
        return Err(ToolError::Rpc {
            code: codes::RESULTS_TRUNCATED,
            message: "Results truncated".to_string(),
            data: Some(json!({
                "total": matches.len(),
                "cap": RESULT_HARD_CAP,
                "suggestion": "Narrow the query with module or type filters",
            })),
        });
    }

    let rows: Vec<SymbolMatch> = matches.iter().map(|n| SymbolMatch::from_node(n)).collect();
    let (offset, limit) = pagination(params);
    let mut body = paginated_body("matches", &rows, offset, limit, name.unwrap_or_default());

    let mut filters = serde_json::Map::new();
    if let Some(n) = name {
        filters.insert("name".into(), n.into());
    }
    if let Some(ks) = &kinds {
        let mut names: Vec<&str> = ks.iter().map(|k| k.name()).collect();
        names.sort_unstable();
        filters.insert("types".into(), json!(names));
    }
    if let Some(m) = module {
        filters.insert("module".into(), m.into());
    }
    body["filters_applied"] = Value::Object(filters);
    Ok(body)
}

/// Outcome of looking a function name up: exact FQN first, then short name.
enum FunctionLookup<'a> {
    Found(&'a Node),
    Missing,
    Ambiguous(Vec<&'a Node>),
}

fn lookup_function<'a>(index: &'a Index, name: &str) -> FunctionLookup<'a> {
    if let Some(node) = index.call_graph.function(name) {
        return FunctionLookup::Found(node);
    }
    let candidates = index.call_graph.functions_named(name);
    match candidates.len() {
        0 => FunctionLookup::Missing,
        1 => FunctionLookup::Found(candidates[0]),
        _ => FunctionLookup::Ambiguous(candidates),
    }
}

fn ambiguous_function_error(name: &str, candidates: &[&Node]) -> ToolError {
    let alternatives: Vec<&str> = candidates.iter().map(|n| n.fqn.as_str()).collect();
    ToolError::Domain {
        body: json!({
            "error": format!("Function name '{name}' is ambiguous"),
            "suggestion": "Use a fully-qualified name",
            "alternatives": alternatives,
        }),
    }
}

/// Resolve a `function` argument or produce the matching domain error.
fn resolve_function<'a>(index: &'a Index, name: &str) -> Result<&'a Node, ToolError> {
    match lookup_function(index, name) {
        FunctionLookup::Found(node) => Ok(node),
        FunctionLookup::Missing => Err(ToolError::domain(
            format!("Function '{name}' not found"),
            suggestions_for(index, name).first().cloned(),
        )),
        FunctionLookup::Ambiguous(candidates) => Err(ambiguous_function_error(name, &candidates)),
    }
}

fn edge_rows(index: &Index, fqns: &[String]) -> Vec<Value> {
    fqns.iter()
        .map(|fqn| match index.call_graph.function(fqn) {
            Some(node) => json!({
                "fqn": node.fqn,
                "file": node.file.to_string_lossy(),
                "line": node.line,
                "type": node.kind.name(),
            }),
            None => json!({ "fqn": fqn }),
        })
        .collect()
}

pub(super) fn get_callers(index: &Index, params: &Value) -> ToolOutcome {
    let name = require_str(params, "function")?;
    let node = resolve_function(index, name)?;
    let mut callers = index.call_graph.callers(&node.fqn).to_vec();
    callers.sort();
    let rows = edge_rows(index, &callers);
    let (offset, limit) = pagination(params);
    let mut body = paginated_body("callers", &rows, offset, limit, name);
    body["function"] = Value::String(node.fqn.clone());
    Ok(body)
}

pub(super) fn get_callees(index: &Index, params: &Value) -> ToolOutcome {
    let name = require_str(params, "function")?;
    let node = resolve_function(index, name)?;
    let mut callees = index.call_graph.callees(&node.fqn).to_vec();
    callees.sort();
    let rows = edge_rows(index, &callees);
    let (offset, limit) = pagination(params);
    let mut body = paginated_body("callees", &rows, offset, limit, name);
    body["function"] = Value::String(node.fqn.clone());
    Ok(body)
}

pub(super) fn get_call_details(index: &Index, params: &Value) -> ToolOutcome {
    let caller = require_str(params, "caller")?;
    let callee = require_str(params, "callee")?;
    let caller_node = resolve_function(index, caller)?;

    // The callee resolves like any other function argument; a short name
    // shared by several functions is ambiguous here too. A name the index
    // doesn't know may still label unresolved sites, so it falls through
    // as written.
    let callee_label = match lookup_function(index, callee) {
        FunctionLookup::Found(node) => node.fqn.clone(),
        FunctionLookup::Ambiguous(candidates) => {
            return Err(ambiguous_function_error(callee, &candidates));
        }
        FunctionLookup::Missing => callee.to_string(),
    };

    let sites = index
        .call_graph
        .call_sites_between(&caller_node.fqn, &callee_label);
    if sites.is_empty() {
        return Err(ToolError::domain(
            format!("No calls from '{}' to '{callee_label}'", caller_node.fqn),
            Some("Check get_callees for the actual targets".to_string()),
        ));
    }
    Ok(json!({
        "caller": caller_node.fqn,
        "callee": callee_label,
        "call_sites": sites,
    }))
}
