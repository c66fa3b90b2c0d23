//! The fixed tool catalog
//!
//! Every tool takes the frozen index plus raw JSON params and returns either
//! a JSON body, a parameter error (surfaced as -32602), a protocol-level
//! error with its own code, or a domain error that rides inside the tool
//! envelope with `isError: true`.

pub mod docker;
pub mod instance;
pub mod modules;
pub mod symbols;

use serde_json::{Value, json};

use arbor_core::cursor;
use arbor_core::index::Index;

/// How a tool run can fail.
#[derive(Debug)]
pub enum ToolError {
    /// Bad arguments: missing, malformed, or mutually exclusive.
    InvalidParams { message: String, data: Option<Value> },
    /// Protocol-level error with a specific JSON-RPC code.
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    /// Business-level failure: the RPC call succeeds, the envelope says
    /// `isError` and the body explains.
    Domain { body: Value },
}

impl ToolError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ToolError::InvalidParams {
            message: message.into(),
            data: None,
        }
    }

    pub fn domain(error: impl Into<String>, suggestion: Option<String>) -> Self {
        let mut body = json!({ "error": error.into() });
        if let Some(s) = suggestion {
            body["suggestion"] = Value::String(s);
        }
        ToolError::Domain { body }
    }
}

pub type ToolOutcome = Result<Value, ToolError>;

/// One catalog entry.
pub struct Tool {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: fn() -> Value,
    pub handler: fn(&Index, &Value) -> ToolOutcome,
}

/// The fixed catalog, in listing order.
pub fn catalog() -> Vec<Tool> {
    let mut tools = vec![
        Tool {
            name: "get_index_info",
            description: "Summary of the index: symbol, edge, and module counts plus build metadata.",
            input_schema: || json!({ "type": "object", "properties": {} }),
            handler: modules::get_index_info,
        },
        Tool {
            name: "find_symbol",
            description: "Find symbols by name, kind, and/or module. At least one filter is required.",
            input_schema: symbols::find_symbol_schema,
            handler: symbols::find_symbol,
        },
        Tool {
            name: "get_callers",
            description: "Functions that call the given function.",
            input_schema: symbols::callers_schema,
            handler: symbols::get_callers,
        },
        Tool {
            name: "get_callees",
            description: "Functions the given function calls.",
            input_schema: symbols::callers_schema,
            handler: symbols::get_callees,
        },
        Tool {
            name: "get_call_details",
            description: "Call-site records between a caller and a callee, including arguments and inferred types.",
            input_schema: symbols::call_details_schema,
            handler: symbols::get_call_details,
        },
        Tool {
            name: "resolve_import",
            description: "Resolve an import path to a project file.",
            input_schema: || {
                json!({
                    "type": "object",
                    "properties": { "import": { "type": "string" } },
                    "required": ["import"],
                })
            },
            handler: modules::resolve_import,
        },
        Tool {
            name: "find_module",
            description: "Find modules matching a name.",
            input_schema: || {
                json!({
                    "type": "object",
                    "properties": { "module": { "type": "string" } },
                    "required": ["module"],
                })
            },
            handler: modules::find_module,
        },
        Tool {
            name: "list_modules",
            description: "List all indexed modules.",
            input_schema: || {
                json!({
                    "type": "object",
                    "properties": {
                        "limit": { "type": "integer" },
                        "cursor": { "type": "string" },
                    },
                })
            },
            handler: modules::list_modules,
        },
    ];
    tools.extend(docker::catalog());
    tools.extend(instance::catalog());
    tools
}

pub fn find(name: &str) -> Option<Tool> {
    catalog().into_iter().find(|t| t.name == name)
}

/// Shape returned by `tools/list`.
pub fn listing() -> Value {
    let tools: Vec<Value> = catalog()
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "inputSchema": (t.input_schema)(),
            })
        })
        .collect();
    json!({ "tools": tools })
}

// ── Shared argument helpers ─────────────────────────────────────

pub(crate) fn str_arg<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

pub(crate) fn require_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    match str_arg(params, key) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(ToolError::invalid(format!(
            "Missing required parameter: {key}"
        ))),
    }
}

pub(crate) fn bool_arg(params: &Value, key: &str) -> Option<bool> {
    params.get(key).and_then(Value::as_bool)
}

pub(crate) fn u64_arg(params: &Value, key: &str) -> Option<u64> {
    params.get(key).and_then(Value::as_u64)
}

/// Decode pagination arguments: `limit` (default 50, max 500) and the opaque
/// `cursor`. A malformed cursor resets to offset zero.
pub(crate) fn pagination(params: &Value) -> (usize, usize) {
    let limit = cursor::clamp_limit(u64_arg(params, "limit"));
    let offset = str_arg(params, "cursor")
        .map(cursor::decode)
        .map(|c| c.offset)
        .unwrap_or(0);
    (offset, limit)
}

/// Standard paginated response body: items under `key`, pagination block,
/// `next_cursor` only when more remain.
pub(crate) fn paginated_body<T: serde::Serialize + Clone>(
    key: &str,
    items: &[T],
    offset: usize,
    limit: usize,
    cursor_query: &str,
) -> Value {
    let page = cursor::paginate(items, offset, limit, cursor_query);
    let mut pagination = json!({
        "total": page.total,
        "offset": page.offset,
        "limit": page.limit,
        "has_more": page.has_more,
    });
    if let Some(next) = page.next_cursor {
        pagination["next_cursor"] = Value::String(next);
    }
    let mut body = serde_json::Map::new();
    body.insert(
        key.to_string(),
        serde_json::to_value(&page.items).unwrap_or_default(),
    );
    body.insert("pagination".to_string(), pagination);
    Value::Object(body)
}
