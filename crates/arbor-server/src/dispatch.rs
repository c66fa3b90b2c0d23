//! JSON-RPC dispatch for the MCP server

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde_json::{Value, json};

use arbor_core::index::Index;
use arbor_core::status::{IndexState, StatusTracker};

use crate::analytics::Analytics;
use crate::rpc::{Request, Response, RpcError, codes};
use crate::tools::{self, ToolError};

/// MCP protocol revision this server speaks.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Per-tool-call deadline before the server reports a query timeout.
pub const DEFAULT_QUERY_DEADLINE: Duration = Duration::from_secs(30);

/// The MCP server core: owns the shared index slot, the status tracker, and
/// the analytics facade. Dispatch itself is synchronous; transports layer
/// their own concurrency on top of `&self`.
pub struct McpServer {
    index: RwLock<Option<Arc<Index>>>,
    status: Arc<StatusTracker>,
    analytics: Arc<Analytics>,
    query_deadline: Duration,
}

impl McpServer {
    /// The `disable_analytics` flag comes from the CLI.
    pub fn new(status: Arc<StatusTracker>, disable_analytics: bool) -> Self {
        McpServer {
            index: RwLock::new(None),
            status,
            analytics: Arc::new(Analytics::new(disable_analytics)),
            query_deadline: DEFAULT_QUERY_DEADLINE,
        }
    }

    /// Publish a finished index. Tools start answering once this is set and
    /// the tracker reports Ready.
    pub fn set_index(&self, index: Arc<Index>) {
        *self.index.write().unwrap_or_else(|e| e.into_inner()) = Some(index);
    }

    pub fn index(&self) -> Option<Arc<Index>> {
        self.index
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn status(&self) -> &StatusTracker {
        &self.status
    }

    pub fn analytics(&self) -> &Analytics {
        &self.analytics
    }

    /// Handle one raw frame. `None` means no reply is owed (notification).
    pub fn handle_line(&self, raw: &str) -> Option<String> {
        let request: Request = match serde_json::from_str(raw) {
            Ok(req) => req,
            Err(_) => {
                let reply = Response::parse_error();
                return serde_json::to_string(&reply).ok();
            }
        };
        let response = self.handle_request(request)?;
        serde_json::to_string(&response).ok()
    }

    /// Handle one decoded request. `None` for notifications.
    pub fn handle_request(&self, request: Request) -> Option<Response> {
        let id = request.id.clone().unwrap_or(Value::Null);

        if request.jsonrpc.as_deref() != Some("2.0") {
            return self.reply(
                &request,
                Response::failure(
                    id,
                    RpcError::new(codes::INVALID_REQUEST, "Invalid Request: jsonrpc must be \"2.0\""),
                ),
            );
        }
        let Some(method) = request.method.clone() else {
            return self.reply(
                &request,
                Response::failure(
                    id,
                    RpcError::new(codes::INVALID_REQUEST, "Invalid Request: missing method"),
                ),
            );
        };

        let response = match method.as_str() {
            "initialize" => Response::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "serverInfo": {
                        "name": "arbor",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                    "capabilities": { "tools": {} },
                }),
            ),
            "initialized" | "notifications/initialized" => return None,
            "tools/list" => Response::success(id, tools::listing()),
            "tools/call" => self.handle_tools_call(id, request.params.as_ref()),
            "status" => Response::success(
                id,
                serde_json::to_value(self.status.snapshot()).unwrap_or_default(),
            ),
            "ping" => Response::success(id, json!({ "status": "ok" })),
            _ => Response::failure(
                id,
                RpcError::with_data(
                    codes::METHOD_NOT_FOUND,
                    "Method not found",
                    json!({ "method": method }),
                ),
            ),
        };
        self.reply(&request, response)
    }

    fn reply(&self, request: &Request, response: Response) -> Option<Response> {
        if request.is_notification() {
            // Errors on notifications are dropped by protocol.
            return None;
        }
        Some(response)
    }

    fn handle_tools_call(&self, id: Value, params: Option<&Value>) -> Response {
        let empty = json!({});
        let params = params.unwrap_or(&empty);
        let name = params.get("name").and_then(Value::as_str).unwrap_or("");
        if name.is_empty() {
            return Response::failure(
                id,
                RpcError::new(codes::INVALID_PARAMS, "Missing tool name"),
            );
        }
        // An unknown tool is a bad `name` argument on a valid method, not a
        // missing JSON-RPC method.
        let Some(tool) = tools::find(name) else {
            return Response::failure(
                id,
                RpcError::with_data(
                    codes::INVALID_PARAMS,
                    format!("Unknown tool: {name}"),
                    json!({ "tool": name }),
                ),
            );
        };

        // Graceful degradation while the index is not servable.
        let snapshot = self.status.snapshot();
        match snapshot.state {
            IndexState::Ready => {}
            IndexState::Failed => {
                return Response::failure(
                    id,
                    RpcError::new(
                        codes::INTERNAL_ERROR,
                        snapshot
                            .error
                            .unwrap_or_else(|| "indexing failed".to_string()),
                    ),
                );
            }
            IndexState::Uninitialized | IndexState::Indexing => {
                return Response::failure(
                    id,
                    RpcError::with_data(
                        codes::INDEX_NOT_READY,
                        "Index not ready",
                        json!({
                            "phase": snapshot.phase,
                            "progress": snapshot.overall_progress,
                        }),
                    ),
                );
            }
        }
        let Some(index) = self.index() else {
            return Response::failure(
                id,
                RpcError::new(codes::INTERNAL_ERROR, "index not available"),
            );
        };

        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));
        let started = Instant::now();
        let outcome = (tool.handler)(&index, &arguments);
        let elapsed = started.elapsed();
        self.analytics
            .record_tool(name, elapsed, outcome.is_ok());

        if elapsed > self.query_deadline {
            return Response::failure(
                id,
                RpcError::with_data(
                    codes::QUERY_TIMEOUT,
                    "Query timeout",
                    json!({ "deadline_ms": self.query_deadline.as_millis() as u64 }),
                ),
            );
        }

        match outcome {
            Ok(body) => Response::success(id, envelope(&body, false)),
            Err(ToolError::Domain { body }) => Response::success(id, envelope(&body, true)),
            Err(ToolError::InvalidParams { message, data }) => Response::failure(
                id,
                RpcError {
                    code: codes::INVALID_PARAMS,
                    message,
                    data,
                },
            ),
            Err(ToolError::Rpc {
                code,
                message,
                data,
            }) => Response::failure(id, RpcError { code, message, data }),
        }
    }
}

/// The MCP tool envelope: the body rides as JSON text content.
fn envelope(body: &Value, is_error: bool) -> Value {
    json!({
        "content": [{
            "type": "text",
            "text": body.to_string(),
        }],
        "isError": is_error,
    })
}
