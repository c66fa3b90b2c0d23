//! Arbor Server — MCP JSON-RPC serving over stdio and HTTP+SSE

pub mod analytics;
pub mod dispatch;
pub mod http;
pub mod query;
pub mod rpc;
pub mod stdio;
pub mod tools;


pub use analytics::Analytics;
pub use dispatch::{McpServer, PROTOCOL_VERSION};
pub use http::{HttpConfig, HttpServer, ServeError};
pub use query::{DetectedQuery, QueryPattern, QueryResolver};
pub use rpc::{Request, Response, RpcError, codes};
