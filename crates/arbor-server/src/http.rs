//! HTTP transport: JSON-RPC over POST, health, and SSE
//!
//! CORS is handled inline so that unknown origins receive no
//! `Access-Control-Allow-Origin` header at all and preflights answer 204,
//! matching the wire contract exactly.

use std::convert::Infallible;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use chrono::Utc;
use futures_util::StreamExt;
use futures_util::stream::Stream;
use serde_json::json;
use thiserror::Error;

use crate::dispatch::McpServer;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("server already running")]
    AlreadyRunning,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// `["*"]` allows any origin; anything else is an allowlist.
    pub allowed_origins: Vec<String>,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            host: "127.0.0.1".to_string(),
            port: 7432,
            allowed_origins: vec!["*".to_string()],
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

pub(crate) struct AppState {
    pub server: Arc<McpServer>,
    pub origins: Vec<String>,
}

/// HTTP front end over a dispatch core. `start` refuses to run twice.
pub struct HttpServer {
    state: Arc<AppState>,
    config: HttpConfig,
    running: RwLock<bool>,
}

impl HttpServer {
    pub fn new(server: Arc<McpServer>, config: HttpConfig) -> Self {
        HttpServer {
            state: Arc::new(AppState {
                server,
                origins: config.allowed_origins.clone(),
            }),
            config,
            running: RwLock::new(false),
        }
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    pub fn is_running(&self) -> bool {
        *self.running.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Bind and serve until the task is cancelled.
    pub async fn start(&self) -> Result<(), ServeError> {
        {
            let mut running = self.running.write().unwrap_or_else(|e| e.into_inner());
            if *running {
                return Err(ServeError::AlreadyRunning);
            }
            *running = true;
        }
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("http transport listening on {addr}");
        let result = axum::serve(listener, self.router()).await;
        *self.running.write().unwrap_or_else(|e| e.into_inner()) = false;
        result.map_err(ServeError::Io)
    }
}

pub(crate) fn router(state: Arc<AppState>) -> Router {
    use axum::routing::post;
    Router::new()
        .route(
            "/",
            post(rpc_handler)
                .options(preflight_handler)
                .get(method_not_allowed)
                .put(method_not_allowed)
                .delete(method_not_allowed)
                .patch(method_not_allowed),
        )
        .route("/health", get(health_handler))
        .route("/events", get(sse_handler))
        .with_state(state)
}

/// CORS response headers for one request. Unknown origins get nothing.
fn cors_headers(origins: &[String], request_origin: Option<&HeaderValue>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let allow = if origins.iter().any(|o| o == "*") {
        Some(HeaderValue::from_static("*"))
    } else {
        request_origin
            .and_then(|origin| origin.to_str().ok())
            .filter(|origin| origins.iter().any(|o| o == origin))
            .and_then(|origin| HeaderValue::from_str(origin).ok())
    };
    if let Some(allow) = allow {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("POST, GET, OPTIONS"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        );
    }
    headers
}

pub(crate) async fn rpc_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let cors = cors_headers(&state.origins, headers.get(header::ORIGIN));

    let json_content = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false);
    if !json_content {
        return (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            cors,
            "Content-Type must be application/json",
        )
            .into_response();
    }
    if body.len() > MAX_BODY_BYTES {
        return (StatusCode::BAD_REQUEST, cors, "request body too large").into_response();
    }
    let Ok(text) = std::str::from_utf8(&body) else {
        return (StatusCode::BAD_REQUEST, cors, "request body must be UTF-8").into_response();
    };

    match state.server.handle_line(text) {
        Some(reply) => {
            let mut headers = cors;
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            (StatusCode::OK, headers, reply).into_response()
        }
        None => (StatusCode::NO_CONTENT, cors).into_response(),
    }
}

pub(crate) async fn preflight_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let cors = cors_headers(&state.origins, headers.get(header::ORIGIN));
    (StatusCode::NO_CONTENT, cors).into_response()
}

pub(crate) async fn method_not_allowed() -> Response {
    (StatusCode::METHOD_NOT_ALLOWED, "use POST /").into_response()
}

pub(crate) async fn health_handler() -> Response {
    let body = json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    });
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

/// One `connected` frame, then the stream parks until the client leaves.
pub(crate) async fn sse_handler(
    State(_state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let connected = Event::default().event("connected").data(
        json!({
            "server": "arbor",
            "timestamp": Utc::now().to_rfc3339(),
        })
        .to_string(),
    );
    let stream = futures_util::stream::once(async move { Ok(connected) })
        .chain(futures_util::stream::pending());
    Sse::new(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::status::StatusTracker;

    fn state(origins: &[&str]) -> Arc<AppState> {
        Arc::new(AppState {
            server: Arc::new(McpServer::new(Arc::new(StatusTracker::new()), true)),
            origins: origins.iter().map(|s| s.to_string()).collect(),
        })
    }

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers
    }

    #[tokio::test]
    async fn rpc_round_trip() {
        let body = Bytes::from(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#);
        let response = rpc_handler(State(state(&["*"])), json_headers(), body).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }

    #[tokio::test]
    async fn wrong_content_type_is_415() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let body = Bytes::from(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#);
        let response = rpc_handler(State(state(&["*"])), headers, body).await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn oversized_body_is_400() {
        let body = Bytes::from(vec![b' '; MAX_BODY_BYTES + 1]);
        let response = rpc_handler(State(state(&["*"])), json_headers(), body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn notifications_get_204() {
        let body = Bytes::from(r#"{"jsonrpc":"2.0","method":"initialized"}"#);
        let response = rpc_handler(State(state(&["*"])), json_headers(), body).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn preflight_is_204_with_cors() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_static("https://a.dev"));
        let response = preflight_handler(State(state(&["https://a.dev"])), headers).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://a.dev"
        );
    }

    #[tokio::test]
    async fn unknown_origin_gets_no_cors_header() {
        let mut headers = json_headers();
        headers.insert(header::ORIGIN, HeaderValue::from_static("https://evil.dev"));
        let body = Bytes::from(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#);
        let response = rpc_handler(State(state(&["https://a.dev"])), headers, body).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            !response
                .headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        );
    }

    #[tokio::test]
    async fn other_methods_are_405() {
        let response = method_not_allowed().await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn health_reports_timestamp() {
        let response = health_handler().await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn start_twice_is_refused() {
        let server = Arc::new(McpServer::new(Arc::new(StatusTracker::new()), true));
        let http = HttpServer::new(server, HttpConfig::default());
        assert!(!http.is_running());
        {
            let mut running = http.running.write().unwrap();
            *running = true;
        }
        assert!(http.is_running());
        assert!(matches!(
            http.start().await,
            Err(ServeError::AlreadyRunning)
        ));
    }
}
