//! Integration tests for Arbor
//!
//! These drive the whole stack — indexing a fixture tree, then speaking
//! wire-level JSON-RPC to the server — the way an MCP client would.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tempfile::TempDir;

use arbor_core::cursor;
use arbor_core::status::StatusTracker;
use arbor_indexer::pipeline::{IndexerConfig, build_index};
use arbor_server::{McpServer, stdio};

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn indexed_server() -> (Arc<McpServer>, TempDir) {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "myapp/auth.py", "def validate_user():\n    return True\n");
    write(root, "myapp/views.py", "def login():\n    validate_user()\n");
    write(root, "Dockerfile", "FROM python:3.11\nUSER root\n");

    let status = Arc::new(StatusTracker::new());
    let index = build_index(&IndexerConfig::new(root), &status).unwrap();
    let server = Arc::new(McpServer::new(status, true));
    server.set_index(Arc::new(index));
    (server, dir)
}

/// Run a full newline-delimited session through the stdio transport and
/// collect the response lines.
fn session(server: &McpServer, frames: &[&str]) -> Vec<Value> {
    let input = frames.join("\n") + "\n";
    let mut out = Vec::new();
    stdio::run(server, input.as_bytes(), &mut out).unwrap();
    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn tool_text(response: &Value) -> Value {
    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    serde_json::from_str(text).unwrap()
}

#[test]
fn full_wire_session() {
    let (server, _dir) = indexed_server();
    let replies = session(
        &server,
        &[
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#,
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"find_symbol","arguments":{"name":"validate_user"}}}"#,
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"get_callers","arguments":{"function":"validate_user"}}}"#,
            r#"{"jsonrpc":"2.0","id":5,"method":"ping"}"#,
        ],
    );
    // The notification produced no reply line.
    assert_eq!(replies.len(), 5);

    assert_eq!(replies[0]["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(replies[1]["result"]["tools"].as_array().unwrap().len(), 14);

    let found = tool_text(&replies[2]);
    assert_eq!(found["matches"][0]["fqn"], "myapp.auth.validate_user");
    assert_eq!(found["matches"][0]["symbol_kind"], 12);
    assert_eq!(found["matches"][0]["symbol_kind_name"], "Function");

    let callers = tool_text(&replies[3]);
    assert_eq!(callers["callers"][0]["fqn"], "myapp.views.login");

    assert_eq!(replies[4]["result"]["status"], "ok");
}

#[test]
fn degraded_session_while_indexing() {
    let status = Arc::new(StatusTracker::new());
    status.start_indexing();
    let server = McpServer::new(status, true);

    let replies = session(
        &server,
        &[
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"find_symbol","arguments":{"name":"x"}}}"#,
            r#"{"jsonrpc":"2.0","id":2,"method":"status"}"#,
            r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#,
        ],
    );
    assert_eq!(replies[0]["error"]["code"], -32002);
    assert_eq!(replies[0]["error"]["message"], "Index not ready");
    assert_eq!(replies[1]["result"]["state"], "indexing");
    assert_eq!(replies[2]["result"]["status"], "ok");
}

#[test]
fn dockerfile_security_over_the_wire() {
    let (server, _dir) = indexed_server();
    let replies = session(
        &server,
        &[
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"find_dockerfile_instructions","arguments":{"instruction_type":"FROM","has_digest":false}}}"#,
        ],
    );
    let body = tool_text(&replies[0]);
    let matches = body["matches"].as_array().unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["security_issue"], "No digest pinning (CWE-1188)");
    assert_eq!(matches[0]["risk_level"], "MEDIUM");
}

#[test]
fn cursor_contract() {
    // encode/decode round trip.
    let token = cursor::encode(100, "q");
    let decoded = cursor::decode(&token);
    assert_eq!(decoded.offset, 100);
    assert_eq!(decoded.query, "q");
    assert_eq!(cursor::decode("").offset, 0);

    // Paginating a..j with limit 3 yields 3+3+3+1.
    let items: Vec<String> = ('a'..='j').map(|c| c.to_string()).collect();
    let mut pages = Vec::new();
    let mut offset = 0;
    loop {
        let page = cursor::paginate(&items, offset, 3, "alpha");
        pages.push(page.items.len());
        match page.next_cursor {
            Some(next) => offset = cursor::decode(&next).offset,
            None => {
                assert!(!page.has_more);
                break;
            }
        }
    }
    assert_eq!(pages, vec![3, 3, 3, 1]);
}

#[test]
fn unknown_tool_is_invalid_params() {
    let (server, _dir) = indexed_server();
    let replies = session(
        &server,
        &[
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"launch_missiles","arguments":{}}}"#,
        ],
    );
    assert_eq!(replies[0]["error"]["code"], -32602);
    assert_eq!(replies[0]["error"]["data"]["tool"], "launch_missiles");
}

#[test]
fn malformed_frame_mid_session_does_not_kill_the_server() {
    let (server, _dir) = indexed_server();
    let replies = session(
        &server,
        &[
            "this is not json",
            r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#,
        ],
    );
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0]["error"]["code"], -32700);
    assert_eq!(replies[0]["id"], Value::Null);
    assert_eq!(replies[1]["result"]["status"], "ok");
}
