//! Line-delimited transport
//!
//! One JSON-RPC frame per line, responses written in request order. The
//! reader/writer form doubles as the embeddable streaming NDJSON transport;
//! `serve` binds it to the process's standard streams.

use std::io::{self, BufRead, Write};

use crate::dispatch::McpServer;

/// Pump newline-delimited requests from `reader` into the server, writing
/// newline-delimited responses to `writer`. Blank lines are skipped;
/// notifications produce no output line. Returns cleanly on EOF.
pub fn run<R: BufRead, W: Write>(server: &McpServer, reader: R, mut writer: W) -> io::Result<()> {
    for line in reader.lines() {
        let line = line?;
        let frame = line.trim();
        if frame.is_empty() {
            continue;
        }
        if let Some(response) = server.handle_line(frame) {
            writer.write_all(response.as_bytes())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
    }
    Ok(())
}

/// Serve on stdin/stdout until EOF.
pub fn serve(server: &McpServer) -> io::Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    tracing::info!("stdio transport ready");
    run(server, stdin.lock(), stdout.lock())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::McpServer;
    use arbor_core::status::StatusTracker;
    use std::sync::Arc;

    fn server() -> McpServer {
        McpServer::new(Arc::new(StatusTracker::new()), true)
    }

    #[test]
    fn responds_line_per_request() {
        let input = "\
{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n\
\n\
{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n";
        let mut out = Vec::new();
        run(&server(), input.as_bytes(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"id\":1"));
        assert!(lines[1].contains("\"id\":2"));
    }

    #[test]
    fn notifications_produce_no_output() {
        let input = "{\"jsonrpc\":\"2.0\",\"method\":\"initialized\"}\n";
        let mut out = Vec::new();
        run(&server(), input.as_bytes(), &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn malformed_json_gets_parse_error_with_null_id() {
        let input = "{nope\n";
        let mut out = Vec::new();
        run(&server(), input.as_bytes(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("-32700"));
        assert!(text.contains("\"id\":null"));
    }

    #[test]
    fn eof_is_clean_shutdown() {
        let mut out = Vec::new();
        run(&server(), &b""[..], &mut out).unwrap();
        assert!(out.is_empty());
    }
}
