//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;

use arbor_core::status::StatusTracker;
use arbor_indexer::pipeline::{IndexerConfig, build_index};
use arbor_server::http::{HttpConfig, HttpServer};
use arbor_server::{McpServer, stdio};

/// One-shot index run with a printed summary. Exit code 1 on failure.
pub fn index(root: PathBuf) -> anyhow::Result<()> {
    tracing::info!("indexing {}", root.display());
    let status = StatusTracker::new();
    let index = build_index(&IndexerConfig::new(root), &status)?;
    let info = index.info();
    println!(
        "indexed {} symbols ({} callable) across {} modules: {} edges, {} call sites, {} ms",
        info.symbols,
        info.functions,
        info.modules,
        info.edges,
        info.call_sites,
        info.build_duration_ms,
    );
    Ok(())
}

/// Serve MCP over the chosen transport, indexing in the background so the
/// server can answer `status`/`ping` (and degrade gracefully) from the very
/// first request.
pub async fn serve(
    root: PathBuf,
    stdio_transport: bool,
    http_port: Option<u16>,
    host: String,
    disable_metrics: bool,
) -> anyhow::Result<()> {
    let status = Arc::new(StatusTracker::new());
    let server = Arc::new(McpServer::new(status.clone(), disable_metrics));

    let index_root = root.clone();
    let index_server = server.clone();
    std::thread::spawn(move || {
        match build_index(&IndexerConfig::new(index_root), &status) {
            Ok(index) => index_server.set_index(Arc::new(index)),
            Err(e) => tracing::error!("indexing failed: {e}"),
        }
    });

    match http_port {
        Some(port) if !stdio_transport => {
            let config = HttpConfig {
                host,
                port,
                ..HttpConfig::default()
            };
            HttpServer::new(server, config).start().await?;
        }
        _ => {
            // Default transport; EOF on stdin is a clean shutdown.
            tokio::task::spawn_blocking(move || stdio::serve(&server)).await??;
        }
    }
    Ok(())
}
