//! Arbor CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "arbor")]
#[command(about = "Symbol and call-graph index served over MCP", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project root path (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    root: PathBuf,

    /// Disable anonymous aggregate telemetry
    #[arg(long, global = true)]
    disable_metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the project and print a summary
    Index,
    /// Index the project and serve the MCP protocol
    Serve {
        /// Serve line-delimited JSON-RPC on stdin/stdout
        #[arg(long, conflicts_with = "http")]
        stdio: bool,

        /// Serve HTTP on the given port
        #[arg(long)]
        http: Option<u16>,

        /// Host to bind the HTTP transport to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Generate shell completions
    Completion {
        /// Shell to generate for
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs always go to stderr; stdout belongs to the stdio transport.
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "arbor={log_level},arbor_core={log_level},arbor_indexer={log_level},arbor_server={log_level}"
        )))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Index => commands::index(cli.root),
        Commands::Serve { stdio, http, host } => {
            commands::serve(cli.root, stdio, http, host, cli.disable_metrics).await
        }
        Commands::Completion { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "arbor",
                &mut std::io::stdout(),
            );
            Ok(())
        }
        Commands::Version => {
            println!("arbor v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
