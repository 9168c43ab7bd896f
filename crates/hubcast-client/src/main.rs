//! hubcast client entry point.
//!
//! Connects to a hubcast server, prints every received message to stdout,
//! and sends each line typed on stdin to the hub.
//!
//! # Usage
//!
//! ```text
//! hubcast-client [--url <URL>]
//!
//!   hello everyone          broadcast a line to every client
//!   /to <id> <message>      send a message to one connection only
//!   /quit                   close the connection and exit
//! ```
//!
//! Log output goes to stderr; control its level with `RUST_LOG`.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hubcast_client::infrastructure::run_session;

/// Interactive hubcast client.
#[derive(Debug, Parser)]
#[command(
    name = "hubcast-client",
    about = "Send stdin lines to a hubcast server and print what it broadcasts",
    version
)]
struct Cli {
    /// WebSocket URL of the hub.
    #[arg(long, env = "HUBCAST_URL", default_value = "ws://127.0.0.1:8080/ws")]
    url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    run_session(&cli.url).await?;

    // A pending stdin read cannot be cancelled and would keep the runtime
    // from shutting down until the next keypress.
    std::process::exit(0);
}

// ── Tests ─────────────────────────────────────────────────────────────────────
