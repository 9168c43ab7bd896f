//! hubcast server entry point.
//!
//! Accepts WebSocket connections and fans every frame a client sends out to
//! all connected clients.
//!
//! # Usage
//!
//! ```text
//! hubcast-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>           TOML config file
//!   --bind <IP>               Listener IP address [default: 0.0.0.0]
//!   --port <PORT>             Listener port [default: 8080]
//!   --path <PATH>             WebSocket endpoint path [default: /ws]
//!   --queue-capacity <N>      Outbound queue capacity per connection [default: 256]
//!   --idle-timeout <SECS>     Close connections silent for SECS seconds (0 = never)
//!   --announce-id             Send each client a welcome envelope with its id
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                 | Flag               |
//! |--------------------------|--------------------|
//! | `HUBCAST_CONFIG`         | `--config`         |
//! | `HUBCAST_BIND`           | `--bind`           |
//! | `HUBCAST_PORT`           | `--port`           |
//! | `HUBCAST_PATH`           | `--path`           |
//! | `HUBCAST_QUEUE_CAPACITY` | `--queue-capacity` |
//! | `HUBCAST_IDLE_TIMEOUT`   | `--idle-timeout`   |
//! | `HUBCAST_ANNOUNCE_ID`    | `--announce-id`    |
//!
//! Flags and environment variables take precedence over the config file,
//! which takes precedence over the built-in defaults.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hubcast_server::application::Hub;
use hubcast_server::domain::config::{idle_timeout_from_secs, parse_ip};
use hubcast_server::domain::{ConfigFile, ServerConfig};
use hubcast_server::infrastructure::run_server;

/// Time given to write loops to flush their close frames after the hub
/// shuts down.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

// ── CLI argument definitions ──────────────────────────────────────────────────

/// hubcast WebSocket broadcast hub.
///
/// Every flag is optional; unset flags fall back to the config file and then
/// to the built-in defaults.
#[derive(Debug, Parser)]
#[command(
    name = "hubcast-server",
    about = "Real-time WebSocket broadcast hub",
    version
)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, env = "HUBCAST_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to bind the WebSocket listener to.
    #[arg(long, env = "HUBCAST_BIND")]
    bind: Option<String>,

    /// TCP port for the WebSocket listener.
    #[arg(long, env = "HUBCAST_PORT")]
    port: Option<u16>,

    /// Request path upgraded to a WebSocket.
    #[arg(long, env = "HUBCAST_PATH")]
    path: Option<String>,

    /// Maximum number of undelivered payloads per connection before it is
    /// evicted as a slow consumer.
    #[arg(long, env = "HUBCAST_QUEUE_CAPACITY")]
    queue_capacity: Option<usize>,

    /// Close a connection that sends nothing for this many seconds.
    /// `0` disables the timeout.
    #[arg(long, value_name = "SECS", env = "HUBCAST_IDLE_TIMEOUT")]
    idle_timeout: Option<u64>,

    /// Send each new connection a `welcome` envelope carrying its id.
    #[arg(long, env = "HUBCAST_ANNOUNCE_ID")]
    announce_id: bool,
}

impl Cli {
    /// Builds the final [`ServerConfig`]: defaults, then the config file,
    /// then flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded, `--bind` is not
    /// an IP address, or the resulting config is invalid.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = ServerConfig::default();

        if let Some(path) = &self.config {
            let file = ConfigFile::load(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?;
            config.apply_file(&file)?;
        }

        if let Some(bind) = &self.bind {
            config.bind_addr.set_ip(parse_ip(bind)?);
        }
        if let Some(port) = self.port {
            config.bind_addr.set_port(port);
        }
        if let Some(path) = self.path {
            config.path = path;
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }
        if let Some(secs) = self.idle_timeout {
            config.idle_timeout = idle_timeout_from_secs(secs);
        }
        if self.announce_id {
            config.announce_id = true;
        }

        config.validate()?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// # What happens at startup
///
/// 1. `tracing_subscriber` is initialised; `RUST_LOG` controls the level.
/// 2. CLI arguments (and the optional config file) become a [`ServerConfig`].
/// 3. The hub task is started.
/// 4. A Ctrl+C handler clears the shared `running` flag.
/// 5. [`run_server`] accepts connections until the flag is cleared.
/// 6. The hub is shut down, which closes every connection's queue.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_server_config()?;

    info!(
        "hubcast server starting: bind={}, path={}, queue_capacity={}, idle_timeout={:?}",
        config.bind_addr, config.path, config.queue_capacity, config.idle_timeout
    );

    let (hub, hub_task) = Hub::spawn();

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    let served = run_server(config, hub.clone(), running).await;

    // Tear the hub down even when the listener never started.
    if hub.shutdown().is_ok() {
        hub_task.await.context("hub task failed")?;
        tokio::time::sleep(SHUTDOWN_GRACE).await;
    }
    served?;

    info!("hubcast server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
