//! Server configuration types.
//!
//! [`ServerConfig`] is the single source of truth for all runtime settings.
//! It is assembled at startup from three layers, highest precedence first:
//!
//! 1. Command-line flags / `HUBCAST_*` environment variables (see `main.rs`)
//! 2. An optional TOML file ([`ConfigFile`])
//! 3. Built-in defaults ([`ServerConfig::default`])
//!
//! # TOML file format
//!
//! Every key is optional; absent keys keep the default value.
//!
//! ```toml
//! bind = "127.0.0.1"
//! port = 9000
//! path = "/ws"
//! queue_capacity = 512
//! idle_timeout_secs = 300   # 0 disables the idle timeout
//! announce_id = true
//! ```

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default capacity of each connection's outbound queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default WebSocket endpoint path.
pub const DEFAULT_PATH: &str = "/ws";

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// `bind` is not an IP address.
    #[error("invalid bind address: '{0}'")]
    InvalidBindAddress(String),

    /// An outbound queue must hold at least one payload.
    #[error("queue capacity must be at least 1")]
    InvalidQueueCapacity,

    /// The endpoint path must be absolute.
    #[error("endpoint path must start with '/': '{0}'")]
    InvalidPath(String),
}

/// All runtime configuration for the hub server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address and port the WebSocket listener binds to.
    pub bind_addr: SocketAddr,

    /// Request path that is upgraded to a WebSocket.  Any other path is
    /// rejected during the handshake.
    pub path: String,

    /// Capacity of each connection's outbound queue.  A connection whose
    /// queue is full when a broadcast arrives is evicted.
    pub queue_capacity: usize,

    /// Ends a connection whose peer sends nothing for this long.
    ///
    /// `None` (the default) waits for the transport to fail on its own.
    pub idle_timeout: Option<Duration>,

    /// Sends each new connection a `welcome` envelope carrying its id, so
    /// clients can address each other with directed messages.
    pub announce_id: bool,
}

impl Default for ServerConfig {
    /// | Field          | Default        |
    /// |----------------|----------------|
    /// | bind_addr      | `0.0.0.0:8080` |
    /// | path           | `/ws`          |
    /// | queue_capacity | 256            |
    /// | idle_timeout   | disabled       |
    /// | announce_id    | `false`        |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            path: DEFAULT_PATH.to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            idle_timeout: None,
            announce_id: false,
        }
    }
}

impl ServerConfig {
    /// Overlays every key present in `file` onto this config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBindAddress`] if `bind` is not an IP.
    pub fn apply_file(&mut self, file: &ConfigFile) -> Result<(), ConfigError> {
        if let Some(bind) = &file.bind {
            self.bind_addr.set_ip(parse_ip(bind)?);
        }
        if let Some(port) = file.port {
            self.bind_addr.set_port(port);
        }
        if let Some(path) = &file.path {
            self.path = path.clone();
        }
        if let Some(capacity) = file.queue_capacity {
            self.queue_capacity = capacity;
        }
        if let Some(secs) = file.idle_timeout_secs {
            self.idle_timeout = idle_timeout_from_secs(secs);
        }
        if let Some(announce) = file.announce_id {
            self.announce_id = announce;
        }
        Ok(())
    }

    /// Checks invariants that the rest of the server relies on.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero queue capacity or a relative path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity);
        }
        if !self.path.starts_with('/') {
            return Err(ConfigError::InvalidPath(self.path.clone()));
        }
        Ok(())
    }
}

/// On-disk TOML schema.  All keys are optional.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub queue_capacity: Option<usize>,
    /// Idle timeout in seconds; `0` disables it.
    pub idle_timeout_secs: Option<u64>,
    pub announce_id: Option<bool>,
}

impl ConfigFile {
    /// Parses a config file from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on invalid TOML or unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses the config file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if its content is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

/// Parses an IP address string for the listener.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidBindAddress`] if `text` is not an IP.
pub fn parse_ip(text: &str) -> Result<IpAddr, ConfigError> {
    text.parse()
        .map_err(|_| ConfigError::InvalidBindAddress(text.to_string()))
}

/// Maps a seconds value to an idle timeout, where `0` means disabled.
pub fn idle_timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
