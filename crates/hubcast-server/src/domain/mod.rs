//! Domain layer for hubcast-server.
//!
//! # What belongs in the domain layer?
//!
//! - Configuration structures and their validation rules
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or `WebSocket` types
//! - Anything that could block on the network

pub mod config;

pub use config::{ConfigError, ConfigFile, ServerConfig};
