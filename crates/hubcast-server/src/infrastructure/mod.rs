//! Infrastructure layer for hubcast-server.
//!
//! The infrastructure layer handles all I/O: accepting WebSocket connections
//! and moving frames between sockets and the hub.
//!
//! # Responsibilities
//!
//! - Binding a TCP listener and performing the WebSocket upgrade handshake
//! - Adapting tokio-tungstenite streams to the `FrameReader` / `FrameWriter`
//!   traits
//! - Running each connection's read loop and write loop
//! - Handling the graceful shutdown signal
//!
//! # What does NOT belong here?
//!
//! - Registry and fan-out rules (that is the application layer)
//! - Configuration parsing (that is the domain layer and `main.rs`)

pub mod connection;
pub mod transport;
pub mod ws_server;

// Re-export the primary entry points so `main.rs` can call them concisely.
pub use ws_server::{run_server, serve};
