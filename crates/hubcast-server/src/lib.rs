//! hubcast-server library crate.
//!
//! A real-time broadcast hub: clients connect over WebSocket, send frames,
//! and the hub fans each frame out to every currently connected client.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Clients (WebSocket text/binary frames)
//!         ↕
//! [hubcast-server]
//!   ├── domain/           ServerConfig, TOML config file schema
//!   ├── application/      Hub (registry + fan-out), outbound queues, routing
//!   └── infrastructure/
//!         ├── transport/  FrameReader / FrameWriter over tokio-tungstenite
//!         ├── connection/ Per-connection read loop and write loop
//!         └── ws_server/  Accept loop and WebSocket handshake
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no async code and no sockets.
//! - `application` depends on `domain`, `hubcast-core`, and tokio's sync
//!   primitives only; every hub rule is testable without a network.
//! - `infrastructure` depends on all other layers plus `tokio-tungstenite`.

/// Domain layer: configuration types (no I/O beyond reading a config file).
pub mod domain;

/// Application layer: the hub, outbound queues, and inbound routing.
pub mod application;

/// Infrastructure layer: WebSocket server and per-connection loops.
pub mod infrastructure;
