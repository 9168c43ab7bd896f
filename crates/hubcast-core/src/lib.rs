//! # hubcast-core
//!
//! Shared library for hubcast containing the types that both the hub server
//! and the CLI client agree on.
//!
//! This crate has zero dependencies on async runtimes or network sockets.
//!
//! # Architecture overview
//!
//! hubcast is a real-time broadcast hub: clients hold a WebSocket open, send
//! text frames, and the hub fans every frame out to all connected clients.
//!
//! - **`domain`** – Identity of a live connection ([`ConnectionId`]).
//!
//! - **`protocol`** – What travels over the wire.  Frames are opaque
//!   [`Payload`]s; a frame may optionally be a JSON [`Envelope`] with a
//!   `type` discriminator, a `data` field, and an optional `to` target.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `hubcast_core::Payload` instead of `hubcast_core::protocol::payload::Payload`.
pub use domain::connection::ConnectionId;
pub use protocol::envelope::{Envelope, EnvelopeError};
pub use protocol::payload::Payload;
