//! hubcast-client library entry point.
//!
//! Shared by the `hubcast-client` binary and its tests.
//!
//! The client connects to a hubcast server, prints every frame it receives,
//! and sends each line typed on stdin as a text frame.  Because the hub
//! broadcasts to every connection, the client also sees its own messages.

/// Application layer: turning typed lines into outgoing frames.
pub mod application;

/// Infrastructure layer: the WebSocket session and stdin/stdout plumbing.
pub mod infrastructure;
