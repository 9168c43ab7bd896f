//! Infrastructure layer for the client.
//!
//! - **`session`** – connects to the server, spawns the receive task that
//!   prints incoming frames, and forwards stdin lines until the user quits.

pub mod session;

pub use session::{forward_input, run_session, InputEnd};
