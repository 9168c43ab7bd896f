//! Application layer for the client.
//!
//! - **`input`** – parses one line of user input into an [`InputCommand`]:
//!   a plain text frame, a directed envelope (`/to <id> <message>`), or a
//!   request to quit.

pub mod input;

pub use input::{parse_line, InputCommand, InputError};
