//! Connection identity.
//!
//! Every accepted WebSocket session is assigned a [`ConnectionId`] before it
//! is registered with the hub.  The hub keys its registry by this id, and the
//! optional `to` field of an [`Envelope`](crate::Envelope) refers to it.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of one client connection.
///
/// The string form is not interpreted anywhere; the server generates UUID v4
/// strings, but tests and embedders may use any unique string (`"a"`, `"b"`).
///
/// # Example
///
/// ```rust
/// use hubcast_core::ConnectionId;
///
/// let id = ConnectionId::from("a");
/// assert_eq!(id.as_str(), "a");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Wraps an existing string as a connection id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random id (UUID v4, hyphenated).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ConnectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
