//! JSON message envelope.
//!
//! Clients may wrap their frames in a small JSON object:
//!
//! ```json
//! {"type":"broadcast","data":"hello"}
//! {"type":"direct","data":"psst","to":"5f0c…"}
//! {"type":"welcome","data":"5f0c…"}
//! ```
//!
//! | field  | required | meaning                                   |
//! |--------|----------|-------------------------------------------|
//! | `type` | yes      | discriminator (see the constants below)   |
//! | `data` | yes      | opaque payload                            |
//! | `to`   | no       | target connection id for directed delivery |
//!
//! The envelope is optional on the wire.  The hub forwards any frame that is
//! not a `"direct"` envelope to everyone, unparsed and unchanged.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Discriminator for a message meant for every connected client.
pub const KIND_BROADCAST: &str = "broadcast";
/// Discriminator for a message meant for the single connection named in `to`.
pub const KIND_DIRECT: &str = "direct";
/// Discriminator the server uses to tell a new connection its own id.
pub const KIND_WELCOME: &str = "welcome";

/// Error returned when a frame is not a valid envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The wire-level message envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Discriminator, serialized as `"type"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Opaque payload.
    pub data: String,

    /// Target connection id.  Omitted from the JSON when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl Envelope {
    /// Builds a `"broadcast"` envelope.
    pub fn broadcast(data: impl Into<String>) -> Self {
        Self {
            kind: KIND_BROADCAST.to_string(),
            data: data.into(),
            to: None,
        }
    }

    /// Builds a `"direct"` envelope addressed to `to`.
    pub fn direct(to: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            kind: KIND_DIRECT.to_string(),
            data: data.into(),
            to: Some(to.into()),
        }
    }

    /// Builds the `"welcome"` envelope carrying a connection's own id.
    pub fn welcome(id: impl Into<String>) -> Self {
        Self {
            kind: KIND_WELCOME.to_string(),
            data: id.into(),
            to: None,
        }
    }

    /// Parses an envelope from a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Malformed`] if `text` is not a JSON object
    /// with string `type` and `data` fields.
    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serializes the envelope to compact JSON.
    ///
    /// # Errors
    ///
    /// Serialization of this struct cannot fail in practice; the `Result` is
    /// kept so callers do not need to `unwrap`.
    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// `true` if this envelope asks for directed delivery and names a target.
    pub fn is_direct(&self) -> bool {
        self.kind == KIND_DIRECT && self.to.is_some()
    }
}
