//! Protocol module containing the frame payload and the JSON envelope.

pub mod envelope;
pub mod payload;

pub use envelope::{Envelope, EnvelopeError};
pub use payload::Payload;
