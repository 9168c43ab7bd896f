//! Inbound frame routing.
//!
//! Decides whether a frame read from a connection goes to everyone
//! ([`Route::Broadcast`]) or to one connection ([`Route::Direct`]).
//!
//! Only a text frame that parses as a `"direct"` [`Envelope`] with a `to`
//! field is routed directly.  Everything else is broadcast: plain text,
//! binary frames, envelopes of any other type, and malformed JSON.  In both
//! cases the frame is forwarded unchanged; the envelope is only inspected,
//! never rewritten.

use hubcast_core::{ConnectionId, Envelope, Payload};

/// Where an inbound frame should be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Broadcast(Payload),
    Direct { to: ConnectionId, payload: Payload },
}

/// Classifies an inbound payload.
pub fn route(payload: Payload) -> Route {
    let target = payload
        .as_text()
        .and_then(|text| Envelope::parse(text).ok())
        .filter(Envelope::is_direct)
        .and_then(|envelope| envelope.to);

    match target {
        Some(to) => Route::Direct {
            to: ConnectionId::from(to),
            payload,
        },
        None => Route::Broadcast(payload),
    }
}
