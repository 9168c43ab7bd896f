//! Application layer for hubcast-server.
//!
//! The application layer holds the hub's rules: who is connected, who gets
//! which payload, and what happens to a slow consumer.  It knows nothing
//! about WebSockets.
//!
//! # Responsibilities
//!
//! - The connection registry and fan-out ([`hub`])
//! - Bounded per-connection queues ([`outbound`])
//! - Broadcast vs directed delivery of inbound frames ([`routing`])
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or listening for connections (that is infrastructure)
//! - WebSocket framing (handled by tokio-tungstenite)

pub mod hub;
pub mod outbound;
pub mod routing;

pub use hub::{BroadcastReport, ClientHandle, DeliveryOutcome, Hub, HubError, HubEvent, HubHandle};
pub use outbound::{outbound_queue, OutboundQueue, Outbox, PushError};
pub use routing::{route, Route};
