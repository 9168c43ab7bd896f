//! The hub: connection registry and message fan-out.
//!
//! The hub is the single authoritative coordinator for connection membership.
//! All registry mutations go through one serialized event stream, so there is
//! no lock around the registry and no broadcast ever observes a half-applied
//! register or unregister.
//!
//! # Two ways to drive it
//!
//! - [`Hub`] exposes the rules as plain synchronous methods
//!   (`register`, `unregister`, `broadcast`, `send_to`).  Unit tests call
//!   these directly.
//! - [`Hub::spawn`] moves the `Hub` into a Tokio task that drains an
//!   unbounded channel of [`HubEvent`]s one at a time, and returns a cloneable
//!   [`HubHandle`] for connections to submit events through.
//!
//! ```text
//!  read loop ─┐
//!  read loop ─┼─ HubHandle ──▶ [ unbounded mpsc<HubEvent> ] ──▶ Hub::run (one task)
//!  accept    ─┘                                                  │
//!                                     Outbox::try_push ◀─────────┘  (bounded, per connection)
//! ```
//!
//! # Backpressure
//!
//! The inbound event channel is unbounded so a read loop never waits on the
//! hub.  Each outbound queue is bounded.  When a queue is full the hub does
//! not wait either: the slow connection is evicted inside the same pass and
//! every other connection still receives the payload.

use std::collections::HashMap;
use std::ops::ControlFlow;

use hubcast_core::{ConnectionId, Payload};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::outbound::{Outbox, PushError};

/// Error returned by [`HubHandle`] when the hub task is no longer running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HubError {
    #[error("hub is not running")]
    Stopped,
}

/// What the hub keeps for each registered connection.
#[derive(Debug)]
pub struct ClientHandle {
    pub id: ConnectionId,
    pub outbox: Outbox,
}

/// One unit of work for the hub task.
#[derive(Debug)]
pub enum HubEvent {
    Register(ClientHandle),
    Unregister(ConnectionId),
    Broadcast(Payload),
    SendTo { to: ConnectionId, payload: Payload },
    /// Replies with the current registry size.
    Count(oneshot::Sender<usize>),
    /// Closes every queue and stops the hub task.
    Shutdown,
}

/// Result of one [`Hub::broadcast`] pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Number of queues the payload was pushed into.
    pub delivered: usize,
    /// Connections removed during this pass because their queue rejected it.
    pub evicted: Vec<ConnectionId>,
}

/// Result of one [`Hub::send_to`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The target's queue rejected the payload and the target was evicted.
    Evicted(PushError),
    /// No connection with that id is registered.
    UnknownTarget,
}

/// Connection registry.  See the module docs.
#[derive(Debug, Default)]
pub struct Hub {
    clients: HashMap<ConnectionId, Outbox>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a hub task on the current Tokio runtime.
    ///
    /// The returned `JoinHandle` completes after [`HubHandle::shutdown`] is
    /// processed, or once every `HubHandle` has been dropped.
    pub fn spawn() -> (HubHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(Self::new().run(rx));
        (HubHandle { tx }, task)
    }

    /// Inserts a connection keyed by its id.
    ///
    /// Registering an id that is already present replaces the old entry,
    /// which closes the old entry's queue.
    pub fn register(&mut self, client: ClientHandle) {
        let ClientHandle { id, outbox } = client;
        if self.clients.insert(id.clone(), outbox).is_some() {
            warn!("connection {id} re-registered; previous queue closed");
        }
        info!("connection {id} registered ({} connected)", self.clients.len());
    }

    /// Removes a connection and closes its queue.
    ///
    /// Returns `false` (and does nothing) if the id is not registered, so
    /// duplicate unregister requests are harmless.
    pub fn unregister(&mut self, id: &ConnectionId) -> bool {
        match self.clients.remove(id) {
            Some(_outbox) => {
                info!("connection {id} unregistered ({} connected)", self.clients.len());
                true
            }
            None => {
                debug!("unregister for unknown connection {id} ignored");
                false
            }
        }
    }

    /// Pushes `payload` into every registered connection's queue.
    ///
    /// A connection whose queue is full or closed is evicted during the same
    /// pass; delivery to the remaining connections continues.
    pub fn broadcast(&mut self, payload: Payload) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        self.clients
            .retain(|id, outbox| match outbox.try_push(payload.clone()) {
                Ok(()) => {
                    report.delivered += 1;
                    true
                }
                Err(e) => {
                    warn!("failed to send message to connection {id} ({e}); evicting");
                    report.evicted.push(id.clone());
                    false
                }
            });

        debug!(
            "broadcast {} bytes to {} connection(s), {} evicted",
            payload.len(),
            report.delivered,
            report.evicted.len()
        );
        report
    }

    /// Pushes `payload` into one connection's queue.
    ///
    /// Uses the same eviction rule as [`broadcast`](Self::broadcast).
    pub fn send_to(&mut self, to: &ConnectionId, payload: Payload) -> DeliveryOutcome {
        let Some(outbox) = self.clients.get(to) else {
            debug!("directed message for unknown connection {to} dropped");
            return DeliveryOutcome::UnknownTarget;
        };

        match outbox.try_push(payload) {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(e) => {
                warn!("failed to send message to connection {to} ({e}); evicting");
                self.clients.remove(to);
                DeliveryOutcome::Evicted(e)
            }
        }
    }

    /// `true` if `id` is currently registered.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.clients.contains_key(id)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Removes every connection, closing all queues.  Returns how many were
    /// removed.
    pub fn close_all(&mut self) -> usize {
        let count = self.clients.len();
        self.clients.clear();
        count
    }

    /// Applies one event.  Returns `Break` when the hub should stop.
    pub fn handle(&mut self, event: HubEvent) -> ControlFlow<()> {
        match event {
            HubEvent::Register(client) => self.register(client),
            HubEvent::Unregister(id) => {
                self.unregister(&id);
            }
            HubEvent::Broadcast(payload) => {
                self.broadcast(payload);
            }
            HubEvent::SendTo { to, payload } => {
                self.send_to(&to, payload);
            }
            HubEvent::Count(reply) => {
                // The requester may have given up waiting; nothing to do then.
                let _ = reply.send(self.clients.len());
            }
            HubEvent::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    /// Processes events one at a time, in arrival order, until shutdown or
    /// until every sender is gone.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<HubEvent>) {
        info!("hub started");

        while let Some(event) = events.recv().await {
            if self.handle(event).is_break() {
                break;
            }
        }

        let closed = self.close_all();
        info!("hub stopped; closed {closed} connection queue(s)");
    }
}

/// Cloneable handle for submitting events to a running hub task.
///
/// Every method except [`connection_count`](Self::connection_count) returns
/// immediately; none of them wait for the hub to process the event.
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<HubEvent>,
}

impl HubHandle {
    fn submit(&self, event: HubEvent) -> Result<(), HubError> {
        self.tx.send(event).map_err(|_| HubError::Stopped)
    }

    pub fn register(&self, client: ClientHandle) -> Result<(), HubError> {
        self.submit(HubEvent::Register(client))
    }

    pub fn unregister(&self, id: ConnectionId) -> Result<(), HubError> {
        self.submit(HubEvent::Unregister(id))
    }

    pub fn broadcast(&self, payload: Payload) -> Result<(), HubError> {
        self.submit(HubEvent::Broadcast(payload))
    }

    pub fn send_to(&self, to: ConnectionId, payload: Payload) -> Result<(), HubError> {
        self.submit(HubEvent::SendTo { to, payload })
    }

    /// Asks the hub to close every queue and stop.
    pub fn shutdown(&self) -> Result<(), HubError> {
        self.submit(HubEvent::Shutdown)
    }

    /// Returns the registry size as seen after every previously submitted
    /// event from this handle has been applied.
    ///
    /// # Errors
    ///
    /// [`HubError::Stopped`] if the hub task has exited.
    pub async fn connection_count(&self) -> Result<usize, HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(HubEvent::Count(reply_tx))?;
        reply_rx.await.map_err(|_| HubError::Stopped)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
