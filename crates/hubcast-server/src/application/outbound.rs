//! Bounded per-connection outbound queue.
//!
//! Each connection owns one [`OutboundQueue`] (the consumer side, drained by
//! its write loop).  The matching [`Outbox`] (the producer side) is handed to
//! the hub at registration and lives in the registry entry.
//!
//! ```text
//!   Hub ── Outbox::try_push ──▶ [ bounded buffer ] ──▶ OutboundQueue::next ── write loop
//! ```
//!
//! # Closing
//!
//! There is exactly one `Outbox` per queue, and it is not `Clone`.  The queue
//! closes when the hub drops that `Outbox` (unregister, eviction, shutdown).
//! Because only one value can be dropped once, a queue is never closed twice.
//! The write loop still receives every payload pushed before the close; only
//! after the buffer is empty does [`OutboundQueue::next`] return `None`.

use hubcast_core::Payload;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Why a payload could not be enqueued.
///
/// Both variants are terminal: the hub evicts the connection instead of
/// retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PushError {
    /// The queue is at capacity (slow consumer).
    #[error("outbound queue is full")]
    Full,
    /// The consumer side has been dropped (write loop already exited).
    #[error("outbound queue is closed")]
    Closed,
}

/// Producer side of an outbound queue.  Owned by the hub registry.
#[derive(Debug)]
pub struct Outbox {
    tx: mpsc::Sender<Payload>,
}

/// Consumer side of an outbound queue.  Owned by the connection.
#[derive(Debug)]
pub struct OutboundQueue {
    rx: mpsc::Receiver<Payload>,
}

/// Creates a queue holding at most `capacity` payloads (minimum 1).
pub fn outbound_queue(capacity: usize) -> (Outbox, OutboundQueue) {
    // tokio's bounded channel panics on a zero capacity.
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Outbox { tx }, OutboundQueue { rx })
}

impl Outbox {
    /// Enqueues `payload` without waiting.
    ///
    /// # Errors
    ///
    /// [`PushError::Full`] if the queue is at capacity, [`PushError::Closed`]
    /// if the consumer is gone.
    pub fn try_push(&self, payload: Payload) -> Result<(), PushError> {
        self.tx.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => PushError::Full,
            TrySendError::Closed(_) => PushError::Closed,
        })
    }

    /// `true` once the consumer side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl OutboundQueue {
    /// Waits for the next payload.
    ///
    /// Returns `None` when the queue is closed and every buffered payload has
    /// been drained; this is the write loop's termination signal.
    pub async fn next(&mut self) -> Option<Payload> {
        self.rx.recv().await
    }

    /// Takes a payload if one is immediately available.
    pub fn try_next(&mut self) -> Option<Payload> {
        self.rx.try_recv().ok()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
