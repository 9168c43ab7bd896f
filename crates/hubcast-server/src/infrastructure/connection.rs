//! Per-connection lifecycle: registration, read loop, write loop, teardown.
//!
//! ```text
//!            ┌──────────── read loop (spawned task) ─────────────┐
//!  socket ──▶│ read_frame → route → HubHandle::broadcast/send_to │
//!            └───────── on exit: unregister, drop read half ─────┘
//!
//!            ┌──────────── write loop (current task) ────────────┐
//!  socket ◀──│ write_frame ◀── OutboundQueue::next               │
//!            └───── queue closed + empty: send Close, return ────┘
//! ```
//!
//! # Teardown rules
//!
//! - Every read loop exit unregisters the connection before its transport
//!   half is dropped.  This is enforced by a drop guard, so it also holds if
//!   the read task panics or is aborted.
//! - The write loop ends when its queue is closed (after unregister,
//!   eviction, or hub shutdown) and sends a Normal close frame.
//! - A failed write is not retried.  The write loop asks the hub to
//!   unregister the connection and exits, so a connection that only receives
//!   is cleaned up without waiting for its next failed read.
//! - Once the write loop is done, the read loop gets [`CLOSE_GRACE`] to see
//!   the peer's close reply before it is aborted.

use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use hubcast_core::{ConnectionId, Envelope, Payload};

use crate::application::{
    outbound_queue, route, ClientHandle, HubError, HubHandle, OutboundQueue, Route,
};
use crate::domain::ServerConfig;
use crate::infrastructure::transport::{FrameReader, FrameWriter};

/// How long the read loop may outlive the write loop.
pub const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Per-connection settings derived from [`ServerConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    pub queue_capacity: usize,
    pub idle_timeout: Option<Duration>,
    pub announce_id: bool,
}

impl From<&ServerConfig> for ConnectionSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            idle_timeout: config.idle_timeout,
            announce_id: config.announce_id,
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

/// Why a read loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadLoopExit {
    /// The peer closed the connection normally.
    PeerClosed,
    /// The transport failed or the peer closed abnormally.
    TransportFailed,
    /// Nothing arrived within the configured idle timeout.
    IdleTimeout,
    /// The hub is no longer accepting events.
    HubStopped,
}

/// Why a write loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteLoopExit {
    /// The outbound queue was closed and fully drained.
    QueueClosed,
    /// A frame could not be written.
    WriteFailed,
}

/// How a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOutcome {
    /// `None` if the read loop was aborted after [`CLOSE_GRACE`] or panicked.
    pub read: Option<ReadLoopExit>,
    pub write: WriteLoopExit,
}

/// Runs one connection from registration to teardown.
///
/// Creates the outbound queue, registers with the hub, spawns the read loop,
/// runs the write loop on the current task, then waits for the read loop.
///
/// # Errors
///
/// [`HubError::Stopped`] if the hub is not running; no loops are started.
pub async fn serve_connection<R, W>(
    id: ConnectionId,
    reader: R,
    writer: W,
    hub: HubHandle,
    settings: &ConnectionSettings,
) -> Result<SessionOutcome, HubError>
where
    R: FrameReader + 'static,
    W: FrameWriter,
{
    let (outbox, queue) = outbound_queue(settings.queue_capacity);

    if settings.announce_id {
        match Envelope::welcome(id.as_str()).to_json() {
            Ok(json) => {
                // The queue is fresh and holds at least one payload.
                let _ = outbox.try_push(Payload::text(json));
            }
            Err(e) => warn!("connection {id}: failed to build welcome envelope: {e}"),
        }
    }

    hub.register(ClientHandle {
        id: id.clone(),
        outbox,
    })?;

    let mut read_task = tokio::spawn(read_loop(
        id.clone(),
        reader,
        hub.clone(),
        settings.idle_timeout,
    ));

    let write = write_loop(&id, queue, writer, &hub).await;

    let read = match timeout(CLOSE_GRACE, &mut read_task).await {
        Ok(Ok(exit)) => Some(exit),
        Ok(Err(e)) => {
            warn!("connection {id}: read task failed: {e}");
            None
        }
        Err(_) => {
            debug!("connection {id}: peer did not close within {CLOSE_GRACE:?}; aborting read loop");
            read_task.abort();
            None
        }
    };

    Ok(SessionOutcome { read, write })
}

/// Unregisters a connection when dropped.
struct UnregisterGuard {
    id: ConnectionId,
    hub: HubHandle,
}

impl Drop for UnregisterGuard {
    fn drop(&mut self) {
        // A stopped hub has already closed every queue.
        let _ = self.hub.unregister(self.id.clone());
    }
}

/// Reads frames and submits them to the hub until the transport ends.
///
/// Plain frames are broadcast; `"direct"` envelopes go to their target (see
/// [`route`]).  With `idle_timeout` set, a read that waits longer than that
/// ends the loop.
///
/// On every exit path the connection is unregistered first, then `reader`
/// is dropped.
pub async fn read_loop<R: FrameReader>(
    id: ConnectionId,
    mut reader: R,
    hub: HubHandle,
    idle_timeout: Option<Duration>,
) -> ReadLoopExit {
    // Declared after `reader`, so it is dropped before it.
    let _guard = UnregisterGuard {
        id: id.clone(),
        hub: hub.clone(),
    };

    loop {
        let next = match idle_timeout {
            Some(limit) => match timeout(limit, reader.read_frame()).await {
                Ok(result) => result,
                Err(_) => {
                    info!("connection {id}: no message for {limit:?}; closing");
                    return ReadLoopExit::IdleTimeout;
                }
            },
            None => reader.read_frame().await,
        };

        let payload = match next {
            Ok(payload) => payload,
            Err(e) if e.is_normal_closure() => {
                info!("connection {id} closed by client: {e}");
                return ReadLoopExit::PeerClosed;
            }
            Err(e) => {
                warn!("connection {id}: error on message read: {e}");
                return ReadLoopExit::TransportFailed;
            }
        };

        debug!("connection {id}: received {} byte frame", payload.len());

        let submitted = match route(payload) {
            Route::Broadcast(payload) => hub.broadcast(payload),
            Route::Direct { to, payload } => hub.send_to(to, payload),
        };
        if submitted.is_err() {
            warn!("connection {id}: hub stopped; closing");
            return ReadLoopExit::HubStopped;
        }
    }
}

/// Drains `queue` into `writer` until the queue is closed.
pub async fn write_loop<W: FrameWriter>(
    id: &ConnectionId,
    mut queue: OutboundQueue,
    mut writer: W,
    hub: &HubHandle,
) -> WriteLoopExit {
    while let Some(payload) = queue.next().await {
        if let Err(e) = writer.write_frame(payload).await {
            warn!("connection {id}: write failed: {e}; unregistering");
            let _ = hub.unregister(id.clone());
            return WriteLoopExit::WriteFailed;
        }
    }

    if let Err(e) = writer.close().await {
        debug!("connection {id}: close frame not sent: {e}");
    }
    WriteLoopExit::QueueClosed
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tokio_test::assert_ok;
    use tokio_tungstenite::tungstenite::{protocol::frame::coding::CloseCode, Error as WsError};

    use crate::application::Hub;
    use crate::infrastructure::transport::{MockFrameWriter, TransportError};

    // ── Test doubles ──────────────────────────────────────────────────────────

    /// Yields scripted results, then either ends normally or hangs forever.
    struct ScriptedReader {
        script: VecDeque<Result<Payload, TransportError>>,
        hang_when_done: bool,
    }

    impl ScriptedReader {
        fn closing(frames: &[&str]) -> Self {
            let mut script: VecDeque<Result<Payload, TransportError>> =
                frames.iter().map(|f| Ok(Payload::text(*f))).collect();
            script.push_back(Err(TransportError::Closed {
                code: Some(CloseCode::Normal),
            }));
            Self {
                script,
                hang_when_done: false,
            }
        }

        fn hanging() -> Self {
            Self {
                script: VecDeque::new(),
                hang_when_done: true,
            }
        }
    }

    #[async_trait]
    impl FrameReader for ScriptedReader {
        async fn read_frame(&mut self) -> Result<Payload, TransportError> {
            match self.script.pop_front() {
                Some(next) => next,
                None if self.hang_when_done => std::future::pending().await,
                None => Err(TransportError::Closed { code: None }),
            }
        }
    }

    #[derive(Clone, Default)]
    struct RecordingWriter {
        frames: Arc<Mutex<Vec<Payload>>>,
        closed: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl FrameWriter for RecordingWriter {
        async fn write_frame(&mut self, payload: Payload) -> Result<(), TransportError> {
            self.frames.lock().unwrap().push(payload);
            Ok(())
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    fn register(hub: &HubHandle, id: &str, capacity: usize) -> OutboundQueue {
        let (outbox, queue) = outbound_queue(capacity);
        hub.register(ClientHandle {
            id: ConnectionId::from(id),
            outbox,
        })
        .unwrap();
        queue
    }

    // ── Read loop ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_read_loop_broadcasts_frames_then_unregisters() {
        // Arrange: "r" is the reading connection, "a" observes broadcasts.
        let (hub, _task) = Hub::spawn();
        let mut observer = register(&hub, "a", 16);
        let _own = register(&hub, "r", 16);
        let reader = ScriptedReader::closing(&["hi", "yo"]);

        // Act
        let exit = read_loop(ConnectionId::from("r"), reader, hub.clone(), None).await;

        // Assert
        assert_eq!(exit, ReadLoopExit::PeerClosed);
        assert_eq!(hub.connection_count().await.unwrap(), 1);
        assert_eq!(observer.next().await, Some(Payload::text("hi")));
        assert_eq!(observer.next().await, Some(Payload::text("yo")));
    }

    #[tokio::test]
    async fn test_read_loop_abnormal_error_still_unregisters() {
        let (hub, _task) = Hub::spawn();
        let _own = register(&hub, "r", 16);
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let reader = ScriptedReader {
            script: VecDeque::from([Err(TransportError::WebSocket(WsError::Io(io)))]),
            hang_when_done: false,
        };

        let exit = read_loop(ConnectionId::from("r"), reader, hub.clone(), None).await;

        assert_eq!(exit, ReadLoopExit::TransportFailed);
        assert_eq!(hub.connection_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_read_loop_idle_timeout_ends_loop() {
        let (hub, _task) = Hub::spawn();
        let _own = register(&hub, "r", 16);

        let exit = read_loop(
            ConnectionId::from("r"),
            ScriptedReader::hanging(),
            hub.clone(),
            Some(Duration::from_millis(50)),
        )
        .await;

        assert_eq!(exit, ReadLoopExit::IdleTimeout);
        assert_eq!(hub.connection_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_read_loop_routes_direct_envelope_to_target_only() {
        let (hub, _task) = Hub::spawn();
        let mut a = register(&hub, "a", 16);
        let mut b = register(&hub, "b", 16);
        let direct = Envelope::direct("b", "psst").to_json().unwrap();
        let reader = ScriptedReader::closing(&[direct.as_str(), "everyone"]);

        read_loop(ConnectionId::from("r"), reader, hub.clone(), None).await;
        assert_ok!(hub.connection_count().await);

        assert_eq!(b.try_next(), Some(Payload::text(direct.as_str())));
        assert_eq!(b.try_next(), Some(Payload::text("everyone")));
        assert_eq!(a.try_next(), Some(Payload::text("everyone")));
        assert_eq!(a.try_next(), None);
    }

    #[tokio::test]
    async fn test_read_loop_exits_when_hub_stopped() {
        let (hub, task) = Hub::spawn();
        hub.shutdown().unwrap();
        task.await.unwrap();

        let exit = read_loop(
            ConnectionId::from("r"),
            ScriptedReader::closing(&["lost"]),
            hub,
            None,
        )
        .await;

        assert_eq!(exit, ReadLoopExit::HubStopped);
    }

    // ── Write loop ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_write_loop_writes_in_order_then_closes() {
        let (hub, _task) = Hub::spawn();
        let (outbox, queue) = outbound_queue(8);
        outbox.try_push(Payload::text("one")).unwrap();
        outbox.try_push(Payload::text("two")).unwrap();
        drop(outbox);
        let writer = RecordingWriter::default();

        let exit = write_loop(&ConnectionId::from("w"), queue, writer.clone(), &hub).await;

        assert_eq!(exit, WriteLoopExit::QueueClosed);
        assert_eq!(
            *writer.frames.lock().unwrap(),
            vec![Payload::text("one"), Payload::text("two")]
        );
        assert!(*writer.closed.lock().unwrap());
    }

    #[tokio::test]
    async fn test_write_failure_requests_unregister_and_stops() {
        // Arrange: "w" is registered and its writer fails on the first frame.
        let (hub, _task) = Hub::spawn();
        let (outbox, queue) = outbound_queue(8);
        outbox.try_push(Payload::text("boom")).unwrap();
        hub.register(ClientHandle {
            id: ConnectionId::from("w"),
            outbox,
        })
        .unwrap();

        let mut writer = MockFrameWriter::new();
        writer
            .expect_write_frame()
            .times(1)
            .returning(|_| Err(TransportError::WebSocket(WsError::AlreadyClosed)));
        writer.expect_close().never();

        // Act
        let exit = write_loop(&ConnectionId::from("w"), queue, writer, &hub).await;

        // Assert
        assert_eq!(exit, WriteLoopExit::WriteFailed);
        assert_eq!(hub.connection_count().await.unwrap(), 0);
    }

    // ── Whole connection ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_serve_connection_announces_echoes_and_closes() {
        // Arrange
        let (hub, _task) = Hub::spawn();
        let writer = RecordingWriter::default();
        let settings = ConnectionSettings {
            announce_id: true,
            ..ConnectionSettings::default()
        };

        // Act: the client says "hello" and then closes.
        let outcome = serve_connection(
            ConnectionId::from("me"),
            ScriptedReader::closing(&["hello"]),
            writer.clone(),
            hub.clone(),
            &settings,
        )
        .await
        .unwrap();

        // Assert: welcome first, then its own broadcast, then a close frame.
        assert_eq!(
            outcome,
            SessionOutcome {
                read: Some(ReadLoopExit::PeerClosed),
                write: WriteLoopExit::QueueClosed,
            }
        );
        let frames = writer.frames.lock().unwrap().clone();
        assert_eq!(frames.len(), 2);
        let welcome = Envelope::parse(frames[0].as_text().unwrap()).unwrap();
        assert_eq!(welcome, Envelope::welcome("me"));
        assert_eq!(frames[1], Payload::text("hello"));
        assert!(*writer.closed.lock().unwrap());
        assert_eq!(hub.connection_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_serve_connection_fails_when_hub_stopped() {
        let (hub, task) = Hub::spawn();
        hub.shutdown().unwrap();
        task.await.unwrap();

        let result = serve_connection(
            ConnectionId::from("late"),
            ScriptedReader::hanging(),
            RecordingWriter::default(),
            hub,
            &ConnectionSettings::default(),
        )
        .await;

        assert_eq!(result, Err(HubError::Stopped));
    }

    #[test]
    fn test_settings_follow_server_config() {
        let config = ServerConfig {
            queue_capacity: 7,
            idle_timeout: Some(Duration::from_secs(9)),
            announce_id: true,
            ..ServerConfig::default()
        };
        let settings = ConnectionSettings::from(&config);
        assert_eq!(settings.queue_capacity, 7);
        assert_eq!(settings.idle_timeout, Some(Duration::from_secs(9)));
        assert!(settings.announce_id);
    }
}
