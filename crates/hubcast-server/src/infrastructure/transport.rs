//! Transport seam between the connection loops and the WebSocket library.
//!
//! The read loop and write loop are written against two small traits,
//! [`FrameReader`] and [`FrameWriter`], instead of tokio-tungstenite types.
//! Production code wraps the two halves of a split `WebSocketStream` in
//! [`WsFrameReader`] / [`WsFrameWriter`]; tests substitute scripted readers
//! and recording (or mocked) writers.
//!
//! # Control frames
//!
//! Ping, Pong and raw frames never reach the hub.  `WsFrameReader` skips
//! them, and tungstenite answers pings on its own.

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio_tungstenite::tungstenite::{
    protocol::{frame::coding::CloseCode, CloseFrame},
    Error as WsError, Message as WsMessage,
};

use hubcast_core::Payload;

/// Failure reading from or writing to a connection's transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer sent a Close frame or the stream ended.
    #[error("connection closed by peer (close code: {code:?})")]
    Closed { code: Option<CloseCode> },

    /// Any other WebSocket or I/O failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] WsError),
}

impl TransportError {
    /// `true` for an orderly shutdown initiated by the peer.
    ///
    /// Only used to pick a log level; every closure is cleaned up the same
    /// way.
    pub fn is_normal_closure(&self) -> bool {
        match self {
            Self::Closed { code } => matches!(code, None | Some(CloseCode::Normal)),
            Self::WebSocket(WsError::ConnectionClosed) => true,
            Self::WebSocket(_) => false,
        }
    }
}

/// Read side of a connection.
#[async_trait]
pub trait FrameReader: Send {
    /// Waits for the next data frame (text or binary).
    async fn read_frame(&mut self) -> Result<Payload, TransportError>;
}

/// Write side of a connection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrameWriter: Send {
    /// Sends one data frame, preserving its text/binary kind.
    async fn write_frame(&mut self, payload: Payload) -> Result<(), TransportError>;

    /// Sends a Normal close frame.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// [`FrameReader`] over the stream half of a split `WebSocketStream`.
pub struct WsFrameReader<S> {
    inner: S,
}

impl<S> WsFrameReader<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S> FrameReader for WsFrameReader<S>
where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin + Send,
{
    async fn read_frame(&mut self) -> Result<Payload, TransportError> {
        loop {
            let message = match self.inner.next().await {
                Some(result) => result?,
                None => return Err(TransportError::Closed { code: None }),
            };

            match message {
                WsMessage::Text(text) => return Ok(Payload::text(text)),
                WsMessage::Binary(bytes) => return Ok(Payload::binary(bytes)),
                WsMessage::Close(frame) => {
                    return Err(TransportError::Closed {
                        code: frame.map(|f| f.code),
                    })
                }
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => continue,
            }
        }
    }
}

/// [`FrameWriter`] over the sink half of a split `WebSocketStream`.
pub struct WsFrameWriter<S> {
    inner: S,
}

impl<S> WsFrameWriter<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S> FrameWriter for WsFrameWriter<S>
where
    S: Sink<WsMessage, Error = WsError> + Unpin + Send,
{
    async fn write_frame(&mut self, payload: Payload) -> Result<(), TransportError> {
        let message = match payload {
            Payload::Text(text) => WsMessage::Text(text.to_string()),
            Payload::Binary(bytes) => WsMessage::Binary(bytes.to_vec()),
        };
        self.inner.send(message).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        self.inner.send(WsMessage::Close(Some(frame))).await?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
