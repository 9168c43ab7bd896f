//! WebSocket session for the interactive client.
//!
//! Architecture:
//! - [`run_session`] connects to the server and splits the socket.
//! - A receive task prints every inbound frame to stdout until the server
//!   closes the connection or the socket fails.
//! - [`forward_input`] reads stdin line by line and sends each line as a
//!   text frame until the user quits, input ends, or a send fails.
//!
//! Errors on an established connection are logged, never retried.

use std::fmt::Display;
use std::time::Duration;

use anyhow::Context;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, warn};

use crate::application::{parse_line, InputCommand};

/// How long to wait for the server to acknowledge our close frame.
const CLOSE_WAIT: Duration = Duration::from_secs(2);

/// Why [`forward_input`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEnd {
    /// The user typed `/quit`.
    Quit,
    /// Stdin reached end-of-file.
    EndOfInput,
    /// Reading stdin failed.
    InputFailed,
    /// A frame could not be sent; the connection is gone.
    SendFailed,
}

/// Connects to `url` and runs the interactive session until it ends.
///
/// # Errors
///
/// Returns an error only if the connection cannot be established.  Failures
/// after that point are logged.
pub async fn run_session(url: &str) -> anyhow::Result<()> {
    let (ws_stream, _response) = connect_async(url)
        .await
        .with_context(|| format!("failed to connect to {url}"))?;

    info!("connected to {url}");

    let (mut sink, stream) = ws_stream.split();
    let mut receiver = tokio::spawn(print_incoming(stream));

    let stdin = BufReader::new(tokio::io::stdin());
    let end = tokio::select! {
        end = forward_input(stdin, &mut sink) => end,
        _ = &mut receiver => {
            info!("server closed the connection");
            return Ok(());
        }
    };
    debug!("input loop ended: {end:?}");

    match end {
        InputEnd::Quit | InputEnd::EndOfInput => {
            // Let the server's close reply (and anything still in flight)
            // reach the receive task before we go.
            if timeout(CLOSE_WAIT, &mut receiver).await.is_err() {
                receiver.abort();
            }
        }
        InputEnd::InputFailed | InputEnd::SendFailed => receiver.abort(),
    }

    info!("disconnected from {url}");
    Ok(())
}

/// Sends every line read from `input` to `sink` as a text frame.
///
/// `/quit` and end-of-input send a close frame before returning.  A
/// malformed command is reported and skipped.
pub async fn forward_input<R, S>(input: R, sink: &mut S) -> InputEnd
where
    R: AsyncBufRead + Unpin,
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut lines = input.lines();

    let end = loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break InputEnd::EndOfInput,
            Err(e) => {
                error!("error reading input: {e}");
                return InputEnd::InputFailed;
            }
        };

        let text = match parse_line(&line) {
            Ok(InputCommand::Send(text)) => text,
            Ok(InputCommand::Skip) => continue,
            Ok(InputCommand::Quit) => break InputEnd::Quit,
            Err(e) => {
                warn!("{e}");
                continue;
            }
        };

        if let Err(e) = sink.send(Message::Text(text)).await {
            error!("error sending message: {e}");
            return InputEnd::SendFailed;
        }
    };

    if let Err(e) = sink.send(Message::Close(None)).await {
        warn!("error sending close frame: {e}");
    }
    end
}

/// Prints inbound frames to stdout until the connection ends.
async fn print_incoming<S>(mut stream: S)
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(message) => match render(&message) {
                Some(line) => println!("{line}"),
                None if message.is_close() => break,
                None => {}
            },
            Err(WsError::ConnectionClosed) => break,
            Err(e) => {
                warn!("error reading message: {e}");
                break;
            }
        }
    }
}

/// Formats a data frame for display; control frames yield `None`.
fn render(message: &Message) -> Option<String> {
    match message {
        Message::Text(text) => Some(text.clone()),
        Message::Binary(bytes) => Some(format!("[binary frame, {} bytes]", bytes.len())),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context as TaskContext, Poll};

    use tokio::io::{AsyncRead, ReadBuf};

    fn texts(sent: &[Message]) -> Vec<&str> {
        sent.iter()
            .filter_map(|m| match m {
                Message::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Sink that refuses every frame.
    struct BrokenSink;

    impl Sink<Message> for BrokenSink {
        type Error = WsError;

        fn poll_ready(self: Pin<&mut Self>, _: &mut TaskContext<'_>) -> Poll<Result<(), WsError>> {
            Poll::Ready(Err(WsError::ConnectionClosed))
        }

        fn start_send(self: Pin<&mut Self>, _: Message) -> Result<(), WsError> {
            Err(WsError::ConnectionClosed)
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut TaskContext<'_>) -> Poll<Result<(), WsError>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _: &mut TaskContext<'_>) -> Poll<Result<(), WsError>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Reader that fails on the first read.
    struct BrokenInput;

    impl AsyncRead for BrokenInput {
        fn poll_read(
            self: Pin<&mut Self>,
            _: &mut TaskContext<'_>,
            _: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "stdin gone")))
        }
    }

    #[tokio::test]
    async fn test_lines_are_sent_then_close_on_end_of_input() {
        // Arrange
        let input = BufReader::new(&b"hello\n\nworld\r\n"[..]);
        let mut sent: Vec<Message> = Vec::new();

        // Act
        let end = forward_input(input, &mut sent).await;

        // Assert
        assert_eq!(end, InputEnd::EndOfInput);
        assert_eq!(texts(&sent), vec!["hello", "world"]);
        assert_eq!(sent.last(), Some(&Message::Close(None)));
    }

    #[tokio::test]
    async fn test_quit_stops_reading_and_closes() {
        let input = BufReader::new(&b"one\n/quit\nnever sent\n"[..]);
        let mut sent: Vec<Message> = Vec::new();

        let end = forward_input(input, &mut sent).await;

        assert_eq!(end, InputEnd::Quit);
        assert_eq!(texts(&sent), vec!["one"]);
        assert_eq!(sent.len(), 2);
        assert!(sent[1].is_close());
    }

    #[tokio::test]
    async fn test_malformed_command_is_skipped() {
        let input = BufReader::new(&b"/to\n/to abc-1 hi\n"[..]);
        let mut sent: Vec<Message> = Vec::new();

        forward_input(input, &mut sent).await;

        let sent_texts = texts(&sent);
        assert_eq!(sent_texts.len(), 1);
        assert!(sent_texts[0].contains("\"to\":\"abc-1\""));
    }

    #[tokio::test]
    async fn test_send_failure_ends_input_loop() {
        let input = BufReader::new(&b"hello\nworld\n"[..]);

        let end = forward_input(input, &mut BrokenSink).await;

        assert_eq!(end, InputEnd::SendFailed);
    }

    #[tokio::test]
    async fn test_input_failure_ends_without_close() {
        let mut sent: Vec<Message> = Vec::new();

        let end = forward_input(BufReader::new(BrokenInput), &mut sent).await;

        assert_eq!(end, InputEnd::InputFailed);
        assert!(sent.is_empty());
    }

    #[test]
    fn test_render_text_and_binary() {
        assert_eq!(render(&Message::Text("hi".into())), Some("hi".to_string()));
        assert_eq!(
            render(&Message::Binary(vec![1, 2, 3])),
            Some("[binary frame, 3 bytes]".to_string())
        );
        assert_eq!(render(&Message::Ping(vec![])), None);
        assert_eq!(render(&Message::Close(None)), None);
    }

    #[tokio::test]
    async fn test_print_incoming_stops_at_close() {
        let frames: Vec<Result<Message, WsError>> = vec![
            Ok(Message::Text("a".into())),
            Ok(Message::Close(None)),
            Ok(Message::Text("after close".into())),
        ];

        let printing = print_incoming(futures_util::stream::iter(frames));
        tokio_test::assert_ok!(timeout(Duration::from_secs(1), printing).await);
    }

    #[tokio::test]
    async fn test_print_incoming_stops_on_error() {
        let frames: Vec<Result<Message, WsError>> =
            vec![Ok(Message::Binary(vec![0; 4])), Err(WsError::AlreadyClosed)];

        let printing = print_incoming(futures_util::stream::iter(frames));
        tokio_test::assert_ok!(timeout(Duration::from_secs(1), printing).await);
    }
}
