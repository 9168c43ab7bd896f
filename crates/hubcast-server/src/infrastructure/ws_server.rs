//! WebSocket server: accept loop and per-session task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming TCP connections.
//! 3. Upgrading each connection to a WebSocket session, rejecting requests
//!    for any path other than the configured endpoint.
//! 4. Assigning the session a [`ConnectionId`] and handing it to
//!    [`serve_connection`], which registers it with the hub and runs its
//!    read and write loops.
//! 5. Stopping the accept loop when the `running` flag is cleared.
//!
//! # Scalability
//!
//! Each session runs in its own Tokio task.  The accept loop never waits on a
//! session: it accepts a connection and immediately spawns a task for it
//! before accepting the next one.
//!
//! # Failure containment
//!
//! A failed accept or a failed handshake is logged and forgotten.  Only a
//! failure to bind the listener is returned to the caller.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{error, info, warn};

use hubcast_core::ConnectionId;

use crate::application::HubHandle;
use crate::domain::ServerConfig;
use crate::infrastructure::connection::{serve_connection, ConnectionSettings};
use crate::infrastructure::transport::{WsFrameReader, WsFrameWriter};

/// How often the accept loop re-checks the `running` flag while idle.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.bind_addr` and serves WebSocket sessions until `running` is
/// set to `false`.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound (e.g., the port is
/// already in use or the process lacks permission to bind).
pub async fn run_server(
    config: ServerConfig,
    hub: HubHandle,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {}", config.bind_addr))?;

    info!("hub listening on ws://{}{}", config.bind_addr, config.path);

    serve(listener, config, hub, running).await;
    Ok(())
}

/// Runs the accept loop on an already-bound listener.
///
/// Split out from [`run_server`] so tests can bind port 0 and learn the
/// real address before serving.
pub async fn serve(
    listener: TcpListener,
    config: ServerConfig,
    hub: HubHandle,
    running: Arc<AtomicBool>,
) {
    let config = Arc::new(config);

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // A short timeout on `accept()` lets the loop notice the shutdown
        // flag even when nobody is connecting.
        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                let cfg = Arc::clone(&config);
                let hub = hub.clone();
                tokio::spawn(async move {
                    handle_session(stream, peer_addr, cfg, hub).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g., too many open file descriptors).
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Upgrades one TCP connection and runs it until teardown.
async fn handle_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    config: Arc<ServerConfig>,
    hub: HubHandle,
) {
    let endpoint = config.path.as_str();
    let callback =
        |request: &Request, response: Response| check_endpoint(request, response, endpoint);

    let ws_stream = match accept_hdr_async(raw_stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {peer_addr} failed: {e}");
            return;
        }
    };

    let id = ConnectionId::generate();
    info!("connection {id} established from {peer_addr}");

    let (sink, stream) = ws_stream.split();
    let settings = ConnectionSettings::from(config.as_ref());

    match serve_connection(
        id.clone(),
        WsFrameReader::new(stream),
        WsFrameWriter::new(sink),
        hub,
        &settings,
    )
    .await
    {
        Ok(outcome) => info!("connection {id} from {peer_addr} finished: {outcome:?}"),
        Err(e) => warn!("connection {id} from {peer_addr} dropped: {e}"),
    }
}

/// Handshake callback: accepts only requests for the configured path.
///
/// Any `Origin` is accepted.
fn check_endpoint(
    request: &Request,
    response: Response,
    endpoint: &str,
) -> Result<Response, ErrorResponse> {
    let path = request.uri().path();
    if path == endpoint {
        return Ok(response);
    }

    let mut rejection = ErrorResponse::new(Some(format!("no WebSocket endpoint at {path}")));
    *rejection.status_mut() = StatusCode::NOT_FOUND;
    Err(rejection)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
