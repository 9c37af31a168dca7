//! WebSocket handler.
//!
//! Responsibilities:
//! - Upgrade HTTP -> WS and capture the request (query + headers)
//! - Register the socket's outbound queue with [`WsTransport`]
//! - Own the per-connection [`Connection`] and drive it from one task:
//!   outbound queue, inbound frames, and the next heartbeat deadline
//!
//! Frames of one connection are handled strictly in arrival order; each
//! step (including any reply push) finishes before the next frame is read.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{ws::Message, ws::WebSocket, ws::WebSocketUpgrade, Query, State},
    http::HeaderMap,
    response::Response,
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;
use tracing::Instrument;

use sockwire_core::error::Result;
use sockwire_core::protocol::EngineKind;

use crate::app_state::AppState;
use crate::socketio::{CloseReason, ConnId, Connection, RequestInfo, Transport};
use crate::transport::registry::SessionHandle;

// --------------------
// Entry
// --------------------
pub async fn ws_upgrade(
    State(app): State<AppState>,
    ws: WebSocketUpgrade,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let request = RequestInfo::from_parts(query, &headers);
    ws.on_upgrade(move |socket| async move {
        let conn_id = app.transport().next_id();
        let span = tracing::info_span!(
            "conn",
            conn = %conn_id,
            eio = %request.protocol_version(),
            sid = tracing::field::Empty,
        );
        if let Err(e) = run_session(app, conn_id, request, socket).instrument(span).await {
            tracing::warn!(conn = %conn_id, error = %e, "session ended with error");
        }
    })
}

/// Unregisters the socket however the session ends.
struct SessionGuard {
    app: AppState,
    conn: ConnId,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.app.transport().unregister(self.conn);
        self.app.metrics().connections_active.dec(&[]);
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending::<()>().await,
    }
}

fn frame_kind(frame: &[u8]) -> &'static str {
    frame
        .first()
        .and_then(|d| EngineKind::from_digit(*d))
        .map(EngineKind::as_str)
        .unwrap_or("invalid")
}

// --------------------
// Core session loop
// --------------------
async fn run_session(
    app: AppState,
    conn_id: ConnId,
    request: RequestInfo,
    socket: WebSocket,
) -> Result<()> {
    let metrics = app.metrics();

    // ---- outbound channel
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(app.cfg().gateway.outbound_queue);
    let closing = Arc::new(Notify::new());
    app.transport().register(
        conn_id,
        SessionHandle {
            tx: out_tx,
            closing: Arc::clone(&closing),
        },
    );
    metrics.connections_active.inc(&[]);
    let _guard = SessionGuard {
        app: app.clone(),
        conn: conn_id,
    };

    // ---- split socket
    let (mut ws_tx, mut ws_rx) = socket.split();

    // ---- handshake
    let transport: Arc<dyn Transport> = app.transport();
    let mut conn = Connection::new(
        conn_id,
        request.protocol_version(),
        app.heartbeat(),
        transport,
        app.bus(),
    );
    tracing::Span::current().record("sid", conn.sid());
    match conn.start(&request) {
        Ok(()) => tracing::info!("connection open"),
        Err(e) => {
            // the loop below flushes the handshake, then hangs up
            tracing::warn!(error = %e, code = e.client_code().as_str(), "open rejected, closing connection");
            metrics.handler_errors.inc(&[("code", e.client_code().as_str())]);
            conn.close(CloseReason::HandlerError);
        }
    }

    loop {
        let deadline = conn.next_deadline();

        tokio::select! {
            // outbound writer
            maybe_out = out_rx.recv() => {
                match maybe_out {
                    Some(m) => {
                        if ws_tx.send(m).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            // core asked to hang up: flush what is queued, then close
            _ = closing.notified() => {
                while let Ok(m) = out_rx.try_recv() {
                    if ws_tx.send(m).await.is_err() {
                        break;
                    }
                }
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }

            // inbound reader
            incoming = ws_rx.next() => {
                let Some(incoming) = incoming else { break; };
                let Ok(msg) = incoming else { break; };

                let frame = match msg {
                    Message::Text(s) => Bytes::from(s),
                    Message::Binary(b) => Bytes::from(b),
                    // websocket-level keepalive is answered by axum
                    Message::Ping(_) | Message::Pong(_) => continue,
                    Message::Close(_) => break,
                };

                metrics.frames_in.inc(&[("kind", frame_kind(&frame))]);
                let started = std::time::Instant::now();
                if let Err(e) = conn.on_message(frame) {
                    tracing::warn!(error = %e, code = e.client_code().as_str(), "handler failed, closing connection");
                    metrics.handler_errors.inc(&[("code", e.client_code().as_str())]);
                    conn.close(CloseReason::HandlerError);
                }
                metrics.frame_duration.observe(&[], started.elapsed());
            }

            // heartbeat
            _ = sleep_until_opt(deadline) => {
                if let Err(e) = conn.on_timer(Instant::now()) {
                    tracing::warn!(error = %e, "heartbeat step failed, closing connection");
                    conn.close(CloseReason::HandlerError);
                }
            }
        }
    }

    let reason = conn.close_reason().unwrap_or(CloseReason::TransportClosed);
    metrics.closes.inc(&[("reason", reason.as_str())]);
    tracing::info!(reason = reason.as_str(), "connection closed");

    conn.on_close()
}
