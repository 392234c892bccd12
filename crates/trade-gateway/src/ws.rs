//! Per-connection WebSocket handling: upgrade, the outbound send task, and
//! the inbound dispatch loop that feeds [`SessionCoordinator::dispatch`].

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use trade_session_core::{PeerSink, ServerEvent, SessionCoordinator};

use crate::protocol::{ClientMessage, OutboundFrame};

const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

/// [`PeerSink`] backed by a connection's outbound mpsc channel. Dropping the
/// channel (because the connection's send task exited) makes `emit` a
/// silent no-op — peer notifications are never retried.
struct ChannelSink {
    tx: mpsc::Sender<OutboundFrame>,
}

#[async_trait]
impl PeerSink for ChannelSink {
    async fn emit(&self, event: ServerEvent) {
        let _ = self.tx.send(OutboundFrame::Event(event)).await;
    }
}

pub async fn upgrade(
    State(coordinator): State<Arc<SessionCoordinator>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(coordinator, socket))
}

async fn handle_socket(coordinator: Arc<SessionCoordinator>, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<OutboundFrame>(OUTBOUND_CHANNEL_CAPACITY);

    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(t) => t,
                Err(e) => {
                    warn!(error = %e, "failed to serialize outbound frame");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Acks for this connection's own requests go straight back through
    // `tx`, never through the registry — the registry only knows about
    // connections that finished `authenticate`.
    let sink = Arc::new(ChannelSink { tx: tx.clone() });
    let conn = coordinator.new_connection(sink);

    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "websocket error");
                break;
            }
        };

        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => {
                debug!("connection closed by peer");
                break;
            }
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => continue,
        };

        let parsed: ClientMessage = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, raw = %text, "failed to parse client message");
                continue;
            }
        };

        let cid = parsed.cid.clone();
        let result = coordinator.dispatch(&conn, parsed.action.into()).await;
        let frame = match result {
            Ok(()) => OutboundFrame::ack_ok(cid),
            Err(err) => OutboundFrame::ack_err(cid, err),
        };
        if tx.send(frame).await.is_err() {
            break;
        }
    }

    coordinator.disconnect(&conn).await;
    send_task.abort();
}
