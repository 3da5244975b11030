//! WebSocket transport
//!
//! One connection = one reader task and one writer task. The reader processes frames
//! strictly in order; each frame runs in its own spawned task so that a mutation that
//! passed authorization still commits and broadcasts if the socket dies mid-request.
//! Whichever task ends first tears down the other, and registry cleanup runs in every
//! case, including a panicking task.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::identity::{session_token, IdentityContext};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// GET /ws
///
/// Identity is resolved here, once, before the upgrade. An unauthenticated upgrade is
/// still accepted; every command on it is then rejected as `unauthenticated`, and it
/// receives no `site_created` announcements.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
) -> Response {
    let identity = state
        .sessions
        .resolve(session_token(&headers, query.token.as_deref()));
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

async fn handle_socket(socket: WebSocket, state: AppState, identity: IdentityContext) {
    let connection = Uuid::new_v4();
    let username = identity
        .identity()
        .map(|i| i.username.clone())
        .unwrap_or_else(|| "<unauthenticated>".to_string());
    info!(%connection, %username, "WebSocket connection established");

    let (outbound_tx, mut outbound_rx) = mpsc::channel(state.outbound_capacity);
    match identity {
        IdentityContext::Authenticated(_) => state.registry.register(connection, outbound_tx).await,
        IdentityContext::Unauthenticated => {
            state.registry.register_anonymous(connection, outbound_tx).await
        }
    }

    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(event) = outbound_rx.recv().await {
            let text = match serde_json::to_string(event.as_ref()) {
                Ok(text) => text,
                Err(e) => {
                    error!(%connection, "Failed to serialize {}: {}", event.event_type(), e);
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Text(text)).await {
                debug!(%connection, "Socket send failed: {}", e);
                break;
            }
        }
        let _ = sink.close().await;
    });

    let broadcaster = state.broadcaster.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    let broadcaster = broadcaster.clone();
                    let identity = identity.clone();
                    let request = tokio::spawn(async move {
                        broadcaster.process_frame(connection, &identity, &text).await
                    });
                    match request.await {
                        Ok(Ok(outcome)) => debug!(%connection, ?outcome, "Command accepted"),
                        Ok(Err(reason)) => debug!(%connection, ?reason, "Command rejected"),
                        Err(e) => error!(%connection, "Command task failed: {}", e),
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!(%connection, "Client initiated close");
                    break;
                }
                Ok(Message::Binary(_)) => {
                    warn!(%connection, "Received binary message, ignoring");
                }
                // Ping/pong handled by axum
                Ok(_) => {}
                Err(e) => {
                    debug!(%connection, "WebSocket error: {}", e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    let rooms = state.registry.disconnect(connection).await;
    info!(%connection, %username, rooms, "WebSocket connection closed");
}
