//! WebSocket upgrade handler and per-connection event loop.
//!
//! A connection opens unbound and stays usable for topic-room traffic even if
//! it never binds an identity. All registry state for a connection is cleared
//! when its loop exits, however the transport closed.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use crate::id;
use crate::AppState;

use super::events::{AuthUserPayload, ClientFrame, EventName, ServerFrame};
use super::fanout::RoomEvent;
use super::registry::room;

pub fn router() -> Router<AppState> {
    Router::new().route("/socket", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let conn_id = id::prefixed_ulid(id::prefix::CONNECTION);
    state.registry.register(&conn_id);
    tracing::info!(%conn_id, "connection open");

    let (ws_tx, ws_rx) = socket.split();
    let bus_rx = state.bus.subscribe();

    run_connection(&state, &conn_id, ws_tx, ws_rx, bus_rx).await;

    // Clears every room membership and the identity binding. Idempotent, so
    // it doesn't matter how the loop exited.
    state.registry.remove(&conn_id);
    tracing::info!(%conn_id, "connection closed");
}

/// Main connection loop: read client frames, forward matching bus events.
async fn run_connection(
    state: &AppState,
    conn_id: &str,
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut ws_rx: SplitStream<WebSocket>,
    mut bus_rx: broadcast::Receiver<Arc<RoomEvent>>,
) {
    loop {
        tokio::select! {
            // Client sends us a frame.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_frame(state, conn_id, &text);
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, %conn_id, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            // Event from the fan-out bus.
            result = bus_rx.recv() => {
                match result {
                    Ok(event) => {
                        if !state.registry.is_member(conn_id, &event.room) {
                            continue;
                        }

                        let frame = ServerFrame {
                            event: event.event_name.clone(),
                            data: event.data.clone(),
                            ts: event.ts,
                        };
                        let json = serde_json::to_string(&frame).unwrap();
                        if ws_tx.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(%conn_id, skipped = n, "connection lagged behind event bus");
                        // Continue — the missed events are simply dropped.
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

/// Dispatch one inbound client frame. Malformed frames are logged and
/// dropped; they are never fatal to the connection.
fn handle_client_frame(state: &AppState, conn_id: &str, text: &str) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!(?e, %conn_id, "dropping malformed client frame");
            return;
        }
    };

    match frame.event.as_str() {
        EventName::AUTH_USER => {
            let payload: AuthUserPayload = match serde_json::from_value(frame.data) {
                Ok(p) => p,
                Err(e) => {
                    tracing::debug!(?e, %conn_id, "dropping malformed auth_user payload");
                    return;
                }
            };
            state.registry.bind_user(conn_id, payload.uid());
            tracing::info!(%conn_id, uid = %payload.uid(), "connection bound");
        }
        EventName::JOIN_POST => {
            if let Some(post_id) = frame.data.as_str() {
                state.registry.join(conn_id, &room::post(post_id));
                tracing::debug!(%conn_id, post_id, "joined post room");
            } else {
                tracing::debug!(%conn_id, "dropping join:post with non-string payload");
            }
        }
        EventName::LEAVE_POST => {
            if let Some(post_id) = frame.data.as_str() {
                state.registry.leave(conn_id, &room::post(post_id));
                tracing::debug!(%conn_id, post_id, "left post room");
            } else {
                tracing::debug!(%conn_id, "dropping leave:post with non-string payload");
            }
        }
        other => {
            tracing::debug!(%conn_id, event = %other, "ignoring unknown client event");
        }
    }
}
