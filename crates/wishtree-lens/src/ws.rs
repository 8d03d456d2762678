//! WebSocket streaming for live board updates.
//!
//! A client connecting to `/api/v1/ws/wishes` first receives a snapshot of
//! every claim on the board, then each [`SessionEvent`] as it happens, and
//! a heartbeat every [`HEARTBEAT_INTERVAL`]. A client too slow to keep up
//! with the event stream gets a fresh snapshot instead of the events it
//! missed.
//!
//! ```text
//! ┌─────────────┐     WebSocket      ┌──────────────┐
//! │   Browser   │ ←─────────────────→ │  Board node  │
//! └─────────────┘                     │  ┌────────┐  │
//!                                     │  │Session │──┼──→ Claims store
//!                                     │  └────────┘  │
//!                                     └──────────────┘
//! ```

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use wishtree_protocols::{SessionEvent, SyncState};
use wishtree_store::Claim;

use crate::api::AppState;
use crate::node::NodeSession;

/// Time between heartbeats on an idle connection.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Messages produced by the socket itself, next to [`SessionEvent`]s.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoardMessage {
    /// Every claim on the board
    Snapshot {
        sync_state: SyncState,
        wishes: Vec<Claim>,
    },
    /// Heartbeat to keep connection alive
    Heartbeat { timestamp: u64 },
}

/// WebSocket handler for board updates
pub async fn ws_wishes_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_wish_socket(socket, state))
}

async fn handle_wish_socket(socket: WebSocket, state: AppState) {
    info!("WebSocket client connected for board updates");
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the snapshot so nothing falls in between.
    let (mut events, snapshot) = {
        let state = state.read().await;
        let events: broadcast::Receiver<SessionEvent> = state.session.events();
        (events, create_snapshot(&state.session).await)
    };
    if let Err(e) = send_json(&mut sender, &snapshot).await {
        warn!("Failed to send initial snapshot: {}", e);
        return;
    }

    let start = tokio::time::Instant::now() + HEARTBEAT_INTERVAL;
    let mut heartbeat = tokio::time::interval_at(start, HEARTBEAT_INTERVAL);

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!("Received from client: {}", text);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            event = events.recv() => {
                let sent = match event {
                    Ok(event) => send_json(&mut sender, &event).await,
                    Err(RecvError::Lagged(missed)) => {
                        warn!("WebSocket client lagged by {} events, resending snapshot", missed);
                        let snapshot = {
                            let state = state.read().await;
                            create_snapshot(&state.session).await
                        };
                        send_json(&mut sender, &snapshot).await
                    }
                    Err(RecvError::Closed) => break,
                };
                if let Err(e) = sent {
                    warn!("Failed to send board update: {}", e);
                    break;
                }
            }
            _ = heartbeat.tick() => {
                let beat = BoardMessage::Heartbeat { timestamp: unix_now() };
                if let Err(e) = send_json(&mut sender, &beat).await {
                    warn!("Failed to send heartbeat: {}", e);
                    break;
                }
            }
        }
    }
}

/// Create a snapshot of the board
pub(crate) async fn create_snapshot(session: &NodeSession) -> BoardMessage {
    let mut wishes: Vec<Claim> = session.snapshot().await.into_values().collect();
    wishes.sort_by_key(|claim| claim.slot);
    BoardMessage::Snapshot {
        sync_state: session.sync_state(),
        wishes,
    }
}

/// Serialize a message for the wire
pub(crate) fn encode<T: Serialize>(message: &T) -> Result<String, axum::Error> {
    serde_json::to_string(message).map_err(axum::Error::new)
}

async fn send_json<T: Serialize>(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &T,
) -> Result<(), axum::Error> {
    sender.send(Message::Text(encode(message)?)).await
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
