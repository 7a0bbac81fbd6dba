//! WebSocket progress channel.
//!
//! Clients send JSON events and receive progress snapshots:
//!
//! ```text
//! → {"event":"join_task","task_id":"t1"}     subscribe + immediate snapshot
//! → {"event":"get_progress","task_id":"t1"}  immediate snapshot only
//! → {"event":"leave_task","task_id":"t1"}    unsubscribe
//! ← {"type":"progress","task_id":"t1","completed":..,"total":..,"percentage":..,"isRunning":..}
//! ```
//!
//! Joining a task that is unknown or already finished yields the
//! not-running snapshot; there is no history.

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::state::AppState;
use crate::bulk::{ProgressSnapshot, SubscriberId, DEFAULT_SUBSCRIBER_CAPACITY};

/// Events a progress client can send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinTask { task_id: String },
    GetProgress { task_id: String },
    LeaveTask { task_id: String },
}

impl ClientEvent {
    fn task_id(&self) -> &str {
        match self {
            ClientEvent::JoinTask { task_id }
            | ClientEvent::GetProgress { task_id }
            | ClientEvent::LeaveTask { task_id } => task_id,
        }
    }
}

/// `GET /api/progress` (WebSocket upgrade)
pub async fn progress_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let broadcaster = state.orchestrator.broadcaster().clone();
    let (tx, mut rx) = mpsc::channel::<ProgressSnapshot>(DEFAULT_SUBSCRIBER_CAPACITY);
    let mut joined: HashMap<String, SubscriberId> = HashMap::new();

    info!("Progress client connected");

    loop {
        tokio::select! {
            incoming = stream.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!(error = %e, "Progress socket read failed");
                        break;
                    }
                };

                let event = match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "Ignoring malformed progress event");
                        continue;
                    }
                };

                if event.task_id().is_empty() {
                    warn!("Ignoring progress event without task_id");
                    continue;
                }

                match event {
                    ClientEvent::JoinTask { task_id } => {
                        if !joined.contains_key(&task_id) {
                            let id = broadcaster.attach(&task_id, tx.clone());
                            joined.insert(task_id.clone(), id);
                            info!(task_id = %task_id, "Progress client joined task");
                        }
                        let snapshot = state.orchestrator.progress(&task_id);
                        if !send_snapshot(&mut sink, &snapshot).await {
                            break;
                        }
                    }
                    ClientEvent::GetProgress { task_id } => {
                        let snapshot = state.orchestrator.progress(&task_id);
                        if !send_snapshot(&mut sink, &snapshot).await {
                            break;
                        }
                    }
                    ClientEvent::LeaveTask { task_id } => {
                        if let Some(id) = joined.remove(&task_id) {
                            broadcaster.unsubscribe(id);
                        }
                    }
                }
            }

            Some(snapshot) = rx.recv() => {
                if !send_snapshot(&mut sink, &snapshot).await {
                    break;
                }
            }
        }
    }

    for id in joined.into_values() {
        broadcaster.unsubscribe(id);
    }
    info!("Progress client disconnected");
}

/// Send one snapshot. Returns `false` when the socket is gone.
async fn send_snapshot(
    sink: &mut SplitSink<WebSocket, Message>,
    snapshot: &ProgressSnapshot,
) -> bool {
    let text = match serde_json::to_string(snapshot) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Failed to encode progress snapshot");
            return true;
        }
    };
    sink.send(Message::Text(text)).await.is_ok()
}
