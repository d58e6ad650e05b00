//! Live notification channel.
//!
//! Push only: the server sends `video_update` messages, and inbound frames
//! serve solely to detect that the client went away.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use storagex_models::{LiveMessage, UserId};

use crate::metrics;
use crate::state::AppState;

/// Events buffered per session before new ones are dropped.
const WS_SEND_BUFFER_SIZE: usize = 32;
const WS_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// `GET /ws/:user_id`
pub async fn ws_notifications(
    ws: WebSocketUpgrade,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    metrics::record_ws_connection();
    let user_id = UserId::new(user_id);
    ws.on_upgrade(move |socket| handle_socket(socket, user_id, state))
}

async fn handle_socket(socket: WebSocket, user_id: UserId, state: AppState) {
    let (mut ws_sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<LiveMessage>(WS_SEND_BUFFER_SIZE);

    let connection = state.registry.connect(&user_id, tx).await;
    metrics::set_ws_active_connections(state.registry.total_connections().await);
    info!(user_id = %user_id, connection, "Live session opened");

    let send_task = tokio::spawn(async move {
        let mut heartbeat = interval(WS_HEARTBEAT_INTERVAL);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                message = rx.recv() => {
                    let Some(message) = message else { break };
                    let json = match serde_json::to_string(&message) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!("Failed to encode live message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if ws_sender.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => debug!(user_id = %user_id, "Ignoring inbound frame"),
        }
    }

    state.registry.disconnect(&user_id, connection).await;
    send_task.abort();
    metrics::set_ws_active_connections(state.registry.total_connections().await);
    info!(user_id = %user_id, connection, "Live session closed");
}
