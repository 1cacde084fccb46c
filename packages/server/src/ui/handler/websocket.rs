//! WebSocket connection handlers.
//!
//! A connection is admitted by the room before the upgrade completes, so a
//! full challenge room turns the client away with `503` and never sees the
//! socket. Plain GETs on the same routes return the room snapshot.

use std::sync::Arc;

use axum::{
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use super::{error_response, http::room_snapshot, room_error_response};
use crate::{
    domain::{ConnectionId, DisplayName, RoomKey, UserId, ValueObjectError},
    runtime::{JoinRequest, RoomDirectory, RoomHandle},
    ui::state::AppState,
    usecase::RoomBehavior,
};

/// Query parameters for WebSocket connection
///
/// Identity is authenticated upstream and trusted as-is.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectQuery {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub challenge_id: Option<String>,
}

impl ConnectQuery {
    /// `username` falls back to `user_id` when absent or blank.
    fn identity(&self) -> Result<(UserId, DisplayName), ValueObjectError> {
        let user_id = UserId::new(self.user_id.clone().unwrap_or_default())?;
        let display_name = match self.username.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => DisplayName::new(name.to_string())?,
            _ => DisplayName::new(user_id.as_str().to_string())?,
        };
        Ok((user_id, display_name))
    }
}

pub async fn circuit_room_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<Arc<AppState>>,
    Path(circuit_id): Path<String>,
    Query(query): Query<ConnectQuery>,
) -> Response {
    connect(ws, &state.documents, circuit_id, query).await
}

pub async fn challenge_room_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<ConnectQuery>,
) -> Response {
    connect(ws, &state.challenges, session_id, query).await
}

async fn connect<B: RoomBehavior>(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    directory: &RoomDirectory<B>,
    raw_key: String,
    query: ConnectQuery,
) -> Response {
    let key = match RoomKey::new(raw_key) {
        Ok(key) => key,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let Ok(ws) = ws else {
        return room_snapshot(directory, &key).await;
    };

    let (user_id, display_name) = match query.identity() {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(room_key = %key, "Rejecting connection with invalid identity: {}", e);
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    let handle = ConnectionId::generate();
    let (tx, rx) = mpsc::unbounded_channel();
    let request = JoinRequest {
        handle,
        user_id,
        display_name,
        challenge_id: query.challenge_id,
        sender: tx,
    };

    let room = match directory.join(&key, request).await {
        Ok(room) => room,
        Err(e) => {
            tracing::warn!(room_key = %key, connection_id = %handle, "Join rejected: {}", e);
            return room_error_response(&e);
        }
    };

    let failed_room = room.clone();
    ws.on_failed_upgrade(move |e| {
        tracing::warn!(connection_id = %handle, "WebSocket upgrade failed: {}", e);
        tokio::spawn(async move { failed_room.leave(handle).await });
    })
    .on_upgrade(move |socket| handle_socket(socket, room, handle, rx))
    .into_response()
}

/// Spawns a task that receives messages from the rx channel and pushes them to the WebSocket sender.
///
/// The task ends when the room drops the connection's channel or the socket
/// stops accepting frames.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

async fn handle_socket(
    socket: WebSocket,
    room: RoomHandle,
    handle: ConnectionId,
    rx: mpsc::UnboundedReceiver<String>,
) {
    let (sender, mut receiver) = socket.split();
    tracing::info!(room_key = %room.key(), connection_id = %handle, "Socket session started");

    let inbound_room = room.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!(connection_id = %handle, "WebSocket error: {}", e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => inbound_room.deliver(handle, text.to_string()).await,
                Message::Close(_) => {
                    tracing::debug!(connection_id = %handle, "Client requested close");
                    break;
                }
                // Ping/pong is handled automatically by the WebSocket protocol
                _ => {}
            }
        }
    });

    let mut send_task = pusher_loop(rx, sender);

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    room.leave(handle).await;
    tracing::info!(room_key = %room.key(), connection_id = %handle, "Socket session ended");
}
