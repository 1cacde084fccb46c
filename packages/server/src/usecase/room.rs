//! Behavior shared by every room kind.

use async_trait::async_trait;
use serde::Serialize;

use crate::{
    domain::{ConnectionId, MessagePusher, RoomError},
    infrastructure::dto::http::{RoomKind, RoomSnapshot},
    runtime::messages::{JoinRequest, TimerEvent},
};

/// State and operations of one room, driven by its actor.
///
/// Every method runs inside the room's single execution context, one at a
/// time, so implementations own their state without locks.
#[async_trait]
pub trait RoomBehavior: Send + 'static {
    const KIND: RoomKind;

    /// Admit a connection, unicast `init` to it and tell everyone else.
    async fn join(&mut self, request: JoinRequest) -> Result<(), RoomError>;

    /// Remove a connection. Unknown handles are a silent no-op.
    async fn leave(&mut self, handle: ConnectionId);

    /// Handle one raw inbound frame. Malformed frames are logged and dropped.
    async fn handle_message(&mut self, handle: ConnectionId, text: &str);

    async fn on_timer(&mut self, event: TimerEvent);

    /// Administrative start, only meaningful for challenge rooms.
    async fn start(&mut self) -> Result<(), RoomError>;

    fn snapshot(&self) -> RoomSnapshot;

    fn participant_count(&self) -> usize;

    /// Participants whose outbound channel is closed but who never left.
    fn disconnected(&self) -> Vec<ConnectionId>;
}

/// Serialize `message` once and unicast it. Failures are logged only.
pub(crate) async fn send_to<M: Serialize + Sync>(
    pusher: &dyn MessagePusher,
    handle: &ConnectionId,
    message: &M,
) {
    let Some(json) = encode(message) else {
        return;
    };
    if let Err(e) = pusher.push_to(handle, &json).await {
        tracing::debug!(connection_id = %handle, "Unicast dropped: {}", e);
    }
}

/// Serialize `message` once and fan it out to everyone except `exclude`.
pub(crate) async fn broadcast<M: Serialize + Sync>(
    pusher: &dyn MessagePusher,
    message: &M,
    exclude: Option<ConnectionId>,
) {
    let Some(json) = encode(message) else {
        return;
    };
    let delivered = pusher.broadcast(&json, exclude).await;
    tracing::trace!(delivered, "Broadcast delivered");
}

fn encode<M: Serialize>(message: &M) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!("Failed to serialize outbound message: {}", e);
            None
        }
    }
}
