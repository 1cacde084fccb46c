//! UseCase: 回路の共同編集ルーム
//!
//! 共有ドキュメント（部品と配線のグラフ）へのバージョン付き変更を適用し、
//! 差分を参加者全員へブロードキャストします。
//!
//! 競合解決は行いません（後勝ち）。バージョンはクライアントが順序や
//! 取りこぼしを検知するためのものです。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use voltroom_shared::time::Clock;

use super::room::{RoomBehavior, broadcast, send_to};
use crate::{
    domain::{
        Component, ConnectionId, ConnectionRegistry, Cursor, MessagePusher, Participant, RoomError,
        RoomKey, SharedDocument, Timestamp, Wire,
    },
    infrastructure::dto::{
        conversion::document_snapshot,
        http::{RoomKind, RoomSnapshot},
        websocket::{
            ComponentUpdatedPayload, CursorUpdatePayload, DocumentClientMessage,
            DocumentInitPayload, DocumentServerMessage, RecordAddedPayload, RecordRemovedPayload,
            SyncResponsePayload, UserJoinedPayload, UserLeftPayload,
        },
    },
    runtime::messages::{JoinRequest, TimerEvent},
};

/// Collaborative editing room for one circuit.
pub struct DocumentRoom {
    key: RoomKey,
    document: SharedDocument,
    registry: ConnectionRegistry<Option<Cursor>>,
    pusher: Box<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
}

impl DocumentRoom {
    pub fn new(key: RoomKey, pusher: Box<dyn MessagePusher>, clock: Arc<dyn Clock>) -> Self {
        let created_at = Timestamp::new(clock.now_millis());
        Self {
            key,
            document: SharedDocument::new(created_at),
            registry: ConnectionRegistry::unbounded(),
            pusher,
            clock,
        }
    }

    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }

    /// User id of a registered connection; `None` for stale handles.
    fn author(&self, handle: &ConnectionId) -> Option<String> {
        let author = self
            .registry
            .get(handle)
            .map(|participant| participant.user_id.as_str().to_string());
        if author.is_none() {
            tracing::debug!(room_key = %self.key, connection_id = %handle, "Ignoring operation from unknown connection");
        }
        author
    }

    async fn send(&self, handle: &ConnectionId, message: &DocumentServerMessage) {
        send_to(self.pusher.as_ref(), handle, message).await;
    }

    async fn broadcast(&self, message: &DocumentServerMessage, exclude: Option<ConnectionId>) {
        broadcast(self.pusher.as_ref(), message, exclude).await;
    }

    /// Update the sender's cursor and tell everyone else. Not versioned.
    pub async fn move_cursor(&mut self, handle: ConnectionId, cursor: Cursor) {
        let Some(participant) = self.registry.get_mut(&handle) else {
            return;
        };
        participant.state = Some(cursor);
        let message = DocumentServerMessage::CursorUpdate(CursorUpdatePayload {
            user_id: participant.user_id.as_str().to_string(),
            cursor,
        });
        // the sender already shows its own cursor
        self.broadcast(&message, Some(handle)).await;
    }

    pub async fn add_component(&mut self, handle: ConnectionId, component: Component) {
        let Some(by) = self.author(&handle) else {
            return;
        };
        let now = self.now();
        let version = self.document.add_component(component.clone(), now);
        let message = DocumentServerMessage::ComponentAdded(RecordAddedPayload {
            record: component,
            by,
            version,
        });
        self.broadcast(&message, None).await;
    }

    pub async fn remove_component(&mut self, handle: ConnectionId, id: String) {
        let Some(by) = self.author(&handle) else {
            return;
        };
        let now = self.now();
        let version = self.document.remove_component(&id, now);
        let message =
            DocumentServerMessage::ComponentRemoved(RecordRemovedPayload { id, by, version });
        self.broadcast(&message, None).await;
    }

    pub async fn update_component(
        &mut self,
        handle: ConnectionId,
        id: String,
        changes: Map<String, Value>,
    ) {
        let Some(by) = self.author(&handle) else {
            return;
        };
        let now = self.now();
        let version = self.document.update_component(&id, &changes, now);
        let message = DocumentServerMessage::ComponentUpdated(ComponentUpdatedPayload {
            id,
            changes,
            by,
            version,
        });
        self.broadcast(&message, None).await;
    }

    pub async fn add_wire(&mut self, handle: ConnectionId, wire: Wire) {
        let Some(by) = self.author(&handle) else {
            return;
        };
        let now = self.now();
        let version = self.document.add_wire(wire.clone(), now);
        let message = DocumentServerMessage::WireAdded(RecordAddedPayload {
            record: wire,
            by,
            version,
        });
        self.broadcast(&message, None).await;
    }

    pub async fn remove_wire(&mut self, handle: ConnectionId, id: String) {
        let Some(by) = self.author(&handle) else {
            return;
        };
        let now = self.now();
        let version = self.document.remove_wire(&id, now);
        let message = DocumentServerMessage::WireRemoved(RecordRemovedPayload { id, by, version });
        self.broadcast(&message, None).await;
    }

    /// Unicast the full document back to a client that suspects drift.
    pub async fn sync_request(&self, handle: ConnectionId) {
        if self.author(&handle).is_none() {
            return;
        }
        let message = DocumentServerMessage::SyncResponse(SyncResponsePayload {
            state: (&self.document).into(),
        });
        self.send(&handle, &message).await;
    }
}

#[async_trait]
impl RoomBehavior for DocumentRoom {
    const KIND: RoomKind = RoomKind::Circuit;

    async fn join(&mut self, request: JoinRequest) -> Result<(), RoomError> {
        let JoinRequest {
            handle,
            user_id,
            display_name,
            sender,
            ..
        } = request;
        let participant = Participant::new(handle, user_id, display_name);
        let joined: UserJoinedPayload = self.registry.join(participant)?.into();
        self.pusher.register_client(handle, sender).await;

        let init = DocumentServerMessage::Init(DocumentInitPayload {
            state: (&self.document).into(),
            participants: self.registry.list().iter().map(Into::into).collect(),
        });
        self.send(&handle, &init).await;

        tracing::info!(
            room_key = %self.key,
            connection_id = %handle,
            "User '{}' joined circuit room ({} participants)",
            joined.user_id,
            self.registry.len()
        );
        self.broadcast(&DocumentServerMessage::UserJoined(joined), Some(handle))
            .await;
        Ok(())
    }

    async fn leave(&mut self, handle: ConnectionId) {
        let Some(participant) = self.registry.leave(&handle) else {
            return;
        };
        self.pusher.unregister_client(&handle).await;
        tracing::info!(
            room_key = %self.key,
            connection_id = %handle,
            "User '{}' left circuit room ({} participants)",
            participant.user_id.as_str(),
            self.registry.len()
        );

        let message = DocumentServerMessage::UserLeft(UserLeftPayload {
            user_id: participant.user_id.into_string(),
        });
        self.broadcast(&message, None).await;
    }

    async fn handle_message(&mut self, handle: ConnectionId, text: &str) {
        let message = match DocumentClientMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(room_key = %self.key, connection_id = %handle, "Dropping malformed message: {}", e);
                return;
            }
        };

        match message {
            DocumentClientMessage::CursorMove(cursor) => self.move_cursor(handle, cursor).await,
            DocumentClientMessage::AddComponent(component) => {
                self.add_component(handle, component).await
            }
            DocumentClientMessage::RemoveComponent { id } => {
                self.remove_component(handle, id).await
            }
            DocumentClientMessage::UpdateComponent { id, changes } => {
                self.update_component(handle, id, changes).await
            }
            DocumentClientMessage::AddWire(wire) => self.add_wire(handle, wire).await,
            DocumentClientMessage::RemoveWire { id } => self.remove_wire(handle, id).await,
            DocumentClientMessage::SyncRequest => self.sync_request(handle).await,
        }
    }

    async fn on_timer(&mut self, event: TimerEvent) {
        tracing::debug!(room_key = %self.key, "Circuit rooms schedule no timers, ignoring {:?}", event);
    }

    async fn start(&mut self) -> Result<(), RoomError> {
        Err(RoomError::Unsupported("circuit rooms have no round to start"))
    }

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot::Document(document_snapshot(
            &self.key,
            &self.document,
            self.registry.list(),
        ))
    }

    fn participant_count(&self) -> usize {
        self.registry.len()
    }

    fn disconnected(&self) -> Vec<ConnectionId> {
        self.pusher.disconnected()
    }
}
