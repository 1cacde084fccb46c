//! WebSocket を使った MessagePusher 実装
//!
//! ## 責務
//!
//! - ルームに参加している接続の `UnboundedSender` を管理
//! - 接続へのメッセージ送信（push_to, broadcast）
//!
//! ## 設計ノート
//!
//! WebSocket の生成は UI 層（`ui/handler/websocket.rs`）で行われます。
//! この実装は生成された `UnboundedSender` を受け取り、メッセージ送信に使用します。
//! インスタンスはルームのアクターが単独で所有するため、ロックは不要です。

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::{ConnectionId, MessagePushError, MessagePusher, PusherChannel};

/// WebSocket を使った MessagePusher 実装
#[derive(Default)]
pub struct WebSocketMessagePusher {
    /// Key: connection handle, Value: その接続への送信チャンネル
    clients: HashMap<ConnectionId, PusherChannel>,
}

impl WebSocketMessagePusher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessagePusher for WebSocketMessagePusher {
    async fn register_client(&mut self, handle: ConnectionId, sender: PusherChannel) {
        self.clients.insert(handle, sender);
        tracing::debug!(connection_id = %handle, "Connection registered to MessagePusher");
    }

    async fn unregister_client(&mut self, handle: &ConnectionId) {
        if self.clients.remove(handle).is_some() {
            tracing::debug!(connection_id = %handle, "Connection unregistered from MessagePusher");
        }
    }

    async fn push_to(&self, handle: &ConnectionId, content: &str) -> Result<(), MessagePushError> {
        let sender = self
            .clients
            .get(handle)
            .ok_or(MessagePushError::ClientNotFound(*handle))?;
        sender
            .send(content.to_string())
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))?;
        tracing::debug!(connection_id = %handle, "Pushed message to connection");
        Ok(())
    }

    async fn broadcast(&self, content: &str, exclude: Option<ConnectionId>) -> usize {
        let mut delivered = 0;
        for (handle, sender) in &self.clients {
            if Some(*handle) == exclude {
                continue;
            }
            // ブロードキャストでは一部の送信失敗を許容（切断処理中の接続など）
            match sender.send(content.to_string()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(connection_id = %handle, "Failed to push message: {}", e);
                }
            }
        }
        delivered
    }

    fn disconnected(&self) -> Vec<ConnectionId> {
        self.clients
            .iter()
            .filter(|(_, sender)| sender.is_closed())
            .map(|(handle, _)| *handle)
            .collect()
    }
}
