//! MessagePusher trait 定義
//!
//! ルームが接続へメッセージを届けるためのインターフェース。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::value_object::ConnectionId;

/// Outbound channel of one connection. The UI layer drains it into the socket.
pub type PusherChannel = mpsc::UnboundedSender<String>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    #[error("connection '{0}' is not registered")]
    ClientNotFound(ConnectionId),

    #[error("failed to push message: {0}")]
    PushFailed(String),
}

/// Best-effort delivery of serialized messages to the connections of one room.
///
/// Broadcasts are at-most-once with no queueing or retry: a failing
/// recipient is skipped and never aborts delivery to the others.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// Register the outbound channel for `handle`.
    async fn register_client(&mut self, handle: ConnectionId, sender: PusherChannel);

    /// Forget the outbound channel for `handle`.
    async fn unregister_client(&mut self, handle: &ConnectionId);

    /// Unicast `content` to a single connection.
    async fn push_to(&self, handle: &ConnectionId, content: &str) -> Result<(), MessagePushError>;

    /// Fan `content` out to every registered connection except `exclude`.
    ///
    /// Returns the number of connections the message was handed to.
    async fn broadcast(&self, content: &str, exclude: Option<ConnectionId>) -> usize;

    /// Registered connections whose receiving side has gone away.
    fn disconnected(&self) -> Vec<ConnectionId>;
}
