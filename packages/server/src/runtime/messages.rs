//! Commands accepted by a room actor.

use tokio::sync::oneshot;

use crate::{
    domain::{ConnectionId, DisplayName, PusherChannel, RoomError, UserId},
    infrastructure::dto::http::RoomSnapshot,
};

/// Everything a room needs to admit a new connection.
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub handle: ConnectionId,
    pub user_id: UserId,
    pub display_name: DisplayName,
    /// Challenge rooms record the first non-empty value; document rooms ignore it.
    pub challenge_id: Option<String>,
    pub sender: PusherChannel,
}

/// Timer callbacks, posted back onto the owning room's mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    CountdownTick,
    TimeLimitExpired,
}

/// Messages sent to a room actor.
#[derive(Debug)]
pub enum RoomCommand {
    /// Admit a connection. Replies with `RoomError::RoomFull` at capacity.
    Join {
        request: JoinRequest,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Connection closed. Unknown handles are ignored.
    Leave { handle: ConnectionId },

    /// Raw text frame received from a connection.
    Deliver { handle: ConnectionId, text: String },

    Timer(TimerEvent),

    /// Read-only snapshot for the HTTP query surface.
    Snapshot {
        respond_to: oneshot::Sender<RoomSnapshot>,
    },

    /// Administrative start of a challenge round.
    Start {
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },
}
