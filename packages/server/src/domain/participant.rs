//! Participant record shared by both room kinds.

use super::value_object::{ConnectionId, DisplayName, UserId};

/// One connection's presence in a room.
///
/// `S` carries the room-kind-specific ephemeral fields (cursor position for
/// document rooms, progress for challenge rooms).
#[derive(Debug, Clone, PartialEq)]
pub struct Participant<S> {
    pub handle: ConnectionId,
    pub user_id: UserId,
    pub display_name: DisplayName,
    pub state: S,
}

impl<S: Default> Participant<S> {
    /// Create a participant with default ephemeral fields.
    pub fn new(handle: ConnectionId, user_id: UserId, display_name: DisplayName) -> Self {
        Self {
            handle,
            user_id,
            display_name,
            state: S::default(),
        }
    }
}
