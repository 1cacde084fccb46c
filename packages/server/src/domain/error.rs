//! Domain error types.

use thiserror::Error;

/// Errors raised while constructing value objects from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{0} contains characters outside [A-Za-z0-9_-]")]
    InvalidCharacter(&'static str),
}

/// Errors a room can report back to the caller that submitted a command.
///
/// Everything else that goes wrong inside a room (malformed messages, stale
/// operations, failed deliveries) is handled locally and never surfaces here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    /// The challenge room already holds `capacity` participants.
    #[error("room is full ({capacity} participants)")]
    RoomFull { capacity: usize },

    /// An administrative start was requested after the round left `waiting`.
    #[error("challenge already started")]
    AlreadyStarted,

    /// The command is not meaningful for this kind of room.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    /// The room actor shut down before it could process the command.
    #[error("room is closed")]
    RoomClosed,

    #[error("internal error: {0}")]
    Internal(String),
}
