//! HTTP query surface DTOs.

use serde::Serialize;

use super::websocket::{ChallengeParticipantDto, ChallengeRoomStateDto, DocumentParticipantDto};

/// Read-only view of a document room.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRoomSnapshotDto {
    pub room_key: String,
    pub participant_count: usize,
    pub participants: Vec<DocumentParticipantDto>,
    pub version: u64,
    pub component_count: usize,
    pub wire_count: usize,
    /// RFC 3339
    pub last_modified: String,
}

/// Read-only view of a challenge room.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRoomSnapshotDto {
    pub room_key: String,
    pub participant_count: usize,
    pub participants: Vec<ChallengeParticipantDto>,
    pub room_state: ChallengeRoomStateDto,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RoomSnapshot {
    Document(DocumentRoomSnapshotDto),
    Challenge(ChallengeRoomSnapshotDto),
}

impl RoomSnapshot {
    pub fn participant_count(&self) -> usize {
        match self {
            Self::Document(snapshot) => snapshot.participant_count,
            Self::Challenge(snapshot) => snapshot.participant_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    Circuit,
    Challenge,
}

/// Entry of `GET /api/rooms`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomSummaryDto {
    pub key: String,
    pub kind: RoomKind,
}

/// Response of the administrative start command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartResponseDto {
    pub status: String,
}

/// Body returned with a non-2xx status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponseDto {
    pub error: String,
}
