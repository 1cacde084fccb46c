//! Conversion logic from domain entities to DTOs.

use voltroom_shared::time::timestamp_to_rfc3339;

use crate::domain::{
    ChallengeParticipant, ChallengeRuntimeState, Cursor, Participant, RankedResult, RoomKey,
    SharedDocument,
};
use crate::infrastructure::dto::{http, websocket as dto};

// ========================================
// Document rooms
// ========================================

impl From<&SharedDocument> for dto::DocumentStateDto {
    fn from(document: &SharedDocument) -> Self {
        Self {
            components: document.components().to_vec(),
            wires: document.wires().to_vec(),
            version: document.version(),
            last_modified: document.last_modified().value(),
        }
    }
}

impl From<&Participant<Option<Cursor>>> for dto::DocumentParticipantDto {
    fn from(participant: &Participant<Option<Cursor>>) -> Self {
        Self {
            user_id: participant.user_id.as_str().to_string(),
            username: participant.display_name.as_str().to_string(),
            cursor: participant.state,
        }
    }
}

impl<S> From<&Participant<S>> for dto::UserJoinedPayload {
    fn from(participant: &Participant<S>) -> Self {
        Self {
            user_id: participant.user_id.as_str().to_string(),
            username: participant.display_name.as_str().to_string(),
        }
    }
}

/// Build the read-only snapshot of a document room.
pub fn document_snapshot(
    key: &RoomKey,
    document: &SharedDocument,
    participants: &[Participant<Option<Cursor>>],
) -> http::DocumentRoomSnapshotDto {
    http::DocumentRoomSnapshotDto {
        room_key: key.as_str().to_string(),
        participant_count: participants.len(),
        participants: participants.iter().map(Into::into).collect(),
        version: document.version(),
        component_count: document.components().len(),
        wire_count: document.wires().len(),
        last_modified: timestamp_to_rfc3339(document.last_modified().value()),
    }
}

// ========================================
// Challenge rooms
// ========================================

impl From<&ChallengeParticipant> for dto::ChallengeParticipantDto {
    fn from(participant: &ChallengeParticipant) -> Self {
        Self {
            user_id: participant.user_id.as_str().to_string(),
            username: participant.display_name.as_str().to_string(),
            ready: participant.state.ready,
            score: participant.state.score,
            completed: participant.state.completed,
            solve_time: participant.state.solve_time_millis,
        }
    }
}

impl From<RankedResult> for dto::RankedResultDto {
    fn from(result: RankedResult) -> Self {
        Self {
            user_id: result.user_id.into_string(),
            username: result.display_name.into_string(),
            score: result.score,
            completed: result.completed,
            solve_time: result.solve_time_millis,
            rank: result.rank,
        }
    }
}

/// Runtime state as sent in `init` and in snapshots.
pub fn challenge_room_state(
    state: &ChallengeRuntimeState,
    challenge_id: Option<&str>,
) -> dto::ChallengeRoomStateDto {
    dto::ChallengeRoomStateDto {
        challenge_id: challenge_id.map(str::to_string),
        status: state.status(),
        start_time: state.start_time().map(|t| t.value()),
        end_time: state.end_time().map(|t| t.value()),
        max_participants: state.max_participants(),
        time_limit_seconds: state.time_limit_seconds(),
    }
}

/// Build the read-only snapshot of a challenge room.
pub fn challenge_snapshot(
    key: &RoomKey,
    state: &ChallengeRuntimeState,
    challenge_id: Option<&str>,
    participants: &[ChallengeParticipant],
) -> http::ChallengeRoomSnapshotDto {
    http::ChallengeRoomSnapshotDto {
        room_key: key.as_str().to_string(),
        participant_count: participants.len(),
        participants: participants.iter().map(Into::into).collect(),
        room_state: challenge_room_state(state, challenge_id),
    }
}
