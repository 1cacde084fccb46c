//! WebSocket message DTOs.
//!
//! Every frame is a JSON envelope `{"type": string, "data": object | absent}`.
//! Inbound frames are parsed per room kind; anything that does not parse is
//! reported as a `MessageParseError` and dropped by the room.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::{ChallengeStatus, Component, Cursor, GraphRecord, Wire};

/// Keys the room sets on `component_added` / `wire_added` next to the record.
const ATTRIBUTION_KEYS: [&str; 2] = ["by", "version"];

#[derive(Debug, Error)]
pub enum MessageParseError {
    #[error("invalid JSON envelope: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("unknown message type '{0}'")]
    UnknownType(String),

    #[error("invalid payload for '{kind}': {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl Envelope {
    fn parse(text: &str) -> Result<Self, MessageParseError> {
        serde_json::from_str(text).map_err(MessageParseError::InvalidJson)
    }

    fn payload<T: DeserializeOwned>(self) -> Result<T, MessageParseError> {
        let Envelope { kind, data } = self;
        serde_json::from_value(data)
            .map_err(|source| MessageParseError::InvalidPayload { kind, source })
    }
}

/// Drop client-supplied attribution so it cannot shadow the room's own.
fn without_attribution(mut record: GraphRecord) -> GraphRecord {
    for key in ATTRIBUTION_KEYS {
        if record.attributes.remove(key).is_some() {
            tracing::debug!(record_id = %record.id, key, "Dropped client-supplied attribution");
        }
    }
    record
}

// ========================================
// Inbound (client → room)
// ========================================

#[derive(Debug, Deserialize)]
struct IdPayload {
    id: String,
}

#[derive(Debug, Deserialize)]
struct UpdateComponentPayload {
    id: String,
    changes: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ReadyPayload {
    ready: bool,
}

#[derive(Debug, Deserialize)]
struct SubmitSolutionPayload {
    passed: bool,
    #[serde(default)]
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChatPayload {
    message: String,
}

/// Messages a client may send to a document room.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentClientMessage {
    CursorMove(Cursor),
    AddComponent(Component),
    RemoveComponent { id: String },
    UpdateComponent { id: String, changes: Map<String, Value> },
    AddWire(Wire),
    RemoveWire { id: String },
    SyncRequest,
}

impl DocumentClientMessage {
    pub fn parse(text: &str) -> Result<Self, MessageParseError> {
        let envelope = Envelope::parse(text)?;
        match envelope.kind.as_str() {
            "cursor_move" => envelope.payload().map(Self::CursorMove),
            "add_component" => envelope
                .payload()
                .map(|record| Self::AddComponent(without_attribution(record))),
            "remove_component" => envelope
                .payload()
                .map(|IdPayload { id }| Self::RemoveComponent { id }),
            "update_component" => {
                envelope
                    .payload()
                    .map(|UpdateComponentPayload { id, changes }| Self::UpdateComponent {
                        id,
                        changes,
                    })
            }
            "add_wire" => envelope
                .payload()
                .map(|record| Self::AddWire(without_attribution(record))),
            "remove_wire" => envelope
                .payload()
                .map(|IdPayload { id }| Self::RemoveWire { id }),
            "sync_request" => Ok(Self::SyncRequest),
            _ => Err(MessageParseError::UnknownType(envelope.kind)),
        }
    }
}

/// Messages a client may send to a challenge room.
#[derive(Debug, Clone, PartialEq)]
pub enum ChallengeClientMessage {
    Ready { ready: bool },
    SubmitSolution { passed: bool, score: Option<f64> },
    Chat { message: String },
}

impl ChallengeClientMessage {
    pub fn parse(text: &str) -> Result<Self, MessageParseError> {
        let envelope = Envelope::parse(text)?;
        match envelope.kind.as_str() {
            "ready" => envelope
                .payload()
                .map(|ReadyPayload { ready }| Self::Ready { ready }),
            "submit_solution" => {
                envelope
                    .payload()
                    .map(|SubmitSolutionPayload { passed, score }| Self::SubmitSolution {
                        passed,
                        score,
                    })
            }
            "chat" => envelope
                .payload()
                .map(|ChatPayload { message }| Self::Chat { message }),
            _ => Err(MessageParseError::UnknownType(envelope.kind)),
        }
    }
}

// ========================================
// Outbound (room → clients), shared payloads
// ========================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJoinedPayload {
    pub user_id: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLeftPayload {
    pub user_id: String,
}

// ========================================
// Outbound: document rooms
// ========================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStateDto {
    pub components: Vec<Component>,
    pub wires: Vec<Wire>,
    pub version: u64,
    pub last_modified: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentParticipantDto {
    pub user_id: String,
    pub username: String,
    pub cursor: Option<Cursor>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentInitPayload {
    pub state: DocumentStateDto,
    pub participants: Vec<DocumentParticipantDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorUpdatePayload {
    pub user_id: String,
    pub cursor: Cursor,
}

/// `component_added` / `wire_added`: the full record plus attribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordAddedPayload {
    #[serde(flatten)]
    pub record: Component,
    pub by: String,
    pub version: u64,
}

/// `component_removed` / `wire_removed`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordRemovedPayload {
    pub id: String,
    pub by: String,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentUpdatedPayload {
    pub id: String,
    pub changes: Map<String, Value>,
    pub by: String,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncResponsePayload {
    pub state: DocumentStateDto,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DocumentServerMessage {
    Init(DocumentInitPayload),
    UserJoined(UserJoinedPayload),
    UserLeft(UserLeftPayload),
    CursorUpdate(CursorUpdatePayload),
    ComponentAdded(RecordAddedPayload),
    ComponentRemoved(RecordRemovedPayload),
    ComponentUpdated(ComponentUpdatedPayload),
    WireAdded(RecordAddedPayload),
    WireRemoved(RecordRemovedPayload),
    SyncResponse(SyncResponsePayload),
}

// ========================================
// Outbound: challenge rooms
// ========================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRoomStateDto {
    pub challenge_id: Option<String>,
    pub status: ChallengeStatus,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub max_participants: usize,
    pub time_limit_seconds: u64,
}

/// Participant as shown to other clients (no connection handle).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeParticipantDto {
    pub user_id: String,
    pub username: String,
    pub ready: bool,
    pub score: u32,
    pub completed: bool,
    pub solve_time: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeInitPayload {
    pub room_state: ChallengeRoomStateDto,
    pub participants: Vec<ChallengeParticipantDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantReadyPayload {
    pub user_id: String,
    pub ready: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountdownPayload {
    pub seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeStartedPayload {
    pub start_time: i64,
    pub end_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantCompletedPayload {
    pub user_id: String,
    pub username: String,
    pub solve_time: u64,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedResultDto {
    pub user_id: String,
    pub username: String,
    pub score: u32,
    pub completed: bool,
    pub solve_time: Option<u64>,
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChallengeEndedPayload {
    pub results: Vec<RankedResultDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayloadDto {
    pub user_id: String,
    pub username: String,
    pub text: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ChallengeServerMessage {
    Init(ChallengeInitPayload),
    ParticipantJoined(UserJoinedPayload),
    ParticipantLeft(UserLeftPayload),
    ParticipantReady(ParticipantReadyPayload),
    Countdown(CountdownPayload),
    ChallengeStarted(ChallengeStartedPayload),
    ParticipantCompleted(ParticipantCompletedPayload),
    ChallengeEnded(ChallengeEndedPayload),
    Chat(ChatPayloadDto),
}
