//! ドメイン層
//!
//! ルームの状態（参加者、共有ドキュメント、チャレンジの状態機械）と
//! 外部へのインターフェース（MessagePusher）を定義します。
//! この層は axum や WebSocket の詳細に依存しません。

pub mod challenge;
pub mod document;
pub mod error;
pub mod message_pusher;
pub mod participant;
pub mod registry;
pub mod value_object;

pub use challenge::{
    ChallengeParticipant, ChallengeProgress, ChallengeRuntimeState, ChallengeStatus, RankedResult,
    rank_participants,
};
pub use document::{Component, Cursor, GraphRecord, SharedDocument, Wire};
pub use error::{RoomError, ValueObjectError};
pub use message_pusher::{MessagePushError, MessagePusher, PusherChannel};
pub use participant::Participant;
pub use registry::ConnectionRegistry;
pub use value_object::{ConnectionId, DisplayName, RoomKey, Timestamp, UserId};
