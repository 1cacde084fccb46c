//! Server state shared by every handler.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use voltroom_shared::time::Clock;

use crate::{
    config::{ChallengeSettings, RuntimeSettings},
    domain::RoomKey,
    infrastructure::message_pusher::WebSocketMessagePusher,
    runtime::{RoomDirectory, Scheduler},
    usecase::{ChallengeRoom, DocumentRoom},
};

/// Shared application state
pub struct AppState {
    /// 回路の共同編集ルーム（circuit id ごとに 1 アクター）
    pub documents: RoomDirectory<DocumentRoom>,
    /// チャレンジルーム（session id ごとに 1 アクター）
    pub challenges: RoomDirectory<ChallengeRoom>,
    shutdown: CancellationToken,
}

impl AppState {
    /// Wire both room directories. Every room gets its own `MessagePusher`.
    pub fn new(
        challenge_settings: ChallengeSettings,
        runtime_settings: RuntimeSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let shutdown = CancellationToken::new();

        let document_clock = Arc::clone(&clock);
        let documents = RoomDirectory::new(
            Arc::new(move |key: RoomKey, _scheduler: Scheduler| {
                DocumentRoom::new(
                    key,
                    Box::new(WebSocketMessagePusher::new()),
                    Arc::clone(&document_clock),
                )
            }),
            runtime_settings.clone(),
            shutdown.child_token(),
        );

        let challenges = RoomDirectory::new(
            Arc::new(move |key: RoomKey, scheduler: Scheduler| {
                ChallengeRoom::new(
                    key,
                    challenge_settings.clone(),
                    Box::new(WebSocketMessagePusher::new()),
                    Arc::clone(&clock),
                    scheduler,
                )
            }),
            runtime_settings,
            shutdown.child_token(),
        );

        Self {
            documents,
            challenges,
            shutdown,
        }
    }

    /// Stop every room actor.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
