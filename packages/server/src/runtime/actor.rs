//! Room actor: one tokio task and one bounded mailbox per room.
//!
//! Every mutation of a room (joins, leaves, inbound frames, timer events)
//! arrives as a `RoomCommand` and is applied in arrival order by the
//! actor's loop, so room state needs no locks.

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{Instant, interval_at},
};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::{
    directory::RoomFactory,
    messages::{JoinRequest, RoomCommand},
    scheduler::Scheduler,
};
use crate::{
    config::RuntimeSettings,
    domain::{ConnectionId, RoomError, RoomKey},
    infrastructure::dto::http::RoomSnapshot,
    usecase::RoomBehavior,
};

pub const MAILBOX_BUFFER: usize = 256;

/// Cloneable address of a running room actor.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    key: RoomKey,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn key(&self) -> &RoomKey {
        &self.key
    }

    /// `true` once the actor has stopped accepting commands.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Ask the room to admit a connection and wait for its verdict.
    pub async fn join(&self, request: JoinRequest) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Join {
                request,
                respond_to: tx,
            })
            .await
            .map_err(|_| RoomError::RoomClosed)?;

        rx.await.map_err(|_| RoomError::RoomClosed)?
    }

    pub async fn leave(&self, handle: ConnectionId) {
        if self.sender.send(RoomCommand::Leave { handle }).await.is_err() {
            tracing::debug!(room_key = %self.key, connection_id = %handle, "Leave after room closed");
        }
    }

    pub async fn deliver(&self, handle: ConnectionId, text: String) {
        if self
            .sender
            .send(RoomCommand::Deliver { handle, text })
            .await
            .is_err()
        {
            tracing::debug!(room_key = %self.key, connection_id = %handle, "Frame dropped, room closed");
        }
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Snapshot { respond_to: tx })
            .await
            .map_err(|_| RoomError::RoomClosed)?;

        rx.await.map_err(|_| RoomError::RoomClosed)
    }

    pub async fn start(&self) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Start { respond_to: tx })
            .await
            .map_err(|_| RoomError::RoomClosed)?;

        rx.await.map_err(|_| RoomError::RoomClosed)?
    }
}

/// The task side of a room: owns the `RoomBehavior` and drains the mailbox.
pub struct RoomActor<B> {
    key: RoomKey,
    room: B,
    receiver: mpsc::Receiver<RoomCommand>,
    cancel_token: CancellationToken,
    settings: RuntimeSettings,
    /// When the room last became empty. `None` while occupied.
    empty_since: Option<Instant>,
}

impl<B: RoomBehavior> RoomActor<B> {
    /// Build the room with `factory` and start its task.
    pub fn spawn(
        key: RoomKey,
        factory: &RoomFactory<B>,
        cancel_token: CancellationToken,
        settings: RuntimeSettings,
    ) -> (RoomHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(MAILBOX_BUFFER);
        let scheduler = Scheduler::new(sender.downgrade());
        let room = factory(key.clone(), scheduler);

        let actor = Self {
            key: key.clone(),
            room,
            receiver,
            cancel_token,
            settings,
            empty_since: Some(Instant::now()),
        };
        let task = tokio::spawn(actor.run());

        (RoomHandle { key, sender }, task)
    }

    #[instrument(skip_all, name = "room", fields(room_key = %self.key, kind = ?B::KIND))]
    async fn run(mut self) {
        tracing::info!("Room actor started");

        let period = self.settings.idle_check_interval;
        let mut idle_check = interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    tracing::info!("Room actor received cancellation signal");
                    break;
                }

                _ = idle_check.tick() => {
                    self.prune_disconnected().await;
                    if self.idle_expired() {
                        tracing::info!("Room idle for {:?}, closing", self.settings.idle_timeout);
                        break;
                    }
                }

                command = self.receiver.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => break,
                    }
                }
            }
        }

        self.close_mailbox();
        tracing::info!(
            participants = self.room.participant_count(),
            "Room actor stopped"
        );
    }

    async fn handle_command(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Join {
                request,
                respond_to,
            } => {
                let handle = request.handle;
                let result = self.room.join(request).await;
                let joined = result.is_ok();
                if respond_to.send(result).is_err() && joined {
                    // the caller went away before it could start the session
                    self.room.leave(handle).await;
                }
            }
            RoomCommand::Leave { handle } => self.room.leave(handle).await,
            RoomCommand::Deliver { handle, text } => self.room.handle_message(handle, &text).await,
            RoomCommand::Timer(event) => self.room.on_timer(event).await,
            RoomCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.room.snapshot());
            }
            RoomCommand::Start { respond_to } => {
                let result = self.room.start().await;
                let _ = respond_to.send(result);
            }
        }

        self.track_occupancy();
    }

    /// Leave every participant whose session ended without a `Leave`, e.g. a
    /// join whose reply was already sent when the caller was dropped.
    async fn prune_disconnected(&mut self) {
        let disconnected = self.room.disconnected();
        if disconnected.is_empty() {
            return;
        }
        for handle in disconnected {
            tracing::info!(connection_id = %handle, "Pruning disconnected participant");
            self.room.leave(handle).await;
        }
        self.track_occupancy();
    }

    fn track_occupancy(&mut self) {
        if self.room.participant_count() > 0 {
            self.empty_since = None;
        } else if self.empty_since.is_none() {
            self.empty_since = Some(Instant::now());
        }
    }

    fn idle_expired(&self) -> bool {
        self.empty_since
            .is_some_and(|since| since.elapsed() >= self.settings.idle_timeout)
    }

    /// Refuse new commands and answer everything still queued with `RoomClosed`.
    fn close_mailbox(&mut self) {
        self.receiver.close();
        while let Ok(command) = self.receiver.try_recv() {
            match command {
                RoomCommand::Join { respond_to, .. } | RoomCommand::Start { respond_to } => {
                    let _ = respond_to.send(Err(RoomError::RoomClosed));
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use serde_json::Value;
    use voltroom_shared::time::FixedClock;

    use super::*;
    use crate::{
        config::ChallengeSettings,
        domain::{DisplayName, UserId},
        infrastructure::message_pusher::WebSocketMessagePusher,
        usecase::{ChallengeRoom, DocumentRoom},
    };

    fn document_factory() -> RoomFactory<DocumentRoom> {
        Arc::new(|key: RoomKey, _scheduler: Scheduler| {
            DocumentRoom::new(
                key,
                Box::new(WebSocketMessagePusher::new()),
                Arc::new(FixedClock::new(0)),
            )
        })
    }

    fn challenge_factory() -> RoomFactory<ChallengeRoom> {
        Arc::new(|key: RoomKey, scheduler: Scheduler| {
            ChallengeRoom::new(
                key,
                ChallengeSettings::default(),
                Box::new(WebSocketMessagePusher::new()),
                Arc::new(FixedClock::new(1_000)),
                scheduler,
            )
        })
    }

    fn key(value: &str) -> RoomKey {
        RoomKey::new(value.to_string()).unwrap()
    }

    fn join_request(name: &str) -> (JoinRequest, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let request = JoinRequest {
            handle: ConnectionId::generate(),
            user_id: UserId::new(name.to_string()).unwrap(),
            display_name: DisplayName::new(name.to_string()).unwrap(),
            challenge_id: None,
            sender: tx,
        };
        (request, rx)
    }

    /// Receive frames until one of `kind` arrives.
    async fn next_of_type(rx: &mut mpsc::UnboundedReceiver<String>, kind: &str) -> Value {
        loop {
            let text = rx.recv().await.unwrap();
            let message: Value = serde_json::from_str(&text).unwrap();
            if message["type"] == kind {
                return message;
            }
        }
    }

    #[tokio::test]
    async fn test_commands_are_applied_in_order() {
        // テスト項目: ハンドル経由のコマンドが到着順に適用される
        // given (前提条件):
        let (handle, _task) = RoomActor::spawn(
            key("circuit-a"),
            &document_factory(),
            CancellationToken::new(),
            RuntimeSettings::default(),
        );
        let (request, mut rx) = join_request("alice");
        let connection = request.handle;
        handle.join(request).await.unwrap();

        // when (操作):
        handle
            .deliver(
                connection,
                r#"{"type":"add_component","data":{"id":"c1"}}"#.to_string(),
            )
            .await;
        handle
            .deliver(
                connection,
                r#"{"type":"remove_component","data":{"id":"c1"}}"#.to_string(),
            )
            .await;
        let snapshot = handle.snapshot().await.unwrap();

        // then (期待する結果):
        match snapshot {
            RoomSnapshot::Document(snapshot) => {
                assert_eq!(snapshot.version, 2);
                assert_eq!(snapshot.component_count, 0);
                assert_eq!(snapshot.participant_count, 1);
            }
            other => panic!("unexpected snapshot: {other:?}"),
        }
        let removed = next_of_type(&mut rx, "component_removed").await;
        assert_eq!(removed["data"]["version"], 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_room_closes_itself() {
        // テスト項目: 参加者のいない状態が続くとアクターが終了し、以降の参加は RoomClosed
        // given (前提条件):
        let settings = RuntimeSettings {
            idle_timeout: Duration::from_secs(10),
            idle_check_interval: Duration::from_secs(1),
        };
        let (handle, task) = RoomActor::spawn(
            key("circuit-idle"),
            &document_factory(),
            CancellationToken::new(),
            settings,
        );
        let (request, _rx) = join_request("alice");
        let connection = request.handle;
        handle.join(request).await.unwrap();
        handle.leave(connection).await;
        let left_at = Instant::now();

        // when (操作):
        task.await.unwrap();

        // then (期待する結果):
        assert!(left_at.elapsed() >= Duration::from_secs(10));
        assert!(left_at.elapsed() <= Duration::from_secs(11));
        assert!(handle.is_closed());
        let (late, _late_rx) = join_request("bob");
        assert_eq!(handle.join(late).await, Err(RoomError::RoomClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_occupied_room_is_not_reaped() {
        // テスト項目: 参加者がいる間は idle_timeout を過ぎても終了しない
        // given (前提条件):
        let settings = RuntimeSettings {
            idle_timeout: Duration::from_secs(10),
            idle_check_interval: Duration::from_secs(1),
        };
        let (handle, task) = RoomActor::spawn(
            key("circuit-busy"),
            &document_factory(),
            CancellationToken::new(),
            settings,
        );
        let (request, _rx) = join_request("alice");
        handle.join(request).await.unwrap();

        // when (操作):
        tokio::time::sleep(Duration::from_secs(60)).await;

        // then (期待する結果):
        assert!(!task.is_finished());
        assert_eq!(handle.snapshot().await.unwrap().participant_count(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_stops_actor() {
        // テスト項目: キャンセルトークンでアクターが停止する
        // given (前提条件):
        let cancel_token = CancellationToken::new();
        let (handle, task) = RoomActor::spawn(
            key("circuit-cancel"),
            &document_factory(),
            cancel_token.child_token(),
            RuntimeSettings::default(),
        );

        // when (操作):
        cancel_token.cancel();
        task.await.unwrap();

        // then (期待する結果):
        assert!(handle.is_closed());
        assert_eq!(handle.start().await, Err(RoomError::RoomClosed));
    }

    #[tokio::test]
    async fn test_join_abandoned_by_caller_is_rolled_back() {
        // テスト項目: 応答を待たずに呼び出し側が去った参加は取り消される
        // given (前提条件):
        let (handle, _task) = RoomActor::spawn(
            key("circuit-abandon"),
            &document_factory(),
            CancellationToken::new(),
            RuntimeSettings::default(),
        );
        let (request, _rx) = join_request("alice");
        let (tx, rx) = oneshot::channel();
        drop(rx);

        // when (操作):
        handle
            .sender
            .send(RoomCommand::Join {
                request,
                respond_to: tx,
            })
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(handle.snapshot().await.unwrap().participant_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_participant_with_dropped_channel_is_pruned() {
        // テスト項目: 応答受信前に呼び出し側が消えた参加者は、次の定期チェックで退出扱いになる
        // given (前提条件):
        let settings = RuntimeSettings {
            idle_timeout: Duration::from_secs(60),
            idle_check_interval: Duration::from_secs(1),
        };
        let (handle, _task) = RoomActor::spawn(
            key("circuit-ghost"),
            &document_factory(),
            CancellationToken::new(),
            settings,
        );
        let (alice, mut alice_rx) = join_request("alice");
        handle.join(alice).await.unwrap();
        let (ghost, ghost_rx) = join_request("ghost");
        handle.join(ghost).await.unwrap();
        assert_eq!(handle.snapshot().await.unwrap().participant_count(), 2);

        // when (操作):
        drop(ghost_rx);
        tokio::time::sleep(Duration::from_secs(2)).await;

        // then (期待する結果):
        assert_eq!(handle.snapshot().await.unwrap().participant_count(), 1);
        let left = next_of_type(&mut alice_rx, "user_left").await;
        assert_eq!(left["data"]["userId"], "ghost");
    }

    #[tokio::test(start_paused = true)]
    async fn test_challenge_round_through_actor() {
        // テスト項目: アクター経由でもタイマーがメールボックスに戻り、ラウンドが完走する
        // given (前提条件):
        let (handle, _task) = RoomActor::spawn(
            key("session-e2e"),
            &challenge_factory(),
            CancellationToken::new(),
            RuntimeSettings::default(),
        );
        let (alice, mut alice_rx) = join_request("alice");
        let (bob, mut bob_rx) = join_request("bob");
        let (alice_id, bob_id) = (alice.handle, bob.handle);
        handle.join(alice).await.unwrap();
        handle.join(bob).await.unwrap();
        let ready = r#"{"type":"ready","data":{"ready":true}}"#;

        // when (操作):
        handle.deliver(alice_id, ready.to_string()).await;
        handle.deliver(bob_id, ready.to_string()).await;

        // then (期待する結果):
        for expected in [3, 2, 1] {
            let countdown = next_of_type(&mut bob_rx, "countdown").await;
            assert_eq!(countdown["data"]["seconds"], expected);
        }
        let started = next_of_type(&mut bob_rx, "challenge_started").await;
        assert_eq!(started["data"]["startTime"], 1_000);
        assert_eq!(started["data"]["endTime"], 301_000);

        tokio::time::sleep(Duration::from_secs(10)).await;
        handle
            .deliver(
                alice_id,
                r#"{"type":"submit_solution","data":{"passed":true}}"#.to_string(),
            )
            .await;
        let completed = next_of_type(&mut bob_rx, "participant_completed").await;
        assert_eq!(completed["data"]["solveTime"], 10_000);

        tokio::time::sleep(Duration::from_secs(10)).await;
        handle
            .deliver(
                bob_id,
                r#"{"type":"submit_solution","data":{"passed":true}}"#.to_string(),
            )
            .await;
        let ended = next_of_type(&mut alice_rx, "challenge_ended").await;
        let results = ended["data"]["results"].as_array().unwrap();
        assert_eq!(results[0]["userId"], "alice");
        assert_eq!(results[0]["rank"], 1);
        assert_eq!(results[1]["userId"], "bob");
        assert_eq!(results[1]["rank"], 2);
        assert_eq!(results[1]["solveTime"], 20_000);
    }
}
