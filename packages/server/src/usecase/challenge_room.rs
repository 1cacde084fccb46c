//! UseCase: 対戦チャレンジルーム
//!
//! waiting → countdown → active → finished の状態機械を進め、
//! カウントダウンと制限時間のタイマーを Scheduler 経由で管理します。
//! タイマーは必ずルームのメールボックスを経由して戻ってくるため、
//! 状態を変更するのは常にルーム自身です。

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::Instant;
use voltroom_shared::time::Clock;

use super::room::{RoomBehavior, broadcast, send_to};
use crate::{
    config::ChallengeSettings,
    domain::{
        ChallengeParticipant, ChallengeProgress, ChallengeRuntimeState, ChallengeStatus,
        ConnectionId, ConnectionRegistry, MessagePusher, Participant, RoomError, RoomKey,
        Timestamp, challenge::DEFAULT_PASSING_SCORE, rank_participants,
    },
    infrastructure::dto::{
        conversion::{challenge_room_state, challenge_snapshot},
        http::{RoomKind, RoomSnapshot},
        websocket::{
            ChallengeClientMessage, ChallengeEndedPayload, ChallengeInitPayload,
            ChallengeServerMessage, ChallengeStartedPayload, ChatPayloadDto, CountdownPayload,
            ParticipantCompletedPayload, ParticipantReadyPayload, UserJoinedPayload,
            UserLeftPayload,
        },
    },
    runtime::{
        messages::{JoinRequest, TimerEvent},
        scheduler::{Scheduler, TimerToken},
    },
};

/// Running countdown: the next value to broadcast and its ticker.
#[derive(Debug)]
struct Countdown {
    remaining: u32,
    ticker: TimerToken,
}

/// Timed competitive round for one challenge session.
pub struct ChallengeRoom {
    key: RoomKey,
    state: ChallengeRuntimeState,
    registry: ConnectionRegistry<ChallengeProgress>,
    /// Set by the first join that carries one, immutable afterwards.
    challenge_id: Option<String>,
    settings: ChallengeSettings,
    pusher: Box<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
    scheduler: Scheduler,
    countdown: Option<Countdown>,
    time_limit: Option<TimerToken>,
    started_at: Option<Instant>,
}

impl ChallengeRoom {
    pub fn new(
        key: RoomKey,
        settings: ChallengeSettings,
        pusher: Box<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            key,
            state: ChallengeRuntimeState::new(
                settings.max_participants,
                settings.time_limit_seconds,
            ),
            registry: ConnectionRegistry::with_capacity(settings.max_participants),
            challenge_id: None,
            settings,
            pusher,
            clock,
            scheduler,
            countdown: None,
            time_limit: None,
            started_at: None,
        }
    }

    pub fn status(&self) -> ChallengeStatus {
        self.state.status()
    }

    pub fn state(&self) -> &ChallengeRuntimeState {
        &self.state
    }

    pub fn challenge_id(&self) -> Option<&str> {
        self.challenge_id.as_deref()
    }

    pub fn participants(&self) -> &[ChallengeParticipant] {
        self.registry.list()
    }

    fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }

    async fn send(&self, handle: &ConnectionId, message: &ChallengeServerMessage) {
        send_to(self.pusher.as_ref(), handle, message).await;
    }

    async fn broadcast(&self, message: &ChallengeServerMessage, exclude: Option<ConnectionId>) {
        broadcast(self.pusher.as_ref(), message, exclude).await;
    }

    /// At least two participants and every one of them ready.
    fn quorum_reached(&self) -> bool {
        let participants = self.registry.list();
        participants.len() >= 2 && participants.iter().all(|p| p.state.ready)
    }

    fn all_completed(&self) -> bool {
        let participants = self.registry.list();
        !participants.is_empty() && participants.iter().all(|p| p.state.completed)
    }

    /// Record the sender's readiness and start the countdown on quorum.
    pub async fn set_ready(&mut self, handle: ConnectionId, ready: bool) {
        let Some(participant) = self.registry.get_mut(&handle) else {
            return;
        };
        participant.state.ready = ready;
        let message = ChallengeServerMessage::ParticipantReady(ParticipantReadyPayload {
            user_id: participant.user_id.as_str().to_string(),
            ready,
        });
        self.broadcast(&message, None).await;

        if self.state.status() == ChallengeStatus::Waiting && self.quorum_reached() {
            self.begin_countdown();
        }
    }

    fn begin_countdown(&mut self) -> bool {
        if !self.state.begin_countdown() {
            return false;
        }
        let ticker = self
            .scheduler
            .every(self.settings.tick_interval, TimerEvent::CountdownTick);
        self.countdown = Some(Countdown {
            remaining: self.settings.countdown_seconds,
            ticker,
        });
        tracing::info!(
            room_key = %self.key,
            "Countdown started with {} participants",
            self.registry.len()
        );
        true
    }

    async fn on_countdown_tick(&mut self) {
        if self.state.status() != ChallengeStatus::Countdown {
            return;
        }
        let Some(countdown) = self.countdown.as_mut() else {
            return;
        };

        if countdown.remaining > 0 {
            let seconds = countdown.remaining;
            countdown.remaining -= 1;
            let message = ChallengeServerMessage::Countdown(CountdownPayload { seconds });
            self.broadcast(&message, None).await;
            return;
        }

        if let Some(countdown) = self.countdown.take() {
            self.scheduler.cancel(&countdown.ticker);
        }
        self.activate().await;
    }

    async fn activate(&mut self) {
        let now = self.now();
        let Some((start_time, end_time)) = self.state.activate(now) else {
            return;
        };
        self.started_at = Some(Instant::now());
        self.time_limit = Some(self.scheduler.after(
            Duration::from_secs(self.settings.time_limit_seconds),
            TimerEvent::TimeLimitExpired,
        ));
        tracing::info!(room_key = %self.key, "Challenge round is active");

        let message = ChallengeServerMessage::ChallengeStarted(ChallengeStartedPayload {
            start_time: start_time.value(),
            end_time: end_time.value(),
        });
        self.broadcast(&message, None).await;
    }

    /// Record a solution. Only passing first submissions during `active` count.
    pub async fn submit_solution(
        &mut self,
        handle: ConnectionId,
        passed: bool,
        score: Option<f64>,
    ) {
        if self.state.status() != ChallengeStatus::Active || !passed {
            return;
        }
        let solve_time = self
            .started_at
            .map(|started| u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        let Some(participant) = self.registry.get_mut(&handle) else {
            return;
        };
        if participant.state.completed {
            return;
        }
        let score = normalize_score(score);
        participant.state.completed = true;
        participant.state.solve_time_millis = Some(solve_time);
        participant.state.score = score;

        tracing::info!(
            room_key = %self.key,
            connection_id = %handle,
            "User '{}' completed in {} ms",
            participant.user_id.as_str(),
            solve_time
        );
        let message = ChallengeServerMessage::ParticipantCompleted(ParticipantCompletedPayload {
            user_id: participant.user_id.as_str().to_string(),
            username: participant.display_name.as_str().to_string(),
            solve_time,
            score,
        });
        self.broadcast(&message, None).await;

        if self.all_completed() {
            self.finish().await;
        }
    }

    /// Relay a chat line to everyone, sender included. Allowed in any state.
    pub async fn chat(&self, handle: ConnectionId, text: String) {
        let Some(participant) = self.registry.get(&handle) else {
            return;
        };
        let message = ChallengeServerMessage::Chat(ChatPayloadDto {
            user_id: participant.user_id.as_str().to_string(),
            username: participant.display_name.as_str().to_string(),
            text,
            timestamp: self.clock.now_millis(),
        });
        self.broadcast(&message, None).await;
    }

    async fn finish(&mut self) {
        if !self.state.finish() {
            return;
        }
        if let Some(timer) = self.time_limit.take() {
            self.scheduler.cancel(&timer);
        }

        let results = rank_participants(self.registry.list())
            .into_iter()
            .map(Into::into)
            .collect();
        tracing::info!(room_key = %self.key, "Challenge round finished");
        let message = ChallengeServerMessage::ChallengeEnded(ChallengeEndedPayload { results });
        self.broadcast(&message, None).await;
    }

    fn cancel_timers(&mut self) {
        if let Some(countdown) = self.countdown.take() {
            self.scheduler.cancel(&countdown.ticker);
        }
        if let Some(timer) = self.time_limit.take() {
            self.scheduler.cancel(&timer);
        }
    }
}

/// Missing scores default to full marks; others are clamped to `>= 0` and rounded.
fn normalize_score(score: Option<f64>) -> u32 {
    match score {
        Some(score) if score.is_finite() => score.max(0.0).round() as u32,
        _ => DEFAULT_PASSING_SCORE,
    }
}

#[async_trait]
impl RoomBehavior for ChallengeRoom {
    const KIND: RoomKind = RoomKind::Challenge;

    async fn join(&mut self, request: JoinRequest) -> Result<(), RoomError> {
        let JoinRequest {
            handle,
            user_id,
            display_name,
            challenge_id,
            sender,
        } = request;
        let participant = Participant::new(handle, user_id, display_name);
        let joined: UserJoinedPayload = self.registry.join(participant)?.into();
        self.pusher.register_client(handle, sender).await;

        if self.challenge_id.is_none() {
            self.challenge_id = challenge_id.filter(|id| !id.trim().is_empty());
        }

        let init = ChallengeServerMessage::Init(ChallengeInitPayload {
            room_state: challenge_room_state(&self.state, self.challenge_id.as_deref()),
            participants: self.registry.list().iter().map(Into::into).collect(),
        });
        self.send(&handle, &init).await;

        tracing::info!(
            room_key = %self.key,
            connection_id = %handle,
            "User '{}' joined challenge room ({}/{})",
            joined.user_id,
            self.registry.len(),
            self.settings.max_participants
        );
        self.broadcast(&ChallengeServerMessage::ParticipantJoined(joined), Some(handle))
            .await;
        Ok(())
    }

    async fn leave(&mut self, handle: ConnectionId) {
        let Some(participant) = self.registry.leave(&handle) else {
            return;
        };
        self.pusher.unregister_client(&handle).await;
        tracing::info!(
            room_key = %self.key,
            connection_id = %handle,
            "User '{}' left challenge room ({} remaining)",
            participant.user_id.as_str(),
            self.registry.len()
        );

        let message = ChallengeServerMessage::ParticipantLeft(UserLeftPayload {
            user_id: participant.user_id.into_string(),
        });
        self.broadcast(&message, None).await;

        match self.state.status() {
            ChallengeStatus::Waiting if self.registry.is_empty() => {
                self.cancel_timers();
                self.state.reset();
                self.started_at = None;
                tracing::debug!(room_key = %self.key, "Empty waiting room reset");
            }
            // everyone still here has already finished
            ChallengeStatus::Active if self.all_completed() => self.finish().await,
            _ => {}
        }
    }

    async fn handle_message(&mut self, handle: ConnectionId, text: &str) {
        let message = match ChallengeClientMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(room_key = %self.key, connection_id = %handle, "Dropping malformed message: {}", e);
                return;
            }
        };

        match message {
            ChallengeClientMessage::Ready { ready } => self.set_ready(handle, ready).await,
            ChallengeClientMessage::SubmitSolution { passed, score } => {
                self.submit_solution(handle, passed, score).await
            }
            ChallengeClientMessage::Chat { message } => self.chat(handle, message).await,
        }
    }

    async fn on_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::CountdownTick => self.on_countdown_tick().await,
            TimerEvent::TimeLimitExpired => {
                if self.state.status() == ChallengeStatus::Active {
                    tracing::info!(room_key = %self.key, "Time limit reached");
                    self.time_limit = None;
                    self.finish().await;
                }
            }
        }
    }

    async fn start(&mut self) -> Result<(), RoomError> {
        if self.begin_countdown() {
            Ok(())
        } else {
            Err(RoomError::AlreadyStarted)
        }
    }

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot::Challenge(challenge_snapshot(
            &self.key,
            &self.state,
            self.challenge_id.as_deref(),
            self.registry.list(),
        ))
    }

    fn participant_count(&self) -> usize {
        self.registry.len()
    }

    fn disconnected(&self) -> Vec<ConnectionId> {
        self.pusher.disconnected()
    }
}
