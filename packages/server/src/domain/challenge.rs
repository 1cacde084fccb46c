//! Challenge round state machine and final ranking.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::{
    participant::Participant,
    value_object::{DisplayName, Timestamp, UserId},
};

pub const DEFAULT_MAX_PARTICIPANTS: usize = 10;
pub const DEFAULT_TIME_LIMIT_SECONDS: u64 = 300;
/// Score credited to a passing submission that does not report one.
pub const DEFAULT_PASSING_SCORE: u32 = 100;

/// Phase of a challenge round. Transitions only move forward, except for the
/// reset to `Waiting` when a waiting room empties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Waiting,
    Countdown,
    Active,
    Finished,
}

/// Per-participant progress inside a challenge room.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChallengeProgress {
    pub ready: bool,
    pub score: u32,
    pub completed: bool,
    pub solve_time_millis: Option<u64>,
}

pub type ChallengeParticipant = Participant<ChallengeProgress>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeRuntimeState {
    status: ChallengeStatus,
    start_time: Option<Timestamp>,
    end_time: Option<Timestamp>,
    max_participants: usize,
    time_limit_seconds: u64,
}

impl ChallengeRuntimeState {
    pub fn new(max_participants: usize, time_limit_seconds: u64) -> Self {
        Self {
            status: ChallengeStatus::Waiting,
            start_time: None,
            end_time: None,
            max_participants,
            time_limit_seconds,
        }
    }

    pub fn status(&self) -> ChallengeStatus {
        self.status
    }

    pub fn start_time(&self) -> Option<Timestamp> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<Timestamp> {
        self.end_time
    }

    pub fn max_participants(&self) -> usize {
        self.max_participants
    }

    pub fn time_limit_seconds(&self) -> u64 {
        self.time_limit_seconds
    }

    /// Return to the initial `waiting` state with no round times.
    pub fn reset(&mut self) {
        self.status = ChallengeStatus::Waiting;
        self.start_time = None;
        self.end_time = None;
    }

    /// `waiting -> countdown`. Returns `false` from any other state.
    pub fn begin_countdown(&mut self) -> bool {
        if self.status != ChallengeStatus::Waiting {
            return false;
        }
        self.status = ChallengeStatus::Countdown;
        true
    }

    /// `countdown -> active`, stamping the round window.
    ///
    /// Returns `(start_time, end_time)`, or `None` when not counting down.
    pub fn activate(&mut self, now: Timestamp) -> Option<(Timestamp, Timestamp)> {
        if self.status != ChallengeStatus::Countdown {
            return None;
        }
        let limit_millis = i64::try_from(self.time_limit_seconds.saturating_mul(1000))
            .unwrap_or(i64::MAX);
        let start = now;
        let end = Timestamp::new(now.value().saturating_add(limit_millis));
        self.status = ChallengeStatus::Active;
        self.start_time = Some(start);
        self.end_time = Some(end);
        Some((start, end))
    }

    /// `active -> finished`. Returns `false` from any other state.
    pub fn finish(&mut self) -> bool {
        if self.status != ChallengeStatus::Active {
            return false;
        }
        self.status = ChallengeStatus::Finished;
        true
    }
}

/// One row of the final standings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedResult {
    pub user_id: UserId,
    pub display_name: DisplayName,
    pub score: u32,
    pub completed: bool,
    pub solve_time_millis: Option<u64>,
    pub rank: usize,
}

/// Order participants into the final standings.
///
/// Completed participants come first, ordered by ascending solve time (a
/// missing solve time sorts last). Remaining ties, and everyone who did not
/// complete, are ordered by descending score. The sort is stable, so full
/// ties keep join order.
pub fn rank_participants(participants: &[ChallengeParticipant]) -> Vec<RankedResult> {
    let mut ordered: Vec<&ChallengeParticipant> = participants.iter().collect();
    ordered.sort_by(|a, b| compare_standing(&a.state, &b.state));

    ordered
        .into_iter()
        .enumerate()
        .map(|(index, participant)| RankedResult {
            user_id: participant.user_id.clone(),
            display_name: participant.display_name.clone(),
            score: participant.state.score,
            completed: participant.state.completed,
            solve_time_millis: participant.state.solve_time_millis,
            rank: index + 1,
        })
        .collect()
}

fn compare_standing(a: &ChallengeProgress, b: &ChallengeProgress) -> Ordering {
    b.completed
        .cmp(&a.completed)
        .then_with(|| {
            if a.completed && b.completed {
                compare_solve_time(a.solve_time_millis, b.solve_time_millis)
            } else {
                Ordering::Equal
            }
        })
        .then_with(|| b.score.cmp(&a.score))
}

fn compare_solve_time(a: Option<u64>, b: Option<u64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
