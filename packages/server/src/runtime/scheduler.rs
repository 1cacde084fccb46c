//! Cancellable timers that re-enter a room through its mailbox.
//!
//! A timer never touches room state itself. When it fires it posts a
//! `RoomCommand::Timer` onto the room's queue, so the room handles it in
//! order with every other command.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;

use super::messages::{RoomCommand, TimerEvent};

/// Cancels one scheduled timer.
#[derive(Debug, Clone)]
pub struct TimerToken(CancellationToken);

impl TimerToken {
    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// Per-room timer factory.
///
/// Holds only a weak reference to the mailbox so pending timers never keep a
/// room alive. Dropping the scheduler cancels every timer it issued.
#[derive(Debug)]
pub struct Scheduler {
    mailbox: mpsc::WeakSender<RoomCommand>,
    root: CancellationToken,
}

impl Scheduler {
    pub fn new(mailbox: mpsc::WeakSender<RoomCommand>) -> Self {
        Self {
            mailbox,
            root: CancellationToken::new(),
        }
    }

    /// Post `event` once after `delay`.
    pub fn after(&self, delay: Duration, event: TimerEvent) -> TimerToken {
        let token = self.root.child_token();
        let cancelled = token.clone();
        let mailbox = self.mailbox.clone();

        tokio::spawn(async move {
            tokio::select! {
                () = cancelled.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    post(&mailbox, event).await;
                }
            }
        });

        TimerToken(token)
    }

    /// Post `event` every `period`, the first time one `period` from now.
    pub fn every(&self, period: Duration, event: TimerEvent) -> TimerToken {
        let token = self.root.child_token();
        let cancelled = token.clone();
        let mailbox = self.mailbox.clone();

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    biased;
                    () = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        if !post(&mailbox, event).await {
                            break;
                        }
                    }
                }
            }
        });

        TimerToken(token)
    }

    pub fn cancel(&self, token: &TimerToken) {
        token.cancel();
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

/// Returns `false` once the room is gone.
async fn post(mailbox: &mpsc::WeakSender<RoomCommand>, event: TimerEvent) -> bool {
    match mailbox.upgrade() {
        Some(sender) => sender.send(RoomCommand::Timer(event)).await.is_ok(),
        None => false,
    }
}
