//! Fire-and-forget notification abstraction.
//!
//! Engine operations emit [`NotifyEvent`]s after their state transition
//! commits. Dispatch is always best-effort: a failed notification is
//! logged and never rolls back or fails the triggering operation.
//!
//! The event enum is serializable so the api backend can forward events
//! to the bot backend over HTTP unchanged.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::NotifyError;

/// Everything the bot backend can tell users or admins about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifyEvent {
    /// Tell the admins a withdrawal entered the pending queue.
    WithdrawalRequested {
        username: String,
        user_id: i64,
        withdrawal_id: i64,
        amount: i64,
    },
    /// Tell the user their payout was approved.
    WithdrawalApproved { telegram_id: i64, amount: i64 },
    /// Tell the user their request was rejected, and why.
    WithdrawalRejected {
        telegram_id: i64,
        amount: i64,
        reason: String,
    },
    /// Tell a referrer one of their referrals earned them a bonus.
    ReferralBonus {
        telegram_id: i64,
        referral_name: String,
        earnings: i64,
        task_title: String,
    },
    /// Broadcast a newly published task to all users.
    NewTask {
        title: String,
        reward: i64,
        kind: String,
    },
}

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, event: NotifyEvent) -> Result<(), NotifyError>;
}

/// Notifier that drops everything. Default for tools and tests that do not
/// assert on notifications.
#[derive(Debug, Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, event: NotifyEvent) -> Result<(), NotifyError> {
        debug!(?event, "notification dropped (null notifier)");
        Ok(())
    }
}

/// Notifier that records events for test assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotifyEvent>>,
    fail: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<NotifyEvent> {
        std::mem::take(&mut self.events.lock())
    }

    /// Make every subsequent dispatch fail, to exercise the best-effort
    /// paths.
    pub fn set_failing(&self, failing: bool) {
        *self.fail.lock() = failing;
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: NotifyEvent) -> Result<(), NotifyError> {
        if *self.fail.lock() {
            return Err(NotifyError::Send("recording notifier set to fail".into()));
        }
        self.events.lock().push(event);
        Ok(())
    }
}
