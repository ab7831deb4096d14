//! Channel-membership verification abstraction.
//!
//! The engine never talks to Telegram directly; it asks a
//! [`MembershipVerifier`] whether a user is currently a member of a
//! channel. Production implementations live in the api crate (HTTP call to
//! the bot backend) and the bot crate (direct getChatMember). Errors and
//! timeouts are surfaced as errors here — the *caller* decides what a
//! failed check means (task verification fails closed, withdrawal
//! re-verification fails toward claw-back).

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::VerifierError;

#[async_trait]
pub trait MembershipVerifier: Send + Sync + 'static {
    /// Is this Telegram user currently a member of the channel?
    ///
    /// `channel` is the handle without the leading `@`.
    async fn is_channel_member(
        &self,
        telegram_id: i64,
        channel: &str,
    ) -> Result<bool, VerifierError>;
}

/// Scripted verifier for tests.
///
/// Membership is an explicit set; calls consume queued failures first, so
/// outage behavior (timeouts during re-verification) can be pinned in
/// tests.
#[derive(Debug, Default)]
pub struct MockVerifier {
    members: Mutex<HashSet<(i64, String)>>,
    queued_failures: Mutex<Vec<VerifierError>>,
}

impl MockVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the user as a member (or not) of the channel.
    pub fn set_member(&self, telegram_id: i64, channel: &str, member: bool) {
        let key = (telegram_id, channel.to_string());
        let mut members = self.members.lock();
        if member {
            members.insert(key);
        } else {
            members.remove(&key);
        }
    }

    /// Queue an error to be returned by the next call, regardless of the
    /// membership set. Queued errors are consumed FIFO.
    pub fn fail_next(&self, err: VerifierError) {
        self.queued_failures.lock().push(err);
    }
}

#[async_trait]
impl MembershipVerifier for MockVerifier {
    async fn is_channel_member(
        &self,
        telegram_id: i64,
        channel: &str,
    ) -> Result<bool, VerifierError> {
        {
            let mut failures = self.queued_failures.lock();
            if !failures.is_empty() {
                return Err(failures.remove(0));
            }
        }
        Ok(self
            .members
            .lock()
            .contains(&(telegram_id, channel.to_string())))
    }
}
