//! The withdrawal eligibility engine.
//!
//! `request_withdrawal` runs a strict pipeline:
//!
//! ```text
//! validate ──► re-verify subscriptions ──► all active ──► pending row
//!                        │
//!                        └─ any lapsed ──► claw back (atomic) ──► reject
//! ```
//!
//! Channel membership is a standing condition, not a one-time gate: every
//! channel completion the user was credited for is re-checked at request
//! time. Lapsed ones are removed and their rewards clawed back in one
//! atomic store operation, and the request is rejected outright — the user
//! must re-complete the tasks before retrying. A verifier timeout or error
//! during re-verification counts as lapsed (current product behavior;
//! deliberately aggressive on transient outages).
//!
//! No stars move when a pending row is created: the debit is deferred to
//! admin approval, so a rejected request costs the user nothing beyond the
//! claw-back.

use tracing::{info, warn};

use stardrop_common::{EngineError, NotifyEvent, Task, Withdrawal};

use crate::Engine;

impl Engine {
    /// Validate, re-verify, claw back if needed, and create a pending
    /// withdrawal.
    pub async fn request_withdrawal(
        &self,
        user_id: i64,
        amount: i64,
    ) -> Result<Withdrawal, EngineError> {
        // Step 1: validation. Nothing is mutated on any of these failures.
        if amount < self.min_withdrawal {
            return Err(EngineError::Validation(format!(
                "Minimum withdrawal amount is {} stars",
                self.min_withdrawal
            )));
        }
        let user = self.user_by_id(user_id).await?;
        if user.balance < amount {
            return Err(EngineError::Validation("Insufficient balance".into()));
        }
        let Some(username) = user.username.clone() else {
            return Err(EngineError::Validation(
                "Telegram username is required for withdrawal. \
                 Please set your username in Telegram settings."
                    .into(),
            ));
        };

        // Step 2: re-verify every standing channel completion right now.
        let channel_tasks = self.store.completed_channel_tasks(user_id).await?;
        let mut lapsed: Vec<&Task> = Vec::new();
        for task in &channel_tasks {
            let member = match self
                .verifier
                .is_channel_member(user.telegram_id, &task.target)
                .await
            {
                Ok(member) => member,
                Err(e) => {
                    // Counts as lapsed. See module docs.
                    warn!(
                        user_id,
                        task_id = task.id,
                        error = %e,
                        "subscription re-verification failed, treating as lapsed"
                    );
                    false
                }
            };
            if !member {
                lapsed.push(task);
            }
        }

        // Step 3: claw back and reject.
        if !lapsed.is_empty() {
            let task_ids: Vec<i64> = lapsed.iter().map(|t| t.id).collect();
            let total: i64 = lapsed.iter().map(|t| t.reward).sum();
            let clawed_back = self.store.claw_back(user_id, &task_ids, total).await?;
            warn!(
                user_id,
                lapsed = lapsed.len(),
                clawed_back,
                "withdrawal rejected, lapsed subscriptions clawed back"
            );
            return Err(EngineError::SubscriptionsLapsed {
                lapsed: lapsed.len(),
                clawed_back,
            });
        }

        // Step 4: admit into the pending queue. No debit until approval.
        let withdrawal = self.store.create_withdrawal(user_id, amount).await?;
        info!(
            user_id,
            withdrawal_id = withdrawal.id,
            amount,
            "withdrawal request created"
        );

        self.notify_best_effort(NotifyEvent::WithdrawalRequested {
            username,
            user_id,
            withdrawal_id: withdrawal.id,
            amount,
        })
        .await;

        Ok(withdrawal)
    }

    /// The user's withdrawal history, newest first.
    pub async fn withdrawals_for_user(&self, user_id: i64) -> Result<Vec<Withdrawal>, EngineError> {
        Ok(self.store.withdrawals_for_user(user_id).await?)
    }
}
