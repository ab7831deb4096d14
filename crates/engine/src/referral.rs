//! Referral bonus propagation and referral reporting.
//!
//! The bonus is `floor(reward * percent / 100)` of the completed task's
//! reward, credited to the completing user's referrer. Propagation is
//! strictly best-effort: every failure in here is logged and swallowed so
//! the triggering task completion never fails or rolls back because of it.

use tracing::{info, warn};

use stardrop_common::{
    EngineError, ReferralStats, Task, Transaction, TransactionKind, User,
};

use crate::{Engine, LedgerRef};

impl Engine {
    /// Credit the referrer's share for a completed task. Never returns an
    /// error; see module docs.
    pub(crate) async fn propagate_referral_bonus(&self, completing_user: &User, task: &Task) {
        let Some(referrer_id) = completing_user.referrer_id else {
            return;
        };

        let bonus = task.reward * i64::from(self.referral_bonus_percent) / 100;
        if bonus <= 0 {
            info!(
                user_id = completing_user.id,
                task_id = task.id,
                reward = task.reward,
                "referral bonus rounds to zero, skipping"
            );
            return;
        }

        let credit = self
            .ledger
            .credit(
                referrer_id,
                bonus,
                LedgerRef::Referral {
                    task_id: task.id,
                    referral_user_id: completing_user.id,
                },
            )
            .await;
        if let Err(e) = credit {
            warn!(
                referrer_id,
                referral_user_id = completing_user.id,
                task_id = task.id,
                error = %e,
                "referral bonus credit failed"
            );
            return;
        }

        info!(
            referrer_id,
            referral_user_id = completing_user.id,
            task_id = task.id,
            bonus,
            "referral bonus credited"
        );

        if let Ok(Some(referrer)) = self.store.user_by_id(referrer_id).await {
            self.notify_best_effort(stardrop_common::NotifyEvent::ReferralBonus {
                telegram_id: referrer.telegram_id,
                referral_name: completing_user.first_name.clone(),
                earnings: bonus,
                task_title: task.title.clone(),
            })
            .await;
        }
    }

    /// Referral link the user shares; the start parameter is their own
    /// Telegram id.
    pub fn referral_link(&self, telegram_id: i64) -> String {
        format!("https://t.me/{}?start={}", self.bot_username, telegram_id)
    }

    /// Direct referrals plus lifetime referral earnings.
    pub async fn referral_stats(&self, user_id: i64) -> Result<ReferralStats, EngineError> {
        let referrals = self.store.users_referred_by(user_id).await?;
        let total_earnings = self
            .store
            .transactions_for_user(user_id, Some(TransactionKind::Referral))
            .await?
            .iter()
            .map(|tx| tx.amount)
            .sum();
        Ok(ReferralStats {
            total_referrals: referrals.len(),
            referrals,
            total_earnings,
        })
    }

    /// The user's referral-kind transactions, newest first.
    pub async fn referral_transactions(
        &self,
        user_id: i64,
    ) -> Result<Vec<Transaction>, EngineError> {
        Ok(self
            .store
            .transactions_for_user(user_id, Some(TransactionKind::Referral))
            .await?)
    }

    /// The user's full transaction history, newest first.
    pub async fn transaction_history(&self, user_id: i64) -> Result<Vec<Transaction>, EngineError> {
        Ok(self.store.transactions_for_user(user_id, None).await?)
    }
}
