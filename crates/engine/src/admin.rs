//! Admin operations: task management, withdrawal adjudication, platform
//! stats, the referral tree and banner CRUD.
//!
//! Adjudication is exactly-once by construction: the status flip happens
//! through the store's compare-and-set on `pending`, so of two concurrent
//! approvals one loses with `NotPending` and performs no balance mutation.

use std::future::Future;
use std::pin::Pin;

use tracing::{error, info};

use stardrop_common::{
    AdminStats, Banner, BannerPatch, EngineError, NewBanner, NewTask, NotifyEvent, ReferralNode,
    StoreError, Task, TaskPatch, TransactionKind, User, Withdrawal, WithdrawalStatus,
};

use crate::{Engine, LedgerRef};

/// Referral trees deeper than this are truncated; a longer chain in
/// practice means a referrer cycle slipped into the data.
const MAX_TREE_DEPTH: u32 = 10;

impl Engine {
    // ── task management ──────────────────────────────────────────────────

    pub async fn create_task(&self, new: NewTask) -> Result<Task, EngineError> {
        if new.title.trim().is_empty() {
            return Err(EngineError::Validation("Task title is required".into()));
        }
        if new.target.trim().is_empty() {
            return Err(EngineError::Validation("Task target is required".into()));
        }
        if new.reward <= 0 {
            return Err(EngineError::Validation(
                "Task reward must be positive".into(),
            ));
        }
        let task = self.store.create_task(new).await?;
        info!(task_id = task.id, title = %task.title, "task created");

        self.notify_best_effort(NotifyEvent::NewTask {
            title: task.title.clone(),
            reward: task.reward,
            kind: task.kind.as_str().to_string(),
        })
        .await;

        Ok(task)
    }

    pub async fn update_task(&self, task_id: i64, patch: TaskPatch) -> Result<Task, EngineError> {
        if let Some(reward) = patch.reward {
            if reward <= 0 {
                return Err(EngineError::Validation(
                    "Task reward must be positive".into(),
                ));
            }
        }
        match self.store.update_task(task_id, patch).await {
            Ok(task) => {
                info!(task_id, "task updated");
                Ok(task)
            }
            Err(StoreError::NotFound) => Err(EngineError::TaskNotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// One-way flip to inactive. The task stays in the datastore for audit
    /// and claw-back accounting.
    pub async fn close_task(&self, task_id: i64) -> Result<Task, EngineError> {
        match self.store.close_task(task_id).await {
            Ok(task) => {
                info!(task_id, "task closed");
                Ok(task)
            }
            Err(StoreError::NotFound) => Err(EngineError::TaskNotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// All tasks including inactive, newest first.
    pub async fn all_tasks(&self) -> Result<Vec<Task>, EngineError> {
        Ok(self.store.list_tasks(false).await?)
    }

    // ── withdrawal adjudication ──────────────────────────────────────────

    /// Pending withdrawals oldest first, with their requesting users.
    pub async fn pending_withdrawals(&self) -> Result<Vec<(Withdrawal, User)>, EngineError> {
        Ok(self.store.pending_withdrawals().await?)
    }

    /// Approve a pending withdrawal and debit the requested amount.
    pub async fn approve_withdrawal(&self, withdrawal_id: i64) -> Result<Withdrawal, EngineError> {
        let withdrawal = self
            .transition(withdrawal_id, WithdrawalStatus::Approved, None)
            .await?;

        if let Err(e) = self
            .ledger
            .debit(
                withdrawal.user_id,
                withdrawal.amount,
                LedgerRef::Withdrawal(withdrawal.id),
            )
            .await
        {
            // Approved but not debited. Requires operator reconciliation.
            error!(
                withdrawal_id,
                user_id = withdrawal.user_id,
                amount = withdrawal.amount,
                error = %e,
                "withdrawal approved but debit failed"
            );
            return Err(EngineError::LedgerInconsistency(format!(
                "withdrawal {} approved but debit failed: {}",
                withdrawal_id, e
            )));
        }

        info!(
            withdrawal_id,
            user_id = withdrawal.user_id,
            amount = withdrawal.amount,
            "withdrawal approved"
        );

        if let Ok(user) = self.user_by_id(withdrawal.user_id).await {
            self.notify_best_effort(NotifyEvent::WithdrawalApproved {
                telegram_id: user.telegram_id,
                amount: withdrawal.amount,
            })
            .await;
        }

        Ok(withdrawal)
    }

    /// Reject a pending withdrawal with a mandatory reason. No balance
    /// mutation: the stars were never removed.
    pub async fn reject_withdrawal(
        &self,
        withdrawal_id: i64,
        reason: &str,
    ) -> Result<Withdrawal, EngineError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EngineError::Validation(
                "Rejection reason is required".into(),
            ));
        }

        let withdrawal = self
            .transition(
                withdrawal_id,
                WithdrawalStatus::Rejected,
                Some(reason.to_string()),
            )
            .await?;

        info!(withdrawal_id, user_id = withdrawal.user_id, "withdrawal rejected");

        if let Ok(user) = self.user_by_id(withdrawal.user_id).await {
            self.notify_best_effort(NotifyEvent::WithdrawalRejected {
                telegram_id: user.telegram_id,
                amount: withdrawal.amount,
                reason: reason.to_string(),
            })
            .await;
        }

        Ok(withdrawal)
    }

    async fn transition(
        &self,
        withdrawal_id: i64,
        status: WithdrawalStatus,
        reason: Option<String>,
    ) -> Result<Withdrawal, EngineError> {
        match self
            .store
            .transition_withdrawal(withdrawal_id, status, reason)
            .await
        {
            Ok(withdrawal) => Ok(withdrawal),
            Err(StoreError::NotFound) => Err(EngineError::WithdrawalNotFound),
            Err(StoreError::Conflict(_)) => Err(EngineError::NotPending),
            Err(e) => Err(e.into()),
        }
    }

    // ── stats & referral tree ────────────────────────────────────────────

    pub async fn admin_stats(&self) -> Result<AdminStats, EngineError> {
        Ok(AdminStats {
            total_users: self.store.count_users().await?,
            total_tasks_completed: self.store.count_completions().await?,
            total_stars_distributed: self.store.sum_distributed().await?,
            pending_withdrawals_amount: self.store.pending_withdrawal_total().await?,
        })
    }

    /// The referral tree rooted at a user, depth-capped.
    pub async fn referral_tree(&self, user_id: i64) -> Result<ReferralNode, EngineError> {
        let user = self.user_by_id(user_id).await?;
        self.build_tree_node(user, 0).await
    }

    fn build_tree_node(
        &self,
        user: User,
        depth: u32,
    ) -> Pin<Box<dyn Future<Output = Result<ReferralNode, EngineError>> + Send + '_>> {
        Box::pin(async move {
            let total_earnings = self
                .store
                .transactions_for_user(user.id, Some(TransactionKind::Referral))
                .await?
                .iter()
                .map(|tx| tx.amount)
                .sum();

            let mut referrals = Vec::new();
            if depth < MAX_TREE_DEPTH {
                for child in self.store.users_referred_by(user.id).await? {
                    referrals.push(self.build_tree_node(child, depth + 1).await?);
                }
            }

            Ok(ReferralNode {
                id: user.id,
                telegram_id: user.telegram_id,
                username: user.username,
                first_name: user.first_name,
                referral_count: referrals.len(),
                total_earnings,
                referrals,
            })
        })
    }

    // ── banners ──────────────────────────────────────────────────────────

    pub async fn active_banners(&self) -> Result<Vec<Banner>, EngineError> {
        Ok(self.store.list_banners(true).await?)
    }

    /// All banners including inactive, for the admin panel.
    pub async fn all_banners(&self) -> Result<Vec<Banner>, EngineError> {
        Ok(self.store.list_banners(false).await?)
    }

    pub async fn create_banner(&self, new: NewBanner) -> Result<Banner, EngineError> {
        Ok(self.store.create_banner(new).await?)
    }

    pub async fn update_banner(
        &self,
        banner_id: i64,
        patch: BannerPatch,
    ) -> Result<Banner, EngineError> {
        match self.store.update_banner(banner_id, patch).await {
            Ok(banner) => Ok(banner),
            Err(StoreError::NotFound) => Err(EngineError::Validation("Banner not found".into())),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_banner(&self, banner_id: i64) -> Result<(), EngineError> {
        match self.store.delete_banner(banner_id).await {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound) => Err(EngineError::Validation("Banner not found".into())),
            Err(e) => Err(e.into()),
        }
    }
}
