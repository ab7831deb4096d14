//! Task verification and reward issuance.
//!
//! `verify_and_complete` is the single write path for completions. The
//! precondition checks short-circuit in a fixed order (exists → active →
//! not yet completed → externally verified) so each failure surfaces a
//! distinct error. The uniqueness constraint on `(user, task)` in the
//! store is the authoritative double-credit guard; the up-front
//! `has_completion` check only exists to answer the common case cheaply.

use tracing::{error, info, warn};

use stardrop_common::{
    EngineError, StoreError, Task, TaskKind, TaskStatus, TaskWithStatus,
};

use crate::{Engine, LedgerRef};

impl Engine {
    /// Verify that the user performed the task and credit the reward.
    /// Returns the number of stars granted.
    pub async fn verify_and_complete(
        &self,
        user_id: i64,
        task_id: i64,
    ) -> Result<i64, EngineError> {
        let task = self
            .store
            .task_by_id(task_id)
            .await?
            .ok_or(EngineError::TaskNotFound)?;
        if task.status != TaskStatus::Active {
            return Err(EngineError::TaskInactive);
        }
        if self.store.has_completion(user_id, task_id).await? {
            return Err(EngineError::AlreadyCompleted);
        }

        let user = self.user_by_id(user_id).await?;
        let verified = match task.kind {
            TaskKind::Channel => {
                match self
                    .verifier
                    .is_channel_member(user.telegram_id, &task.target)
                    .await
                {
                    Ok(member) => member,
                    // Fail closed: an unreachable verifier never grants a reward.
                    Err(e) => {
                        warn!(user_id, task_id, error = %e, "channel verification unavailable");
                        false
                    }
                }
            }
            TaskKind::Bot => self.store.has_activation(user_id, task_id).await?,
        };
        if !verified {
            return Err(EngineError::VerificationFailed);
        }

        match self.store.insert_completion(user_id, task_id).await {
            Ok(_) => {}
            // Lost the race against a concurrent submit for the same pair.
            Err(StoreError::Duplicate) => return Err(EngineError::AlreadyCompleted),
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = self
            .ledger
            .credit(user_id, task.reward, LedgerRef::Task(task_id))
            .await
        {
            // The completion row exists but the reward was not credited.
            // Requires operator reconciliation; the completion is not
            // rolled back.
            error!(
                user_id,
                task_id,
                reward = task.reward,
                error = %e,
                "task completed but reward credit failed"
            );
            return Err(EngineError::LedgerInconsistency(format!(
                "completion recorded for task {} but credit failed: {}",
                task_id, e
            )));
        }

        info!(user_id, task_id, reward = task.reward, "task verified and completed");

        // Best-effort: never affects the completion result.
        self.propagate_referral_bonus(&user, &task).await;

        Ok(task.reward)
    }

    /// Active tasks annotated with the caller's completion flag.
    pub async fn tasks_for_user(&self, user_id: i64) -> Result<Vec<TaskWithStatus>, EngineError> {
        let tasks = self.store.list_tasks(true).await?;
        let completed = self.store.completed_task_ids(user_id).await?;
        Ok(tasks
            .into_iter()
            .map(|task| TaskWithStatus {
                completed: completed.contains(&task.id),
                task,
            })
            .collect())
    }

    pub async fn task_by_id(&self, task_id: i64) -> Result<Task, EngineError> {
        self.store
            .task_by_id(task_id)
            .await?
            .ok_or(EngineError::TaskNotFound)
    }

    /// Record a bot-activation deep-link click. Idempotent.
    pub async fn record_activation(&self, user_id: i64, task_id: i64) -> Result<(), EngineError> {
        self.store.record_activation(user_id, task_id).await?;
        info!(user_id, task_id, "bot activation recorded");
        Ok(())
    }
}
