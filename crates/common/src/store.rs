//! Persistence abstraction for the Stardrop backend.
//!
//! [`Store`] is the single seam between the engine and the datastore. Two
//! implementations exist: [`crate::PgStore`] (Postgres via sqlx) and
//! [`crate::MemoryStore`] (tests, development).
//!
//! ## Atomicity contract
//!
//! Three operations are compound and MUST be applied as one atomic unit by
//! every implementation:
//!
//! - [`Store::apply_ledger`] — balance mutation + transaction append. A
//!   balance write without its transaction row (or vice versa) must be
//!   impossible, not merely logged.
//! - [`Store::claw_back`] — completion deletion + debit + transaction
//!   append for lapsed subscriptions.
//! - [`Store::transition_withdrawal`] — compare-and-set on the `pending`
//!   status, so concurrent adjudications cannot both succeed.
//!
//! Uniqueness of `(user_id, task_id)` completions and activations is part
//! of the contract: violating inserts return [`StoreError::Duplicate`].

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::*;

/// One ledger application: a signed balance delta plus the transaction row
/// that records it.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub user_id: i64,
    pub kind: TransactionKind,
    /// Signed delta: positive credits, negative debits.
    pub amount: i64,
    pub task_id: Option<i64>,
    pub referral_id: Option<i64>,
    pub withdrawal_id: Option<i64>,
}

#[async_trait]
pub trait Store: Send + Sync + 'static {
    // ── users ────────────────────────────────────────────────────────────

    async fn create_user(&self, new: NewUser) -> Result<User, StoreError>;
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn user_by_telegram_id(&self, telegram_id: i64) -> Result<Option<User>, StoreError>;
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    /// Direct referrals of a user, newest first.
    async fn users_referred_by(&self, user_id: i64) -> Result<Vec<User>, StoreError>;
    async fn count_users(&self) -> Result<u64, StoreError>;

    // ── tasks ────────────────────────────────────────────────────────────

    async fn create_task(&self, new: NewTask) -> Result<Task, StoreError>;
    async fn update_task(&self, id: i64, patch: TaskPatch) -> Result<Task, StoreError>;
    /// One-way flip to `inactive`.
    async fn close_task(&self, id: i64) -> Result<Task, StoreError>;
    async fn task_by_id(&self, id: i64) -> Result<Option<Task>, StoreError>;
    /// All tasks newest first; `only_active` filters on status.
    async fn list_tasks(&self, only_active: bool) -> Result<Vec<Task>, StoreError>;

    // ── completions ──────────────────────────────────────────────────────

    /// Insert the completion record. Returns [`StoreError::Duplicate`] when
    /// a row already exists for the pair — the caller maps this to
    /// `AlreadyCompleted`.
    async fn insert_completion(&self, user_id: i64, task_id: i64)
        -> Result<TaskCompletion, StoreError>;
    async fn has_completion(&self, user_id: i64, task_id: i64) -> Result<bool, StoreError>;
    async fn completed_task_ids(&self, user_id: i64) -> Result<Vec<i64>, StoreError>;
    /// The channel-kind tasks this user has standing completions for; the
    /// withdrawal engine re-verifies each of these.
    async fn completed_channel_tasks(&self, user_id: i64) -> Result<Vec<Task>, StoreError>;
    async fn count_completions(&self) -> Result<u64, StoreError>;

    // ── ledger ───────────────────────────────────────────────────────────

    /// Apply a signed balance delta and append the matching transaction
    /// row as one atomic unit. Returns [`StoreError::BalanceInsufficient`]
    /// when the delta would drive the balance negative, in which case
    /// nothing is written.
    async fn apply_ledger(&self, entry: LedgerEntry) -> Result<Transaction, StoreError>;

    /// A user's transactions, newest first, optionally filtered by kind.
    async fn transactions_for_user(
        &self,
        user_id: i64,
        kind: Option<TransactionKind>,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// Sum of absolute amounts of task and referral credits platform-wide.
    async fn sum_distributed(&self) -> Result<i64, StoreError>;

    // ── claw-back ────────────────────────────────────────────────────────

    /// Remove the given completions, debit their summed rewards and append
    /// one aggregate negative `task` transaction, all atomically. The debit
    /// is clamped to the current balance so it can never go negative; the
    /// actual amount deducted is returned.
    async fn claw_back(
        &self,
        user_id: i64,
        task_ids: &[i64],
        total_reward: i64,
    ) -> Result<i64, StoreError>;

    // ── withdrawals ──────────────────────────────────────────────────────

    async fn create_withdrawal(&self, user_id: i64, amount: i64)
        -> Result<Withdrawal, StoreError>;
    async fn withdrawal_by_id(&self, id: i64) -> Result<Option<Withdrawal>, StoreError>;
    /// A user's withdrawals, newest first.
    async fn withdrawals_for_user(&self, user_id: i64) -> Result<Vec<Withdrawal>, StoreError>;
    /// Pending withdrawals oldest first, joined with their users.
    async fn pending_withdrawals(&self) -> Result<Vec<(Withdrawal, User)>, StoreError>;
    /// Compare-and-set: move a `pending` withdrawal to a terminal status
    /// and stamp `processed_at`. Returns [`StoreError::Conflict`] when the
    /// row is not pending, [`StoreError::NotFound`] when absent.
    async fn transition_withdrawal(
        &self,
        id: i64,
        status: WithdrawalStatus,
        rejection_reason: Option<String>,
    ) -> Result<Withdrawal, StoreError>;
    async fn pending_withdrawal_total(&self) -> Result<i64, StoreError>;

    // ── bot activations ──────────────────────────────────────────────────

    /// Record a deep-link activation. Duplicate inserts succeed silently.
    async fn record_activation(&self, user_id: i64, task_id: i64) -> Result<(), StoreError>;
    async fn has_activation(&self, user_id: i64, task_id: i64) -> Result<bool, StoreError>;

    // ── banners ──────────────────────────────────────────────────────────

    async fn list_banners(&self, only_active: bool) -> Result<Vec<Banner>, StoreError>;
    async fn create_banner(&self, new: NewBanner) -> Result<Banner, StoreError>;
    async fn update_banner(&self, id: i64, patch: BannerPatch) -> Result<Banner, StoreError>;
    async fn delete_banner(&self, id: i64) -> Result<(), StoreError>;
}
