//! Domain entities for the Stardrop backend.
//!
//! All monetary amounts are whole stars (`i64`). Transaction amounts are
//! signed: positive for earnings, negative for deductions. Timestamps are
//! UTC throughout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════════════════
// USERS
// ════════════════════════════════════════════════════════════════════════════

/// A registered Mini-App user.
///
/// `balance` is derived state: it must equal the sum of the user's
/// transaction amounts at all times. It is only ever mutated through the
/// ledger operations on [`crate::store::Store`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Numeric Telegram account id. Unique.
    pub telegram_id: i64,
    /// Telegram handle, without the leading `@`. Required for withdrawals.
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    /// Current star balance. Never negative.
    pub balance: i64,
    /// The user that referred this one, if any. Immutable once set.
    pub referrer_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a user row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub referrer_id: Option<i64>,
}

// ════════════════════════════════════════════════════════════════════════════
// TASKS
// ════════════════════════════════════════════════════════════════════════════

/// What kind of action a task asks the user to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Subscribe to a Telegram channel. Membership is a standing condition:
    /// it is re-checked at withdrawal time.
    Channel,
    /// Activate a bot through a deep link. One-time condition.
    Bot,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Channel => "channel",
            TaskKind::Bot => "bot",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "channel" => Some(TaskKind::Channel),
            "bot" => Some(TaskKind::Bot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Active,
    /// Closed by an admin. One-way transition; inactive tasks are kept for
    /// audit and claw-back accounting, never deleted.
    Inactive,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Active => "active",
            TaskStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(TaskStatus::Active),
            "inactive" => Some(TaskStatus::Inactive),
            _ => None,
        }
    }
}

/// A unit of rewardable work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub kind: TaskKind,
    pub title: String,
    pub description: Option<String>,
    /// Stars granted on completion. Always positive.
    pub reward: i64,
    /// Channel handle for channel tasks, bot deep-link target for bot tasks.
    pub target: String,
    pub avatar_url: Option<String>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a task. Status is always `active` on creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub kind: TaskKind,
    pub title: String,
    pub description: Option<String>,
    pub reward: i64,
    pub target: String,
    pub avatar_url: Option<String>,
}

/// Partial task update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    pub kind: Option<TaskKind>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub reward: Option<i64>,
    pub target: Option<String>,
    pub avatar_url: Option<String>,
}

/// Task enriched with the caller's completion flag, as served to the
/// Mini-App task list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskWithStatus {
    #[serde(flatten)]
    pub task: Task,
    pub completed: bool,
}

/// The record that a user has been credited for a task.
///
/// At most one row exists per `(user_id, task_id)` pair — this uniqueness
/// is the double-credit guard and must be enforced by every `Store`
/// implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCompletion {
    pub id: i64,
    pub user_id: i64,
    pub task_id: i64,
    pub completed_at: DateTime<Utc>,
}

// ════════════════════════════════════════════════════════════════════════════
// LEDGER
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Task,
    Referral,
    Withdrawal,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Task => "task",
            TransactionKind::Referral => "referral",
            TransactionKind::Withdrawal => "withdrawal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "task" => Some(TransactionKind::Task),
            "referral" => Some(TransactionKind::Referral),
            "withdrawal" => Some(TransactionKind::Withdrawal),
            _ => None,
        }
    }
}

/// An immutable ledger entry. Append-only; never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub kind: TransactionKind,
    /// Signed amount: positive for credits, negative for debits.
    pub amount: i64,
    pub task_id: Option<i64>,
    /// For referral bonuses: the user whose completion triggered the bonus.
    pub referral_id: Option<i64>,
    pub withdrawal_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

// ════════════════════════════════════════════════════════════════════════════
// WITHDRAWALS
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(WithdrawalStatus::Pending),
            "approved" => Some(WithdrawalStatus::Approved),
            "rejected" => Some(WithdrawalStatus::Rejected),
            _ => None,
        }
    }
}

/// A user-initiated payout request.
///
/// Created in `pending` by the withdrawal engine; transitions exactly once
/// to `approved` or `rejected` by an admin action. Terminal states are
/// never reopened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub status: WithdrawalStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

// ════════════════════════════════════════════════════════════════════════════
// BOT ACTIVATIONS / BANNERS
// ════════════════════════════════════════════════════════════════════════════

/// The record that a user triggered a task-specific bot deep link.
/// At most one per `(user_id, task_id)`; duplicate inserts are treated as
/// success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotActivation {
    pub id: i64,
    pub user_id: i64,
    pub task_id: i64,
    pub activated_at: DateTime<Utc>,
}

/// A promotional banner shown in the Mini-App carousel. Plain CRUD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Banner {
    pub id: i64,
    pub image_url: String,
    pub link: String,
    pub order_index: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBanner {
    pub image_url: String,
    pub link: String,
    #[serde(default)]
    pub order_index: i32,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// Partial banner update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BannerPatch {
    pub image_url: Option<String>,
    pub link: Option<String>,
    pub order_index: Option<i32>,
    pub active: Option<bool>,
}

// ════════════════════════════════════════════════════════════════════════════
// AGGREGATES
// ════════════════════════════════════════════════════════════════════════════

/// Platform-wide counters for the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminStats {
    pub total_users: u64,
    pub total_tasks_completed: u64,
    /// Sum of absolute amounts of task and referral credits.
    pub total_stars_distributed: i64,
    pub pending_withdrawals_amount: i64,
}

/// Referral overview for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralStats {
    pub referrals: Vec<User>,
    pub total_referrals: usize,
    pub total_earnings: i64,
}

/// One node of the admin referral tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralNode {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub referral_count: usize,
    /// Total referral-kind earnings of this user.
    pub total_earnings: i64,
    pub referrals: Vec<ReferralNode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_and_status_round_trip() {
        for kind in [TaskKind::Channel, TaskKind::Bot] {
            assert_eq!(TaskKind::parse(kind.as_str()), Some(kind));
        }
        for status in [TaskStatus::Active, TaskStatus::Inactive] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        for kind in [
            TransactionKind::Task,
            TransactionKind::Referral,
            TransactionKind::Withdrawal,
        ] {
            assert_eq!(TransactionKind::parse(kind.as_str()), Some(kind));
        }
        for status in [
            WithdrawalStatus::Pending,
            WithdrawalStatus::Approved,
            WithdrawalStatus::Rejected,
        ] {
            assert_eq!(WithdrawalStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskKind::parse("nope"), None);
    }

    #[test]
    fn task_kind_serializes_lowercase() {
        let json = serde_json::to_string(&TaskKind::Channel).unwrap();
        assert_eq!(json, "\"channel\"");
        let back: TaskKind = serde_json::from_str("\"bot\"").unwrap();
        assert_eq!(back, TaskKind::Bot);
    }
}
