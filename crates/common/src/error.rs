//! Error taxonomy shared across the workspace.
//!
//! Four layers, matching who can act on the failure:
//!
//! | Type | Produced by | Consumed by |
//! |------|-------------|-------------|
//! | [`StoreError`] | `Store` implementations | engine |
//! | [`VerifierError`] | membership verifiers | engine |
//! | [`NotifyError`] | notifiers | engine (logged, swallowed) |
//! | [`EngineError`] | engine operations | HTTP layer |
//!
//! `EngineError` is the public contract of the core subsystem. Validation,
//! verification and state-conflict variants are user-correctable and are
//! surfaced verbatim; `LedgerInconsistency` is critical, logged in full and
//! surfaced only as a generic server error.

use thiserror::Error;

/// Errors reported by a [`crate::store::Store`] implementation.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The referenced row does not exist.
    #[error("row not found")]
    NotFound,

    /// A uniqueness constraint rejected the insert. For task completions
    /// this is the double-credit guard firing.
    #[error("duplicate row")]
    Duplicate,

    /// A ledger mutation would have driven the balance below zero.
    #[error("balance would become negative")]
    BalanceInsufficient,

    /// A guarded state transition found the row in a different state than
    /// required (e.g. adjudicating a withdrawal that is not pending).
    #[error("state conflict: {0}")]
    Conflict(String),

    /// The backend reported a partially-applied compound operation. The
    /// atomic store operations make this unreachable through normal paths;
    /// it is kept so a backend can still signal corruption.
    #[error("ledger inconsistency: {0}")]
    Inconsistent(String),

    /// Any other backend failure (connection, SQL, serialization).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Errors from the external channel-membership check.
#[derive(Debug, Clone, Error)]
pub enum VerifierError {
    #[error("verification timed out")]
    Timeout,

    #[error("verification backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors from notification dispatch. Always best-effort: callers log and
/// continue.
#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("notification dispatch failed: {0}")]
    Send(String),
}

/// The error contract of the core engine operations.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("task not found")]
    TaskNotFound,

    #[error("task is not active")]
    TaskInactive,

    #[error("task already completed")]
    AlreadyCompleted,

    #[error("task verification failed")]
    VerificationFailed,

    /// User-correctable validation failure with a specific reason.
    #[error("{0}")]
    Validation(String),

    /// The withdrawal request was rejected because previously-credited
    /// channel subscriptions no longer hold. The lapsed completions were
    /// removed and their rewards clawed back before this error was raised.
    #[error(
        "withdrawal rejected: {lapsed} inactive subscription(s) detected, \
         {clawed_back} stars deducted; please re-complete the tasks"
    )]
    SubscriptionsLapsed { lapsed: usize, clawed_back: i64 },

    #[error("user not found")]
    UserNotFound,

    #[error("withdrawal not found")]
    WithdrawalNotFound,

    /// The withdrawal has already been adjudicated.
    #[error("withdrawal is not in pending status")]
    NotPending,

    #[error("insufficient balance")]
    InsufficientBalance,

    /// A balance mutation and its transaction row could not be applied as
    /// one unit. Critical; requires operator reconciliation.
    #[error("ledger inconsistency: {0}")]
    LedgerInconsistency(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Verifier(#[from] VerifierError),
}

impl EngineError {
    /// Whether this error must be hidden behind a generic server error at
    /// the HTTP boundary.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            EngineError::LedgerInconsistency(_)
                | EngineError::Store(_)
                | EngineError::Verifier(_)
        )
    }
}
