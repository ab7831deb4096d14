//! # Stardrop Engine
//!
//! The core subsystem of the task-to-earn platform: reward issuance,
//! referral propagation, the withdrawal eligibility state machine and
//! admin adjudication. Everything here is pure domain logic over the
//! [`Store`] / [`MembershipVerifier`] / [`Notifier`] abstractions; the
//! HTTP and Telegram surfaces live in the api and bot crates.
//!
//! ## Operations
//!
//! | Module | Operations |
//! |--------|------------|
//! | `users` | registration with referral capture |
//! | `tasks` | `verify_and_complete`, task listing |
//! | `referral` | bonus propagation, stats, link generation |
//! | `withdrawal` | `request_withdrawal`, history |
//! | `admin` | task management, adjudication, stats, referral tree |
//!
//! ## Invariants enforced here
//!
//! - A user's balance equals the sum of their transaction amounts at every
//!   observation point; the [`ledger::Ledger`] is the sole balance writer.
//! - At most one completion per `(user, task)`; the second concurrent
//!   submit observes `AlreadyCompleted`.
//! - A withdrawal is adjudicated exactly once.

use std::sync::Arc;

use tracing::warn;

use stardrop_common::{
    Config, MembershipVerifier, Notifier, NotifyEvent, Store,
};

pub mod admin;
pub mod ledger;
pub mod referral;
pub mod tasks;
pub mod users;
pub mod withdrawal;

pub use ledger::{Ledger, LedgerRef};

/// The core engine. Cheap to clone behind an `Arc`; all state lives in the
/// store.
pub struct Engine {
    store: Arc<dyn Store>,
    verifier: Arc<dyn MembershipVerifier>,
    notifier: Arc<dyn Notifier>,
    ledger: Ledger,
    min_withdrawal: i64,
    referral_bonus_percent: u32,
    bot_username: String,
}

impl Engine {
    pub fn new(
        store: Arc<dyn Store>,
        verifier: Arc<dyn MembershipVerifier>,
        notifier: Arc<dyn Notifier>,
        config: &Config,
    ) -> Self {
        Self {
            ledger: Ledger::new(Arc::clone(&store)),
            store,
            verifier,
            notifier,
            min_withdrawal: config.min_withdrawal,
            referral_bonus_percent: config.referral_bonus_percent,
            bot_username: config.bot_username.clone(),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Dispatch a notification without letting a failure escape. Every
    /// notification in this system is fire-and-forget.
    pub(crate) async fn notify_best_effort(&self, event: NotifyEvent) {
        if let Err(e) = self.notifier.notify(event).await {
            warn!(error = %e, "notification dispatch failed");
        }
    }
}
