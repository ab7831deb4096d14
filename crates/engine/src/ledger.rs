//! The ledger primitive: the sole path through which balances change.
//!
//! Every mutation is one atomic store operation that both moves the
//! balance and appends the transaction row, so a balance write without its
//! audit record cannot exist. The amount passed to [`Ledger::credit`] and
//! [`Ledger::debit`] is always positive; the sign is applied here.

use std::sync::Arc;

use tracing::{error, info};

use stardrop_common::{
    EngineError, LedgerEntry, Store, StoreError, Transaction, TransactionKind,
};

/// What a ledger entry refers back to. Determines the transaction kind.
#[derive(Debug, Clone, Copy)]
pub enum LedgerRef {
    /// Reward for completing a task.
    Task(i64),
    /// Referral bonus: the task that was completed and the user who
    /// completed it.
    Referral { task_id: i64, referral_user_id: i64 },
    /// Debit for an approved withdrawal.
    Withdrawal(i64),
}

impl LedgerRef {
    fn kind(&self) -> TransactionKind {
        match self {
            LedgerRef::Task(_) => TransactionKind::Task,
            LedgerRef::Referral { .. } => TransactionKind::Referral,
            LedgerRef::Withdrawal(_) => TransactionKind::Withdrawal,
        }
    }

    fn entry(&self, user_id: i64, amount: i64) -> LedgerEntry {
        let (task_id, referral_id, withdrawal_id) = match *self {
            LedgerRef::Task(task_id) => (Some(task_id), None, None),
            LedgerRef::Referral {
                task_id,
                referral_user_id,
            } => (Some(task_id), Some(referral_user_id), None),
            LedgerRef::Withdrawal(withdrawal_id) => (None, None, Some(withdrawal_id)),
        };
        LedgerEntry {
            user_id,
            kind: self.kind(),
            amount,
            task_id,
            referral_id,
            withdrawal_id,
        }
    }
}

/// Thin delegation layer over [`Store::apply_ledger`].
pub struct Ledger {
    store: Arc<dyn Store>,
}

impl Ledger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Add `amount` stars (positive) to the user's balance.
    pub async fn credit(
        &self,
        user_id: i64,
        amount: i64,
        re: LedgerRef,
    ) -> Result<Transaction, EngineError> {
        debug_assert!(amount > 0);
        let tx = self.apply(re.entry(user_id, amount)).await?;
        info!(user_id, amount, kind = re.kind().as_str(), "balance credited");
        Ok(tx)
    }

    /// Remove `amount` stars (positive) from the user's balance. Fails
    /// with `InsufficientBalance` when the balance would go negative, in
    /// which case nothing is written.
    pub async fn debit(
        &self,
        user_id: i64,
        amount: i64,
        re: LedgerRef,
    ) -> Result<Transaction, EngineError> {
        debug_assert!(amount > 0);
        let tx = self.apply(re.entry(user_id, -amount)).await?;
        info!(user_id, amount, kind = re.kind().as_str(), "balance debited");
        Ok(tx)
    }

    async fn apply(&self, entry: LedgerEntry) -> Result<Transaction, EngineError> {
        match self.store.apply_ledger(entry).await {
            Ok(tx) => Ok(tx),
            Err(StoreError::BalanceInsufficient) => Err(EngineError::InsufficientBalance),
            Err(StoreError::NotFound) => Err(EngineError::UserNotFound),
            Err(StoreError::Inconsistent(detail)) => {
                // Critical: the backend reported a partially-applied unit.
                error!(%detail, "ledger operation left inconsistent state");
                Err(EngineError::LedgerInconsistency(detail))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stardrop_common::{MemoryStore, NewUser};

    async fn user(store: &MemoryStore) -> i64 {
        store
            .create_user(NewUser {
                telegram_id: 100,
                username: Some("alice".into()),
                first_name: "Alice".into(),
                last_name: None,
                avatar_url: None,
                referrer_id: None,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn credit_then_debit_keeps_ledger_sum_equal_to_balance() {
        let store = Arc::new(MemoryStore::new());
        let user_id = user(&store).await;
        let ledger = Ledger::new(store.clone() as Arc<dyn Store>);

        ledger
            .credit(user_id, 120, LedgerRef::Task(1))
            .await
            .unwrap();
        ledger
            .debit(user_id, 100, LedgerRef::Withdrawal(5))
            .await
            .unwrap();

        let balance = store.user_by_id(user_id).await.unwrap().unwrap().balance;
        let sum: i64 = store
            .transactions_for_user(user_id, None)
            .await
            .unwrap()
            .iter()
            .map(|t| t.amount)
            .sum();
        assert_eq!(balance, 20);
        assert_eq!(sum, balance);
    }

    #[tokio::test]
    async fn overdraw_is_rejected_without_side_effects() {
        let store = Arc::new(MemoryStore::new());
        let user_id = user(&store).await;
        let ledger = Ledger::new(store.clone() as Arc<dyn Store>);

        ledger.credit(user_id, 50, LedgerRef::Task(1)).await.unwrap();
        let err = ledger
            .debit(user_id, 80, LedgerRef::Withdrawal(9))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientBalance));
        assert_eq!(
            store.user_by_id(user_id).await.unwrap().unwrap().balance,
            50
        );
        assert_eq!(
            store
                .transactions_for_user(user_id, None)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn debit_for_unknown_user_maps_to_user_not_found() {
        let store = Arc::new(MemoryStore::new());
        let ledger = Ledger::new(store as Arc<dyn Store>);
        let err = ledger
            .debit(999, 10, LedgerRef::Withdrawal(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UserNotFound));
    }
}
