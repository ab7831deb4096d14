//! In-memory [`Store`] implementation for tests and development.
//!
//! All tables live behind a single `parking_lot::Mutex`, so every store
//! operation — including the compound ledger and claw-back units — is
//! serialized and therefore trivially atomic. No network, no I/O, fully
//! deterministic.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::StoreError;
use crate::store::{LedgerEntry, Store};
use crate::types::*;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<i64, User>,
    tasks: HashMap<i64, Task>,
    completions: Vec<TaskCompletion>,
    completion_keys: HashSet<(i64, i64)>,
    transactions: Vec<Transaction>,
    withdrawals: HashMap<i64, Withdrawal>,
    activations: HashSet<(i64, i64)>,
    banners: HashMap<i64, Banner>,
    next_id: i64,
}

impl Tables {
    fn next(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Balance delta + transaction append under the single lock.
    fn apply(&mut self, entry: LedgerEntry, now: DateTime<Utc>) -> Result<Transaction, StoreError> {
        let user = self
            .users
            .get_mut(&entry.user_id)
            .ok_or(StoreError::NotFound)?;
        let new_balance = user.balance + entry.amount;
        if new_balance < 0 {
            return Err(StoreError::BalanceInsufficient);
        }
        user.balance = new_balance;
        let tx = Transaction {
            id: self.next(),
            user_id: entry.user_id,
            kind: entry.kind,
            amount: entry.amount,
            task_id: entry.task_id,
            referral_id: entry.referral_id,
            withdrawal_id: entry.withdrawal_id,
            created_at: now,
        };
        self.transactions.push(tx.clone());
        Ok(tx)
    }
}

/// In-memory store. Cheap to clone handles via `Arc`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    // ── users ────────────────────────────────────────────────────────────

    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let mut t = self.inner.lock();
        if t.users.values().any(|u| u.telegram_id == new.telegram_id) {
            return Err(StoreError::Duplicate);
        }
        let user = User {
            id: t.next(),
            telegram_id: new.telegram_id,
            username: new.username,
            first_name: new.first_name,
            last_name: new.last_name,
            avatar_url: new.avatar_url,
            balance: 0,
            referrer_id: new.referrer_id,
            created_at: Utc::now(),
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().users.get(&id).cloned())
    }

    async fn user_by_telegram_id(&self, telegram_id: i64) -> Result<Option<User>, StoreError> {
        Ok(self
            .inner
            .lock()
            .users
            .values()
            .find(|u| u.telegram_id == telegram_id)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.inner.lock().users.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn users_referred_by(&self, user_id: i64) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self
            .inner
            .lock()
            .users
            .values()
            .filter(|u| u.referrer_id == Some(user_id))
            .cloned()
            .collect();
        users.sort_by_key(|u| std::cmp::Reverse(u.id));
        Ok(users)
    }

    async fn count_users(&self) -> Result<u64, StoreError> {
        Ok(self.inner.lock().users.len() as u64)
    }

    // ── tasks ────────────────────────────────────────────────────────────

    async fn create_task(&self, new: NewTask) -> Result<Task, StoreError> {
        let mut t = self.inner.lock();
        let task = Task {
            id: t.next(),
            kind: new.kind,
            title: new.title,
            description: new.description,
            reward: new.reward,
            target: new.target,
            avatar_url: new.avatar_url,
            status: TaskStatus::Active,
            created_at: Utc::now(),
        };
        t.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn update_task(&self, id: i64, patch: TaskPatch) -> Result<Task, StoreError> {
        let mut t = self.inner.lock();
        let task = t.tasks.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(kind) = patch.kind {
            task.kind = kind;
        }
        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = Some(description);
        }
        if let Some(reward) = patch.reward {
            task.reward = reward;
        }
        if let Some(target) = patch.target {
            task.target = target;
        }
        if let Some(avatar_url) = patch.avatar_url {
            task.avatar_url = Some(avatar_url);
        }
        Ok(task.clone())
    }

    async fn close_task(&self, id: i64) -> Result<Task, StoreError> {
        let mut t = self.inner.lock();
        let task = t.tasks.get_mut(&id).ok_or(StoreError::NotFound)?;
        task.status = TaskStatus::Inactive;
        Ok(task.clone())
    }

    async fn task_by_id(&self, id: i64) -> Result<Option<Task>, StoreError> {
        Ok(self.inner.lock().tasks.get(&id).cloned())
    }

    async fn list_tasks(&self, only_active: bool) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self
            .inner
            .lock()
            .tasks
            .values()
            .filter(|t| !only_active || t.status == TaskStatus::Active)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| std::cmp::Reverse(t.id));
        Ok(tasks)
    }

    // ── completions ──────────────────────────────────────────────────────

    async fn insert_completion(
        &self,
        user_id: i64,
        task_id: i64,
    ) -> Result<TaskCompletion, StoreError> {
        let mut t = self.inner.lock();
        if !t.completion_keys.insert((user_id, task_id)) {
            return Err(StoreError::Duplicate);
        }
        let completion = TaskCompletion {
            id: t.next(),
            user_id,
            task_id,
            completed_at: Utc::now(),
        };
        t.completions.push(completion.clone());
        Ok(completion)
    }

    async fn has_completion(&self, user_id: i64, task_id: i64) -> Result<bool, StoreError> {
        Ok(self.inner.lock().completion_keys.contains(&(user_id, task_id)))
    }

    async fn completed_task_ids(&self, user_id: i64) -> Result<Vec<i64>, StoreError> {
        Ok(self
            .inner
            .lock()
            .completions
            .iter()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.task_id)
            .collect())
    }

    async fn completed_channel_tasks(&self, user_id: i64) -> Result<Vec<Task>, StoreError> {
        let t = self.inner.lock();
        Ok(t.completions
            .iter()
            .filter(|c| c.user_id == user_id)
            .filter_map(|c| t.tasks.get(&c.task_id))
            .filter(|task| task.kind == TaskKind::Channel)
            .cloned()
            .collect())
    }

    async fn count_completions(&self) -> Result<u64, StoreError> {
        Ok(self.inner.lock().completions.len() as u64)
    }

    // ── ledger ───────────────────────────────────────────────────────────

    async fn apply_ledger(&self, entry: LedgerEntry) -> Result<Transaction, StoreError> {
        self.inner.lock().apply(entry, Utc::now())
    }

    async fn transactions_for_user(
        &self,
        user_id: i64,
        kind: Option<TransactionKind>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let mut txs: Vec<Transaction> = self
            .inner
            .lock()
            .transactions
            .iter()
            .filter(|tx| tx.user_id == user_id)
            .filter(|tx| kind.map_or(true, |k| tx.kind == k))
            .cloned()
            .collect();
        txs.sort_by_key(|tx| std::cmp::Reverse(tx.id));
        Ok(txs)
    }

    async fn sum_distributed(&self) -> Result<i64, StoreError> {
        Ok(self
            .inner
            .lock()
            .transactions
            .iter()
            .filter(|tx| matches!(tx.kind, TransactionKind::Task | TransactionKind::Referral))
            .map(|tx| tx.amount.abs())
            .sum())
    }

    // ── claw-back ────────────────────────────────────────────────────────

    async fn claw_back(
        &self,
        user_id: i64,
        task_ids: &[i64],
        total_reward: i64,
    ) -> Result<i64, StoreError> {
        let mut t = self.inner.lock();
        let balance = t
            .users
            .get(&user_id)
            .ok_or(StoreError::NotFound)?
            .balance;
        let debit = total_reward.min(balance);

        t.completions
            .retain(|c| !(c.user_id == user_id && task_ids.contains(&c.task_id)));
        for task_id in task_ids {
            t.completion_keys.remove(&(user_id, *task_id));
        }

        if debit > 0 {
            t.apply(
                LedgerEntry {
                    user_id,
                    kind: TransactionKind::Task,
                    amount: -debit,
                    task_id: None,
                    referral_id: None,
                    withdrawal_id: None,
                },
                Utc::now(),
            )?;
        }
        Ok(debit)
    }

    // ── withdrawals ──────────────────────────────────────────────────────

    async fn create_withdrawal(
        &self,
        user_id: i64,
        amount: i64,
    ) -> Result<Withdrawal, StoreError> {
        let mut t = self.inner.lock();
        if !t.users.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }
        let withdrawal = Withdrawal {
            id: t.next(),
            user_id,
            amount,
            status: WithdrawalStatus::Pending,
            rejection_reason: None,
            created_at: Utc::now(),
            processed_at: None,
        };
        t.withdrawals.insert(withdrawal.id, withdrawal.clone());
        Ok(withdrawal)
    }

    async fn withdrawal_by_id(&self, id: i64) -> Result<Option<Withdrawal>, StoreError> {
        Ok(self.inner.lock().withdrawals.get(&id).cloned())
    }

    async fn withdrawals_for_user(&self, user_id: i64) -> Result<Vec<Withdrawal>, StoreError> {
        let mut rows: Vec<Withdrawal> = self
            .inner
            .lock()
            .withdrawals
            .values()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|w| std::cmp::Reverse(w.id));
        Ok(rows)
    }

    async fn pending_withdrawals(&self) -> Result<Vec<(Withdrawal, User)>, StoreError> {
        let t = self.inner.lock();
        let mut rows: Vec<(Withdrawal, User)> = t
            .withdrawals
            .values()
            .filter(|w| w.status == WithdrawalStatus::Pending)
            .filter_map(|w| t.users.get(&w.user_id).map(|u| (w.clone(), u.clone())))
            .collect();
        rows.sort_by_key(|(w, _)| w.id);
        Ok(rows)
    }

    async fn transition_withdrawal(
        &self,
        id: i64,
        status: WithdrawalStatus,
        rejection_reason: Option<String>,
    ) -> Result<Withdrawal, StoreError> {
        let mut t = self.inner.lock();
        let w = t.withdrawals.get_mut(&id).ok_or(StoreError::NotFound)?;
        if w.status != WithdrawalStatus::Pending {
            return Err(StoreError::Conflict(format!(
                "withdrawal {} is {}",
                id,
                w.status.as_str()
            )));
        }
        w.status = status;
        w.processed_at = Some(Utc::now());
        if let Some(reason) = rejection_reason {
            w.rejection_reason = Some(reason);
        }
        Ok(w.clone())
    }

    async fn pending_withdrawal_total(&self) -> Result<i64, StoreError> {
        Ok(self
            .inner
            .lock()
            .withdrawals
            .values()
            .filter(|w| w.status == WithdrawalStatus::Pending)
            .map(|w| w.amount)
            .sum())
    }

    // ── bot activations ──────────────────────────────────────────────────

    async fn record_activation(&self, user_id: i64, task_id: i64) -> Result<(), StoreError> {
        // duplicate insert is success
        self.inner.lock().activations.insert((user_id, task_id));
        Ok(())
    }

    async fn has_activation(&self, user_id: i64, task_id: i64) -> Result<bool, StoreError> {
        Ok(self.inner.lock().activations.contains(&(user_id, task_id)))
    }

    // ── banners ──────────────────────────────────────────────────────────

    async fn list_banners(&self, only_active: bool) -> Result<Vec<Banner>, StoreError> {
        let mut banners: Vec<Banner> = self
            .inner
            .lock()
            .banners
            .values()
            .filter(|b| !only_active || b.active)
            .cloned()
            .collect();
        banners.sort_by_key(|b| (b.order_index, b.id));
        Ok(banners)
    }

    async fn create_banner(&self, new: NewBanner) -> Result<Banner, StoreError> {
        let mut t = self.inner.lock();
        let banner = Banner {
            id: t.next(),
            image_url: new.image_url,
            link: new.link,
            order_index: new.order_index,
            active: new.active,
            created_at: Utc::now(),
        };
        t.banners.insert(banner.id, banner.clone());
        Ok(banner)
    }

    async fn update_banner(&self, id: i64, patch: BannerPatch) -> Result<Banner, StoreError> {
        let mut t = self.inner.lock();
        let banner = t.banners.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(image_url) = patch.image_url {
            banner.image_url = image_url;
        }
        if let Some(link) = patch.link {
            banner.link = link;
        }
        if let Some(order_index) = patch.order_index {
            banner.order_index = order_index;
        }
        if let Some(active) = patch.active {
            banner.active = active;
        }
        Ok(banner.clone())
    }

    async fn delete_banner(&self, id: i64) -> Result<(), StoreError> {
        self.inner
            .lock()
            .banners
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}
