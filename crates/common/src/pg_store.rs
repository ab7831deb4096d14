//! Postgres [`Store`] implementation built on sqlx.
//!
//! The compound operations (`apply_ledger`, `claw_back`,
//! `transition_withdrawal`) each run inside a single SQL transaction.
//! Balance mutations go through a conditional atomic increment
//! (`balance = balance + $d ... AND balance + $d >= 0`), never a
//! read-modify-write, so concurrent requests for the same user cannot race
//! the balance below zero.
//!
//! Unique-violation errors (SQLSTATE 23505) are mapped to
//! [`StoreError::Duplicate`]; the `(user_id, task_id)` constraints on
//! completions and activations are the authoritative double-credit guard.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use crate::error::StoreError;
use crate::store::{LedgerEntry, Store};
use crate::types::*;

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with a small pool and sensible timeouts.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(map_err)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the schema if it does not exist yet. Idempotent.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id          BIGSERIAL PRIMARY KEY,
    telegram_id BIGINT NOT NULL UNIQUE,
    username    TEXT,
    first_name  TEXT NOT NULL,
    last_name   TEXT,
    avatar_url  TEXT,
    balance     BIGINT NOT NULL DEFAULT 0 CHECK (balance >= 0),
    referrer_id BIGINT REFERENCES users(id),
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS tasks (
    id          BIGSERIAL PRIMARY KEY,
    kind        TEXT NOT NULL,
    title       TEXT NOT NULL,
    description TEXT,
    reward      BIGINT NOT NULL CHECK (reward > 0),
    target      TEXT NOT NULL,
    avatar_url  TEXT,
    status      TEXT NOT NULL DEFAULT 'active',
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS task_completions (
    id           BIGSERIAL PRIMARY KEY,
    user_id      BIGINT NOT NULL REFERENCES users(id),
    task_id      BIGINT NOT NULL REFERENCES tasks(id),
    completed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (user_id, task_id)
);

CREATE TABLE IF NOT EXISTS withdrawals (
    id               BIGSERIAL PRIMARY KEY,
    user_id          BIGINT NOT NULL REFERENCES users(id),
    amount           BIGINT NOT NULL CHECK (amount > 0),
    status           TEXT NOT NULL DEFAULT 'pending',
    rejection_reason TEXT,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT now(),
    processed_at     TIMESTAMPTZ
);

CREATE TABLE IF NOT EXISTS transactions (
    id            BIGSERIAL PRIMARY KEY,
    user_id       BIGINT NOT NULL REFERENCES users(id),
    kind          TEXT NOT NULL,
    amount        BIGINT NOT NULL,
    task_id       BIGINT REFERENCES tasks(id),
    referral_id   BIGINT REFERENCES users(id),
    withdrawal_id BIGINT REFERENCES withdrawals(id),
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS bot_activations (
    id           BIGSERIAL PRIMARY KEY,
    user_id      BIGINT NOT NULL REFERENCES users(id),
    task_id      BIGINT NOT NULL REFERENCES tasks(id),
    activated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (user_id, task_id)
);

CREATE TABLE IF NOT EXISTS banners (
    id          BIGSERIAL PRIMARY KEY,
    image_url   TEXT NOT NULL,
    link        TEXT NOT NULL,
    order_index INT NOT NULL DEFAULT 0,
    active      BOOLEAN NOT NULL DEFAULT TRUE,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);
"#;

// ════════════════════════════════════════════════════════════════════════════
// ROW MAPPING
// ════════════════════════════════════════════════════════════════════════════

fn map_err(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            StoreError::Duplicate
        }
        _ => StoreError::Backend(e.to_string()),
    }
}

fn bad_column(col: &str, value: &str) -> StoreError {
    StoreError::Backend(format!("unexpected value in column {}: {}", col, value))
}

fn row_to_user(row: &PgRow) -> Result<User, StoreError> {
    Ok(User {
        id: row.try_get("id").map_err(map_err)?,
        telegram_id: row.try_get("telegram_id").map_err(map_err)?,
        username: row.try_get("username").map_err(map_err)?,
        first_name: row.try_get("first_name").map_err(map_err)?,
        last_name: row.try_get("last_name").map_err(map_err)?,
        avatar_url: row.try_get("avatar_url").map_err(map_err)?,
        balance: row.try_get("balance").map_err(map_err)?,
        referrer_id: row.try_get("referrer_id").map_err(map_err)?,
        created_at: row.try_get("created_at").map_err(map_err)?,
    })
}

fn row_to_task(row: &PgRow) -> Result<Task, StoreError> {
    let kind: String = row.try_get("kind").map_err(map_err)?;
    let status: String = row.try_get("status").map_err(map_err)?;
    Ok(Task {
        id: row.try_get("id").map_err(map_err)?,
        kind: TaskKind::parse(&kind).ok_or_else(|| bad_column("kind", &kind))?,
        title: row.try_get("title").map_err(map_err)?,
        description: row.try_get("description").map_err(map_err)?,
        reward: row.try_get("reward").map_err(map_err)?,
        target: row.try_get("target").map_err(map_err)?,
        avatar_url: row.try_get("avatar_url").map_err(map_err)?,
        status: TaskStatus::parse(&status).ok_or_else(|| bad_column("status", &status))?,
        created_at: row.try_get("created_at").map_err(map_err)?,
    })
}

fn row_to_completion(row: &PgRow) -> Result<TaskCompletion, StoreError> {
    Ok(TaskCompletion {
        id: row.try_get("id").map_err(map_err)?,
        user_id: row.try_get("user_id").map_err(map_err)?,
        task_id: row.try_get("task_id").map_err(map_err)?,
        completed_at: row.try_get("completed_at").map_err(map_err)?,
    })
}

fn row_to_transaction(row: &PgRow) -> Result<Transaction, StoreError> {
    let kind: String = row.try_get("kind").map_err(map_err)?;
    Ok(Transaction {
        id: row.try_get("id").map_err(map_err)?,
        user_id: row.try_get("user_id").map_err(map_err)?,
        kind: TransactionKind::parse(&kind).ok_or_else(|| bad_column("kind", &kind))?,
        amount: row.try_get("amount").map_err(map_err)?,
        task_id: row.try_get("task_id").map_err(map_err)?,
        referral_id: row.try_get("referral_id").map_err(map_err)?,
        withdrawal_id: row.try_get("withdrawal_id").map_err(map_err)?,
        created_at: row.try_get("created_at").map_err(map_err)?,
    })
}

fn row_to_withdrawal(row: &PgRow) -> Result<Withdrawal, StoreError> {
    let status: String = row.try_get("status").map_err(map_err)?;
    Ok(Withdrawal {
        id: row.try_get("id").map_err(map_err)?,
        user_id: row.try_get("user_id").map_err(map_err)?,
        amount: row.try_get("amount").map_err(map_err)?,
        status: WithdrawalStatus::parse(&status)
            .ok_or_else(|| bad_column("status", &status))?,
        rejection_reason: row.try_get("rejection_reason").map_err(map_err)?,
        created_at: row.try_get("created_at").map_err(map_err)?,
        processed_at: row.try_get("processed_at").map_err(map_err)?,
    })
}

fn row_to_banner(row: &PgRow) -> Result<Banner, StoreError> {
    Ok(Banner {
        id: row.try_get("id").map_err(map_err)?,
        image_url: row.try_get("image_url").map_err(map_err)?,
        link: row.try_get("link").map_err(map_err)?,
        order_index: row.try_get("order_index").map_err(map_err)?,
        active: row.try_get("active").map_err(map_err)?,
        created_at: row.try_get("created_at").map_err(map_err)?,
    })
}

// ════════════════════════════════════════════════════════════════════════════
// STORE IMPL
// ════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl Store for PgStore {
    // ── users ────────────────────────────────────────────────────────────

    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query(
            "INSERT INTO users (telegram_id, username, first_name, last_name, avatar_url, referrer_id)
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(new.telegram_id)
        .bind(new.username)
        .bind(new.first_name)
        .bind(new.last_name)
        .bind(new.avatar_url)
        .bind(new.referrer_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)?;
        row_to_user(&row)
    }

    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn user_by_telegram_id(&self, telegram_id: i64) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE telegram_id = $1")
            .bind(telegram_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
        rows.iter().map(row_to_user).collect()
    }

    async fn users_referred_by(&self, user_id: i64) -> Result<Vec<User>, StoreError> {
        let rows =
            sqlx::query("SELECT * FROM users WHERE referrer_id = $1 ORDER BY created_at DESC")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(map_err)?;
        rows.iter().map(row_to_user).collect()
    }

    async fn count_users(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(count as u64)
    }

    // ── tasks ────────────────────────────────────────────────────────────

    async fn create_task(&self, new: NewTask) -> Result<Task, StoreError> {
        let row = sqlx::query(
            "INSERT INTO tasks (kind, title, description, reward, target, avatar_url, status)
             VALUES ($1, $2, $3, $4, $5, $6, 'active') RETURNING *",
        )
        .bind(new.kind.as_str())
        .bind(new.title)
        .bind(new.description)
        .bind(new.reward)
        .bind(new.target)
        .bind(new.avatar_url)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)?;
        row_to_task(&row)
    }

    async fn update_task(&self, id: i64, patch: TaskPatch) -> Result<Task, StoreError> {
        let row = sqlx::query(
            "UPDATE tasks SET
                kind        = COALESCE($2, kind),
                title       = COALESCE($3, title),
                description = COALESCE($4, description),
                reward      = COALESCE($5, reward),
                target      = COALESCE($6, target),
                avatar_url  = COALESCE($7, avatar_url)
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(patch.kind.map(|k| k.as_str()))
        .bind(patch.title)
        .bind(patch.description)
        .bind(patch.reward)
        .bind(patch.target)
        .bind(patch.avatar_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;
        row.as_ref().map(row_to_task).transpose()?.ok_or(StoreError::NotFound)
    }

    async fn close_task(&self, id: i64) -> Result<Task, StoreError> {
        let row = sqlx::query("UPDATE tasks SET status = 'inactive' WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(row_to_task).transpose()?.ok_or(StoreError::NotFound)
    }

    async fn task_by_id(&self, id: i64) -> Result<Option<Task>, StoreError> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(row_to_task).transpose()
    }

    async fn list_tasks(&self, only_active: bool) -> Result<Vec<Task>, StoreError> {
        let sql = if only_active {
            "SELECT * FROM tasks WHERE status = 'active' ORDER BY created_at DESC"
        } else {
            "SELECT * FROM tasks ORDER BY created_at DESC"
        };
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
        rows.iter().map(row_to_task).collect()
    }

    // ── completions ──────────────────────────────────────────────────────

    async fn insert_completion(
        &self,
        user_id: i64,
        task_id: i64,
    ) -> Result<TaskCompletion, StoreError> {
        let row = sqlx::query(
            "INSERT INTO task_completions (user_id, task_id) VALUES ($1, $2) RETURNING *",
        )
        .bind(user_id)
        .bind(task_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)?;
        row_to_completion(&row)
    }

    async fn has_completion(&self, user_id: i64, task_id: i64) -> Result<bool, StoreError> {
        let row: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM task_completions WHERE user_id = $1 AND task_id = $2",
        )
        .bind(user_id)
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(row.is_some())
    }

    async fn completed_task_ids(&self, user_id: i64) -> Result<Vec<i64>, StoreError> {
        sqlx::query_scalar("SELECT task_id FROM task_completions WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn completed_channel_tasks(&self, user_id: i64) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query(
            "SELECT t.* FROM tasks t
             JOIN task_completions c ON c.task_id = t.id
             WHERE c.user_id = $1 AND t.kind = 'channel'",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;
        rows.iter().map(row_to_task).collect()
    }

    async fn count_completions(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM task_completions")
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(count as u64)
    }

    // ── ledger ───────────────────────────────────────────────────────────

    async fn apply_ledger(&self, entry: LedgerEntry) -> Result<Transaction, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        let updated = sqlx::query(
            "UPDATE users SET balance = balance + $2
             WHERE id = $1 AND balance + $2 >= 0",
        )
        .bind(entry.user_id)
        .bind(entry.amount)
        .execute(&mut *tx)
        .await
        .map_err(map_err)?;

        if updated.rows_affected() == 0 {
            let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM users WHERE id = $1")
                .bind(entry.user_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_err)?;
            return Err(if exists.is_some() {
                StoreError::BalanceInsufficient
            } else {
                StoreError::NotFound
            });
        }

        let row = sqlx::query(
            "INSERT INTO transactions (user_id, kind, amount, task_id, referral_id, withdrawal_id)
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(entry.user_id)
        .bind(entry.kind.as_str())
        .bind(entry.amount)
        .bind(entry.task_id)
        .bind(entry.referral_id)
        .bind(entry.withdrawal_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_err)?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(format!("ledger commit failed: {}", e)))?;
        row_to_transaction(&row)
    }

    async fn transactions_for_user(
        &self,
        user_id: i64,
        kind: Option<TransactionKind>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let rows = match kind {
            Some(kind) => sqlx::query(
                "SELECT * FROM transactions WHERE user_id = $1 AND kind = $2
                 ORDER BY created_at DESC, id DESC",
            )
            .bind(user_id)
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?,
            None => sqlx::query(
                "SELECT * FROM transactions WHERE user_id = $1
                 ORDER BY created_at DESC, id DESC",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?,
        };
        rows.iter().map(row_to_transaction).collect()
    }

    async fn sum_distributed(&self) -> Result<i64, StoreError> {
        sqlx::query_scalar(
            "SELECT COALESCE(SUM(ABS(amount)), 0)::BIGINT FROM transactions
             WHERE kind IN ('task', 'referral')",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)
    }

    // ── claw-back ────────────────────────────────────────────────────────

    async fn claw_back(
        &self,
        user_id: i64,
        task_ids: &[i64],
        total_reward: i64,
    ) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        let balance: i64 = sqlx::query_scalar("SELECT balance FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_err)?
            .ok_or(StoreError::NotFound)?;
        let debit = total_reward.min(balance);

        sqlx::query("DELETE FROM task_completions WHERE user_id = $1 AND task_id = ANY($2)")
            .bind(user_id)
            .bind(task_ids.to_vec())
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;

        if debit > 0 {
            sqlx::query("UPDATE users SET balance = balance - $2 WHERE id = $1")
                .bind(user_id)
                .bind(debit)
                .execute(&mut *tx)
                .await
                .map_err(map_err)?;

            sqlx::query(
                "INSERT INTO transactions (user_id, kind, amount) VALUES ($1, 'task', $2)",
            )
            .bind(user_id)
            .bind(-debit)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(format!("claw-back commit failed: {}", e)))?;
        Ok(debit)
    }

    // ── withdrawals ──────────────────────────────────────────────────────

    async fn create_withdrawal(
        &self,
        user_id: i64,
        amount: i64,
    ) -> Result<Withdrawal, StoreError> {
        let row = sqlx::query(
            "INSERT INTO withdrawals (user_id, amount, status) VALUES ($1, $2, 'pending')
             RETURNING *",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)?;
        row_to_withdrawal(&row)
    }

    async fn withdrawal_by_id(&self, id: i64) -> Result<Option<Withdrawal>, StoreError> {
        let row = sqlx::query("SELECT * FROM withdrawals WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(row_to_withdrawal).transpose()
    }

    async fn withdrawals_for_user(&self, user_id: i64) -> Result<Vec<Withdrawal>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM withdrawals WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;
        rows.iter().map(row_to_withdrawal).collect()
    }

    async fn pending_withdrawals(&self) -> Result<Vec<(Withdrawal, User)>, StoreError> {
        let rows = sqlx::query(
            "SELECT w.id AS w_id, w.user_id, w.amount, w.status, w.rejection_reason,
                    w.created_at AS w_created_at, w.processed_at, u.*
             FROM withdrawals w JOIN users u ON u.id = w.user_id
             WHERE w.status = 'pending' ORDER BY w.created_at ASC, w.id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        rows.iter()
            .map(|row| {
                let status: String = row.try_get("status").map_err(map_err)?;
                let withdrawal = Withdrawal {
                    id: row.try_get("w_id").map_err(map_err)?,
                    user_id: row.try_get("user_id").map_err(map_err)?,
                    amount: row.try_get("amount").map_err(map_err)?,
                    status: WithdrawalStatus::parse(&status)
                        .ok_or_else(|| bad_column("status", &status))?,
                    rejection_reason: row.try_get("rejection_reason").map_err(map_err)?,
                    created_at: row.try_get("w_created_at").map_err(map_err)?,
                    processed_at: row.try_get("processed_at").map_err(map_err)?,
                };
                let user = row_to_user(row)?;
                Ok((withdrawal, user))
            })
            .collect()
    }

    async fn transition_withdrawal(
        &self,
        id: i64,
        status: WithdrawalStatus,
        rejection_reason: Option<String>,
    ) -> Result<Withdrawal, StoreError> {
        let row = sqlx::query(
            "UPDATE withdrawals
             SET status = $2, rejection_reason = COALESCE($3, rejection_reason),
                 processed_at = $4
             WHERE id = $1 AND status = 'pending' RETURNING *",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(rejection_reason)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;

        match row {
            Some(row) => row_to_withdrawal(&row),
            None => {
                // Lost the compare-and-set: absent, or already adjudicated.
                let current: Option<String> =
                    sqlx::query_scalar("SELECT status FROM withdrawals WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(map_err)?;
                Err(match current {
                    Some(s) => StoreError::Conflict(format!("withdrawal {} is {}", id, s)),
                    None => StoreError::NotFound,
                })
            }
        }
    }

    async fn pending_withdrawal_total(&self) -> Result<i64, StoreError> {
        sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM withdrawals WHERE status = 'pending'",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)
    }

    // ── bot activations ──────────────────────────────────────────────────

    async fn record_activation(&self, user_id: i64, task_id: i64) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO bot_activations (user_id, task_id) VALUES ($1, $2)
             ON CONFLICT (user_id, task_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(task_id)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn has_activation(&self, user_id: i64, task_id: i64) -> Result<bool, StoreError> {
        let row: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM bot_activations WHERE user_id = $1 AND task_id = $2",
        )
        .bind(user_id)
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(row.is_some())
    }

    // ── banners ──────────────────────────────────────────────────────────

    async fn list_banners(&self, only_active: bool) -> Result<Vec<Banner>, StoreError> {
        let sql = if only_active {
            "SELECT * FROM banners WHERE active ORDER BY order_index, id"
        } else {
            "SELECT * FROM banners ORDER BY order_index, id"
        };
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
        rows.iter().map(row_to_banner).collect()
    }

    async fn create_banner(&self, new: NewBanner) -> Result<Banner, StoreError> {
        let row = sqlx::query(
            "INSERT INTO banners (image_url, link, order_index, active)
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(new.image_url)
        .bind(new.link)
        .bind(new.order_index)
        .bind(new.active)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)?;
        row_to_banner(&row)
    }

    async fn update_banner(&self, id: i64, patch: BannerPatch) -> Result<Banner, StoreError> {
        let row = sqlx::query(
            "UPDATE banners SET
                image_url   = COALESCE($2, image_url),
                link        = COALESCE($3, link),
                order_index = COALESCE($4, order_index),
                active      = COALESCE($5, active)
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(patch.image_url)
        .bind(patch.link)
        .bind(patch.order_index)
        .bind(patch.active)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;
        row.as_ref().map(row_to_banner).transpose()?.ok_or(StoreError::NotFound)
    }

    async fn delete_banner(&self, id: i64) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM banners WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
