//! User registration with referral capture.
//!
//! Registration happens on the bot's `/start`: the optional start
//! parameter carries the referrer's Telegram id. The referrer link is
//! captured once at creation and never changes afterwards; self-referral
//! and unknown referral codes are silently dropped.

use tracing::info;

use stardrop_common::{EngineError, NewUser, StoreError, User};

use crate::Engine;

/// Registration payload, as extracted from a Telegram `/start` update.
#[derive(Debug, Clone)]
pub struct RegisterUser {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    /// Referrer's Telegram id from the start parameter, if any.
    pub referrer_code: Option<i64>,
}

impl Engine {
    /// Idempotent registration: returns the existing user when the
    /// Telegram id is already known, otherwise creates one with the
    /// resolved referrer.
    pub async fn register_or_get(&self, reg: RegisterUser) -> Result<User, EngineError> {
        if let Some(existing) = self.store.user_by_telegram_id(reg.telegram_id).await? {
            return Ok(existing);
        }

        let referrer_id = match reg.referrer_code {
            Some(code) if code != reg.telegram_id => self
                .store
                .user_by_telegram_id(code)
                .await?
                .map(|referrer| referrer.id),
            _ => None,
        };

        let created = self
            .store
            .create_user(NewUser {
                telegram_id: reg.telegram_id,
                username: reg.username,
                first_name: reg.first_name,
                last_name: reg.last_name,
                avatar_url: reg.avatar_url,
                referrer_id,
            })
            .await;

        match created {
            Ok(user) => {
                info!(
                    user_id = user.id,
                    telegram_id = user.telegram_id,
                    referrer_id = ?user.referrer_id,
                    "user registered"
                );
                Ok(user)
            }
            // Concurrent /start for the same account: the other insert won.
            Err(StoreError::Duplicate) => self
                .store
                .user_by_telegram_id(reg.telegram_id)
                .await?
                .ok_or(EngineError::UserNotFound),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn user_by_id(&self, id: i64) -> Result<User, EngineError> {
        self.store
            .user_by_id(id)
            .await?
            .ok_or(EngineError::UserNotFound)
    }

    pub async fn user_by_telegram_id(&self, telegram_id: i64) -> Result<User, EngineError> {
        self.store
            .user_by_telegram_id(telegram_id)
            .await?
            .ok_or(EngineError::UserNotFound)
    }
}
