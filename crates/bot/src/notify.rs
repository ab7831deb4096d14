//! Notification delivery over Telegram.
//!
//! One [`TelegramNotifier`] serves both local engine events (the bot's own
//! `/start` flow) and events forwarded by the API backend over `POST
//! /notify`. Admin events fan out to the configured admin set; `NewTask`
//! broadcasts to every registered user with pacing so Telegram's rate
//! limits are respected.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::html;
use tracing::{info, warn};

use stardrop_common::{NotifyError, Notifier, NotifyEvent, Store};

/// Pause between broadcast messages.
const BROADCAST_PACING: Duration = Duration::from_millis(50);

pub struct TelegramNotifier {
    bot: Bot,
    admin_ids: Vec<i64>,
    store: Arc<dyn Store>,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, admin_ids: Vec<i64>, store: Arc<dyn Store>) -> Self {
        Self {
            bot,
            admin_ids,
            store,
        }
    }

    async fn send(&self, telegram_id: i64, text: &str) -> Result<(), NotifyError> {
        self.bot
            .send_message(ChatId(telegram_id), text)
            .parse_mode(ParseMode::Html)
            .await
            .map_err(|e| NotifyError::Send(e.to_string()))?;
        Ok(())
    }

    /// Deliver to every admin principal. Succeeds if at least one admin
    /// got the message.
    async fn send_admins(&self, text: &str) -> Result<(), NotifyError> {
        let mut delivered = 0usize;
        for admin_id in &self.admin_ids {
            match self.send(*admin_id, text).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(admin_id, error = %e, "admin notification failed"),
            }
        }
        if delivered == 0 && !self.admin_ids.is_empty() {
            return Err(NotifyError::Send("no admin could be reached".into()));
        }
        Ok(())
    }

    /// Send to every registered user, paced. Per-user failures (blocked
    /// bot, deleted account) are logged and skipped.
    async fn broadcast(&self, text: &str) -> Result<(), NotifyError> {
        let users = self
            .store
            .list_users()
            .await
            .map_err(|e| NotifyError::Send(e.to_string()))?;
        let total = users.len();
        let mut delivered = 0usize;
        for user in users {
            match self.send(user.telegram_id, text).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(telegram_id = user.telegram_id, error = %e, "broadcast skip"),
            }
            tokio::time::sleep(BROADCAST_PACING).await;
        }
        info!(delivered, total, "broadcast finished");
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, event: NotifyEvent) -> Result<(), NotifyError> {
        match event {
            NotifyEvent::WithdrawalRequested {
                username,
                user_id,
                withdrawal_id,
                amount,
            } => {
                let text = format!(
                    "💸 <b>New withdrawal request</b>\n\n\
                     User: @{} (id {})\n\
                     Amount: {} ⭐\n\
                     Request #{}",
                    html::escape(&username),
                    user_id,
                    amount,
                    withdrawal_id
                );
                self.send_admins(&text).await
            }
            NotifyEvent::WithdrawalApproved { telegram_id, amount } => {
                let text = format!(
                    "✅ Your withdrawal of <b>{} stars</b> has been approved!",
                    amount
                );
                self.send(telegram_id, &text).await
            }
            NotifyEvent::WithdrawalRejected {
                telegram_id,
                amount,
                reason,
            } => {
                let text = format!(
                    "❌ Your withdrawal of <b>{} stars</b> was rejected.\n\
                     Reason: {}",
                    amount,
                    html::escape(&reason)
                );
                self.send(telegram_id, &text).await
            }
            NotifyEvent::ReferralBonus {
                telegram_id,
                referral_name,
                earnings,
                task_title,
            } => {
                let text = format!(
                    "🎉 You earned <b>{} stars</b>! Your referral {} completed \"{}\".",
                    earnings,
                    html::escape(&referral_name),
                    html::escape(&task_title)
                );
                self.send(telegram_id, &text).await
            }
            NotifyEvent::NewTask { title, reward, .. } => {
                let text = format!(
                    "🆕 New task available: <b>{}</b> (+{} ⭐)",
                    html::escape(&title),
                    reward
                );
                self.broadcast(&text).await
            }
        }
    }
}
