//! `/start` handling: registration, referral capture and bot-task
//! activation deep links.
//!
//! Two deep-link shapes reach us:
//!
//! - `/start <telegram_id>` — a referral link; the payload is the
//!   referrer's Telegram id.
//! - `/start task_{task_id}_user_{user_id}` — a bot-task activation link;
//!   the Mini-App sends the user here so the click can be recorded and
//!   later verified.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, WebAppInfo};
use tracing::{info, warn};

use stardrop_engine::{users::RegisterUser, Engine};

/// Parsed `/start` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPayload {
    Plain,
    /// Referrer's Telegram id.
    Referral(i64),
    /// Bot-task activation: `task_{task_id}_user_{user_id}`.
    Activation { task_id: i64, user_id: i64 },
}

pub fn parse_start_payload(arg: &str) -> StartPayload {
    let arg = arg.trim();
    if arg.is_empty() {
        return StartPayload::Plain;
    }
    if let Some(rest) = arg.strip_prefix("task_") {
        if let Some((task, user)) = rest.split_once("_user_") {
            if let (Ok(task_id), Ok(user_id)) = (task.parse(), user.parse()) {
                return StartPayload::Activation { task_id, user_id };
            }
        }
        return StartPayload::Plain;
    }
    match arg.parse() {
        Ok(referrer) => StartPayload::Referral(referrer),
        Err(_) => StartPayload::Plain,
    }
}

/// Handle a `/start` message end to end.
pub async fn handle_start(
    bot: Bot,
    msg: Message,
    payload: String,
    engine: Arc<Engine>,
    webapp_url: Option<String>,
) -> ResponseResult<()> {
    let Some(from) = msg.from() else {
        return Ok(());
    };

    let payload = parse_start_payload(&payload);
    let referrer_code = match payload {
        StartPayload::Referral(code) => Some(code),
        _ => None,
    };

    let registered = engine
        .register_or_get(RegisterUser {
            telegram_id: from.id.0 as i64,
            username: from.username.clone(),
            first_name: from.first_name.clone(),
            last_name: from.last_name.clone(),
            avatar_url: None,
            referrer_code,
        })
        .await;
    let user = match registered {
        Ok(user) => user,
        Err(e) => {
            warn!(telegram_id = from.id.0, error = %e, "registration failed");
            bot.send_message(msg.chat.id, "Something went wrong, please try again later.")
                .await?;
            return Ok(());
        }
    };

    if let StartPayload::Activation { task_id, user_id } = payload {
        // The link carries the Mini-App user id; trust it only when it
        // matches the account that clicked.
        if user_id == user.id {
            if let Err(e) = engine.record_activation(user.id, task_id).await {
                warn!(user_id = user.id, task_id, error = %e, "activation not recorded");
            }
        } else {
            warn!(
                link_user_id = user_id,
                actual_user_id = user.id,
                task_id,
                "activation link user mismatch, ignoring"
            );
        }
    }

    info!(user_id = user.id, telegram_id = user.telegram_id, "start handled");

    let text = format!(
        "Welcome, {}! 👋\n\n\
         Complete tasks, earn stars and invite friends for a bonus on \
         everything they earn.",
        from.first_name
    );
    let mut request = bot.send_message(msg.chat.id, text);
    if let Some(url) = webapp_url.as_deref().and_then(|u| u.parse().ok()) {
        let button = InlineKeyboardButton::web_app("Open Stardrop", WebAppInfo { url });
        request = request.reply_markup(InlineKeyboardMarkup::new([[button]]));
    }
    request.await?;
    Ok(())
}
