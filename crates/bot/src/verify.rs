//! Channel-membership verification against the live Telegram API.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatMemberStatus, Recipient, UserId};
use teloxide::RequestError;
use tracing::debug;

use stardrop_common::{MembershipVerifier, VerifierError};

/// [`MembershipVerifier`] backed by `getChatMember`. The bot must be an
/// admin of the target channel, otherwise Telegram refuses the query.
#[derive(Clone)]
pub struct TelegramVerifier {
    bot: Bot,
}

impl TelegramVerifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MembershipVerifier for TelegramVerifier {
    async fn is_channel_member(
        &self,
        telegram_id: i64,
        channel: &str,
    ) -> Result<bool, VerifierError> {
        let chat = Recipient::ChannelUsername(format!("@{}", channel.trim_start_matches('@')));
        let member = self
            .bot
            .get_chat_member(chat, UserId(telegram_id as u64))
            .await;
        match member {
            Ok(member) => {
                let subscribed = matches!(
                    member.status(),
                    ChatMemberStatus::Owner
                        | ChatMemberStatus::Administrator
                        | ChatMemberStatus::Member
                );
                debug!(telegram_id, channel, subscribed, "membership checked");
                Ok(subscribed)
            }
            // Telegram answers "user not found" style API errors for users
            // it has never seen in the chat; that is a definitive no.
            Err(RequestError::Api(_)) => Ok(false),
            Err(e) => Err(VerifierError::Unavailable(e.to_string())),
        }
    }
}
