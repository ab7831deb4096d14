//! Outbound HTTP clients toward the bot backend.
//!
//! The bot backend owns the Telegram connection; the API reaches it over
//! plain HTTP. [`HttpVerifier`] asks it whether a user is still in a
//! channel, [`HttpNotifier`] forwards [`NotifyEvent`]s for delivery. Both
//! share one `reqwest` client with the configured verification timeout.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use stardrop_common::{
    Config, MembershipVerifier, Notifier, NotifyError, NotifyEvent, VerifierError,
};

#[derive(Debug, Serialize)]
struct VerifyChannelReq<'a> {
    telegram_id: i64,
    channel: &'a str,
}

#[derive(Debug, Deserialize)]
struct VerifyResp {
    verified: bool,
}

/// Channel-membership verifier backed by the bot backend's
/// `POST /verify/channel`. Timeouts surface as [`VerifierError::Timeout`];
/// the caller decides what an inconclusive check means.
pub struct HttpVerifier {
    client: reqwest::Client,
    base_url: String,
}

impl HttpVerifier {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.verify_timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: config.bot_backend_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl MembershipVerifier for HttpVerifier {
    async fn is_channel_member(
        &self,
        telegram_id: i64,
        channel: &str,
    ) -> Result<bool, VerifierError> {
        let url = format!("{}/verify/channel", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&VerifyChannelReq { telegram_id, channel })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VerifierError::Timeout
                } else {
                    VerifierError::Unavailable(e.to_string())
                }
            })?;
        let resp = resp
            .error_for_status()
            .map_err(|e| VerifierError::Unavailable(e.to_string()))?;
        let body: VerifyResp = resp
            .json()
            .await
            .map_err(|e| VerifierError::Unavailable(e.to_string()))?;
        Ok(body.verified)
    }
}

/// Notifier that forwards events to the bot backend's `POST /notify`.
pub struct HttpNotifier {
    client: reqwest::Client,
    base_url: String,
}

impl HttpNotifier {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.verify_timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: config.bot_backend_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, event: NotifyEvent) -> Result<(), NotifyError> {
        let url = format!("{}/notify", self.base_url);
        self.client
            .post(&url)
            .json(&event)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| NotifyError::Send(e.to_string()))?;
        Ok(())
    }
}
