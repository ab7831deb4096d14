//! The bot backend's HTTP surface, consumed by the API backend.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use stardrop_common::{MembershipVerifier, Notifier, NotifyEvent, Store};

use crate::notify::TelegramNotifier;
use crate::verify::TelegramVerifier;

pub struct BotState {
    pub verifier: TelegramVerifier,
    pub notifier: Arc<TelegramNotifier>,
    pub store: Arc<dyn Store>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyChannelReq {
    pub telegram_id: i64,
    pub channel: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyBotReq {
    pub user_id: i64,
    pub task_id: i64,
}

pub fn router(state: Arc<BotState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/verify/channel", post(verify_channel))
        .route("/verify/bot", post(verify_bot))
        .route("/notify", post(notify))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// POST /verify/channel - live getChatMember check
async fn verify_channel(
    State(state): State<Arc<BotState>>,
    Json(payload): Json<VerifyChannelReq>,
) -> (StatusCode, Json<Value>) {
    match state
        .verifier
        .is_channel_member(payload.telegram_id, &payload.channel)
        .await
    {
        Ok(verified) => (StatusCode::OK, Json(json!({"verified": verified}))),
        Err(e) => {
            warn!(error = %e, channel = %payload.channel, "channel verification failed");
            (StatusCode::BAD_GATEWAY, Json(json!({"error": e.to_string()})))
        }
    }
}

/// POST /verify/bot - was the activation deep link clicked?
async fn verify_bot(
    State(state): State<Arc<BotState>>,
    Json(payload): Json<VerifyBotReq>,
) -> (StatusCode, Json<Value>) {
    match state
        .store
        .has_activation(payload.user_id, payload.task_id)
        .await
    {
        Ok(verified) => (StatusCode::OK, Json(json!({"verified": verified}))),
        Err(e) => {
            warn!(error = %e, "activation lookup failed");
            (StatusCode::BAD_GATEWAY, Json(json!({"error": e.to_string()})))
        }
    }
}

/// POST /notify - deliver a forwarded event
async fn notify(
    State(state): State<Arc<BotState>>,
    Json(event): Json<NotifyEvent>,
) -> (StatusCode, Json<Value>) {
    match state.notifier.notify(event).await {
        Ok(()) => (StatusCode::OK, Json(json!({"ok": true}))),
        Err(e) => {
            warn!(error = %e, "notification delivery failed");
            (StatusCode::BAD_GATEWAY, Json(json!({"error": e.to_string()})))
        }
    }
}
