//! Referral stats, link and earnings history.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use stardrop_common::{ReferralStats, Transaction};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ReferralLinkResponse {
    pub link: String,
}

/// GET /api/referrals/stats
pub async fn stats(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReferralStats>, ApiError> {
    Ok(Json(state.engine.referral_stats(user.0).await?))
}

/// GET /api/referrals/link - the caller's shareable referral deep link
pub async fn link(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReferralLinkResponse>, ApiError> {
    let user = state.engine.user_by_id(user.0).await?;
    Ok(Json(ReferralLinkResponse {
        link: state.engine.referral_link(user.telegram_id),
    }))
}

/// GET /api/referrals/transactions - referral earnings, newest first
pub async fn transactions(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    Ok(Json(state.engine.referral_transactions(user.0).await?))
}
