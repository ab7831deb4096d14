//! Withdrawal requests and history.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use stardrop_common::Withdrawal;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WithdrawalReq {
    pub amount: i64,
}

/// POST /api/withdrawals - request a withdrawal of the given amount
pub async fn request(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<WithdrawalReq>,
) -> Result<(StatusCode, Json<Withdrawal>), ApiError> {
    let withdrawal = state
        .engine
        .request_withdrawal(user.0, payload.amount)
        .await?;
    Ok((StatusCode::CREATED, Json(withdrawal)))
}

/// GET /api/withdrawals - the caller's withdrawal history, newest first
pub async fn history(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Withdrawal>>, ApiError> {
    Ok(Json(state.engine.withdrawals_for_user(user.0).await?))
}
