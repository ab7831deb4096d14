//! The caller's own profile.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use stardrop_common::{Transaction, User};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: User,
    /// Full transaction history, newest first.
    pub transactions: Vec<Transaction>,
}

/// GET /api/user/profile - the caller's user row and transaction history
pub async fn profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = state.engine.user_by_id(user.0).await?;
    let transactions = state.engine.transaction_history(user.0).await?;
    Ok(Json(ProfileResponse {
        user: profile,
        transactions,
    }))
}
