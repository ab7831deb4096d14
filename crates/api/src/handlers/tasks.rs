//! Task listing and verification.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use stardrop_common::TaskWithStatus;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    /// Stars credited for this completion.
    pub reward: i64,
}

/// GET /api/tasks - active tasks with the caller's completion flags
pub async fn list(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TaskWithStatus>>, ApiError> {
    Ok(Json(state.engine.tasks_for_user(user.0).await?))
}

/// POST /api/tasks/{id}/verify - verify the task was performed and credit
/// the reward
pub async fn verify(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<i64>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let reward = state.engine.verify_and_complete(user.0, task_id).await?;
    Ok(Json(VerifyResponse {
        success: true,
        reward,
    }))
}
