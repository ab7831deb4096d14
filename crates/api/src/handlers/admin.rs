//! Admin surface: task management, withdrawal adjudication, stats, the
//! referral tree and banner management. Every handler requires an
//! [`AdminUser`] principal.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use stardrop_common::{
    AdminStats, Banner, BannerPatch, NewBanner, NewTask, ReferralNode, Task, TaskPatch, User,
    Withdrawal,
};

use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::state::AppState;

// ════════════════════════════════════════════════════════════════════════════
// TASKS
// ════════════════════════════════════════════════════════════════════════════

/// GET /api/admin/tasks - all tasks including inactive
pub async fn list_tasks(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(state.engine.all_tasks().await?))
}

/// POST /api/admin/tasks
pub async fn create_task(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let task = state.engine.create_task(payload).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// PUT /api/admin/tasks/{id}
pub async fn update_task(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<i64>,
    Json(payload): Json<TaskPatch>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(state.engine.update_task(task_id, payload).await?))
}

/// POST /api/admin/tasks/{id}/close
pub async fn close_task(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<i64>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(state.engine.close_task(task_id).await?))
}

// ════════════════════════════════════════════════════════════════════════════
// WITHDRAWALS
// ════════════════════════════════════════════════════════════════════════════

/// One row of the pending queue, with the requesting user inlined.
#[derive(Debug, Serialize)]
pub struct PendingWithdrawal {
    #[serde(flatten)]
    pub withdrawal: Withdrawal,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct RejectReq {
    pub reason: String,
}

/// GET /api/admin/withdrawals - the pending queue, oldest first
pub async fn pending_withdrawals(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PendingWithdrawal>>, ApiError> {
    let queue = state.engine.pending_withdrawals().await?;
    Ok(Json(
        queue
            .into_iter()
            .map(|(withdrawal, user)| PendingWithdrawal { withdrawal, user })
            .collect(),
    ))
}

/// POST /api/admin/withdrawals/{id}/approve
pub async fn approve_withdrawal(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(withdrawal_id): Path<i64>,
) -> Result<Json<Withdrawal>, ApiError> {
    Ok(Json(state.engine.approve_withdrawal(withdrawal_id).await?))
}

/// POST /api/admin/withdrawals/{id}/reject
pub async fn reject_withdrawal(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(withdrawal_id): Path<i64>,
    Json(payload): Json<RejectReq>,
) -> Result<Json<Withdrawal>, ApiError> {
    Ok(Json(
        state
            .engine
            .reject_withdrawal(withdrawal_id, &payload.reason)
            .await?,
    ))
}

// ════════════════════════════════════════════════════════════════════════════
// STATS / REFERRAL TREE / BANNERS
// ════════════════════════════════════════════════════════════════════════════

/// GET /api/admin/stats
pub async fn stats(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<AdminStats>, ApiError> {
    Ok(Json(state.engine.admin_stats().await?))
}

/// GET /api/admin/referrals/tree/{user_id}
pub async fn referral_tree(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<ReferralNode>, ApiError> {
    Ok(Json(state.engine.referral_tree(user_id).await?))
}

/// GET /api/admin/banners - all banners including inactive
pub async fn list_banners(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Banner>>, ApiError> {
    Ok(Json(state.engine.all_banners().await?))
}

/// POST /api/admin/banners
pub async fn create_banner(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewBanner>,
) -> Result<(StatusCode, Json<Banner>), ApiError> {
    let banner = state.engine.create_banner(payload).await?;
    Ok((StatusCode::CREATED, Json(banner)))
}

/// PUT /api/admin/banners/{id}
pub async fn update_banner(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(banner_id): Path<i64>,
    Json(payload): Json<BannerPatch>,
) -> Result<Json<Banner>, ApiError> {
    Ok(Json(state.engine.update_banner(banner_id, payload).await?))
}

/// DELETE /api/admin/banners/{id}
pub async fn delete_banner(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(banner_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state.engine.delete_banner(banner_id).await?;
    Ok(Json(json!({"ok": true})))
}
