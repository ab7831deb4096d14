//! Route handlers, grouped by resource.

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::state::AppState;

pub mod admin;
pub mod banners;
pub mod referrals;
pub mod tasks;
pub mod users;
pub mod withdrawals;

/// Everything under `/api`.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", get(tasks::list))
        .route("/tasks/{id}/verify", post(tasks::verify))
        .route("/user/profile", get(users::profile))
        .route("/banners", get(banners::list))
        .route("/withdrawals", post(withdrawals::request).get(withdrawals::history))
        .route("/referrals/stats", get(referrals::stats))
        .route("/referrals/link", get(referrals::link))
        .route("/referrals/transactions", get(referrals::transactions))
        .route("/admin/tasks", get(admin::list_tasks).post(admin::create_task))
        .route("/admin/tasks/{id}", put(admin::update_task))
        .route("/admin/tasks/{id}/close", post(admin::close_task))
        .route("/admin/withdrawals", get(admin::pending_withdrawals))
        .route("/admin/withdrawals/{id}/approve", post(admin::approve_withdrawal))
        .route("/admin/withdrawals/{id}/reject", post(admin::reject_withdrawal))
        .route("/admin/stats", get(admin::stats))
        .route("/admin/referrals/tree/{user_id}", get(admin::referral_tree))
        .route("/admin/banners", get(admin::list_banners).post(admin::create_banner))
        .route(
            "/admin/banners/{id}",
            put(admin::update_banner).delete(admin::delete_banner),
        )
}
