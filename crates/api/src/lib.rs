//! # Stardrop API backend
//!
//! REST surface consumed by the Telegram Mini-App. All domain logic lives
//! in `stardrop_engine`; this crate only does HTTP: extraction, auth
//! headers, error mapping and the outbound clients that reach the bot
//! backend.
//!
//! ## Routes
//!
//! | Route | Method | Description |
//! |-------|--------|-------------|
//! | `/health` | GET | Liveness probe |
//! | `/api/tasks` | GET | Active tasks with completion flags |
//! | `/api/tasks/{id}/verify` | POST | Verify & complete, returns reward |
//! | `/api/banners` | GET | Active banners |
//! | `/api/withdrawals` | GET/POST | History / new request |
//! | `/api/referrals/*` | GET | Stats, link, transactions |
//! | `/api/admin/*` | * | Task mgmt, adjudication, stats, tree, banners |
//!
//! Authentication is upstream's problem: the gateway injects `x-user-id`
//! (internal user id) and `x-telegram-id`; admin routes additionally check
//! the Telegram id against the configured admin set.

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

pub mod auth;
pub mod clients;
pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

/// Build the full application router over the shared state.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", handlers::api_router())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}
