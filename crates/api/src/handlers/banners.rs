//! Public banner listing.

use std::sync::Arc;

use axum::{extract::State, Json};

use stardrop_common::Banner;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/banners - active banners in carousel order
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Banner>>, ApiError> {
    Ok(Json(state.engine.active_banners().await?))
}
