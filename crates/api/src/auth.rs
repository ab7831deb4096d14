//! Identity extractors.
//!
//! The API sits behind a gateway that validates the Telegram Mini-App
//! init data and injects two headers: `x-user-id` (internal user id) and
//! `x-telegram-id` (Telegram account id). Admin routes require the latter
//! to be in the configured admin set; it is a set of principals, never a
//! single hardcoded id.

use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated Mini-App user, by internal id.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub i64);

/// An authenticated admin principal, by Telegram id.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub i64);

fn header_id(parts: &Parts, name: &str) -> Result<i64, ApiError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ApiError::Unauthorized(format!("missing or invalid {} header", name)))
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(AuthUser(header_id(parts, "x-user-id")?))
    }
}

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let telegram_id = header_id(parts, "x-telegram-id")?;
        if !state.config.is_admin(telegram_id) {
            return Err(ApiError::Forbidden);
        }
        Ok(AdminUser(telegram_id))
    }
}
