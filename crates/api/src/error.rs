//! HTTP error mapping.
//!
//! Every error leaves the API as `{error, message, statusCode}` JSON.
//! User-correctable engine errors keep their message; critical ones are
//! logged in full and surfaced as a generic 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use stardrop_common::EngineError;

/// Error type returned by every handler.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or unparseable identity header.
    Unauthorized(String),
    /// Caller is not in the admin set.
    Forbidden,
    /// Malformed request outside the engine's purview.
    BadRequest(String),
    Engine(EngineError),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Admin access required".to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Engine(e) => {
                if e.is_critical() {
                    // full detail stays in the logs
                    error!(error = %e, "internal error surfaced to HTTP");
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    );
                }
                let status = match e {
                    EngineError::TaskNotFound
                    | EngineError::UserNotFound
                    | EngineError::WithdrawalNotFound => StatusCode::NOT_FOUND,
                    EngineError::NotPending => StatusCode::CONFLICT,
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        let body = json!({
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": message,
            "statusCode": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}
