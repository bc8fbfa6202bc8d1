use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ccip_envelope::EnvelopeError;
use serde_json::json;
use thiserror::Error;

/// Everything the lookup pipeline can fail with, mapped onto the HTTP
/// surface. Validation and rate-limit failures short-circuit before any
/// compute or signing happens.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Validation failed")]
    Validation(Vec<String>),

    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },

    #[error("Unknown compute function: {0}")]
    UnknownMethod(String),

    #[error("compute function failed: {0}")]
    Compute(String),

    #[error(transparent)]
    Encoding(#[from] EnvelopeError),

    #[error("internal error")]
    Internal,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            GatewayError::Validation(details) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Validation failed", "details": details }),
            ),
            GatewayError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "error":      "Rate limit exceeded",
                    "retryAfter": retry_after,
                    "remaining":  0,
                }),
            ),
            GatewayError::UnknownMethod(ref name) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": format!("Unknown compute function: {name}") }),
            ),
            GatewayError::Compute(ref message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": message }),
            ),
            GatewayError::Encoding(ref e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": e.to_string() }),
            ),
            GatewayError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal server error" }),
            ),
        };
        (status, Json(body)).into_response()
    }
}
