pub mod compositions;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod system;
pub mod tasks;

pub use routes::create_router;

use axum::http::StatusCode;
use axum::Json;
use mixdown_core::EngineError;
use serde::Serialize;

/// Error response body shared by all endpoints.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Map engine errors onto HTTP status codes: validation → 400, admission
/// rejection → 503, unknown id → 404.
pub fn engine_error(error: EngineError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &error {
        EngineError::Validation(_) => StatusCode::BAD_REQUEST,
        EngineError::ResourceExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::TranscriberUnavailable => StatusCode::NOT_IMPLEMENTED,
    };
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}
