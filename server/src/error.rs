use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use backend_core::BackendError;
use serde::Serialize;
use thiserror::Error;

/// API Error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported model '{0}' and no default reference audio is configured")]
    UnsupportedModel(String),

    #[error("Inference backend is not connected")]
    ServiceUnavailable,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Error response structure
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::UnsupportedModel(model) => (
                StatusCode::BAD_REQUEST,
                format!("Unsupported model '{model}' and no default reference audio is configured"),
            ),
            ApiError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Inference backend is not connected".to_string(),
            ),
            ApiError::Backend(e) => {
                tracing::error!("Backend error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Internal server error: {e}"))
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}
