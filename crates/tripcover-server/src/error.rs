use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use tripcover_core::CoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Core(err) => match err {
                CoreError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
                CoreError::Capacity { .. } => (StatusCode::CONFLICT, err.to_string()),
                CoreError::NotEligible(_) => (StatusCode::CONFLICT, err.to_string()),
                CoreError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                CoreError::Storage(e) => {
                    tracing::error!(error = %e, "Storage failure");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Storage error".to_string(),
                    )
                }
            },
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
