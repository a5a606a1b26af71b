use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Standard error response body. Every failure origin — local validation,
/// upstream HTTP errors, unexpected internals — produces this envelope.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Short error category
    pub error: String,
    /// Human-readable detail message
    pub details: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Bad input shape or range (400).
    #[error("{0}")]
    Validation(String),

    /// Required server configuration is missing (500).
    #[error("{0}")]
    Configuration(String),

    /// Third-party provider returned non-2xx or failed at the network level (502).
    #[error("{0}")]
    Upstream(String),

    /// Uploaded content could not be parsed (400).
    #[error("{0}")]
    DataFormat(String),

    /// Referenced resource does not exist (404).
    #[error("{0}")]
    NotFound(String),

    /// Credentials or token rejected (401).
    #[error("{0}")]
    Unauthorized(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "Invalid request", msg.clone())
            }
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server configuration error",
                msg.clone(),
            ),
            AppError::Upstream(msg) => {
                (StatusCode::BAD_GATEWAY, "Upstream service error", msg.clone())
            }
            AppError::DataFormat(msg) => {
                (StatusCode::BAD_REQUEST, "File validation error", msg.clone())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", msg.clone()),
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "Authentication failed", msg.clone())
            }
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal database error",
                    "The request could not be completed".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred",
                    msg.clone(),
                )
            }
        };

        (
            status,
            axum::Json(ErrorResponse {
                error: error.to_string(),
                details,
            }),
        )
            .into_response()
    }
}

impl From<crate::services::ingest::IngestError> for AppError {
    fn from(err: crate::services::ingest::IngestError) -> Self {
        use crate::services::ingest::IngestError;
        match &err {
            IngestError::UnsupportedFormat(_) | IngestError::FileTooLarge { .. } => {
                AppError::Validation(err.to_string())
            }
            _ => AppError::DataFormat(err.to_string()),
        }
    }
}
