use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::scoring_client::ScoringError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upstream scoring call timed out")]
    UpstreamTimeout,

    #[error("Upstream scoring service error (status {status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Scoring workflow failed: {0}")]
    Workflow(String),

    #[error("{0}")]
    EmptyResult(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ScoringError> for AppError {
    fn from(err: ScoringError) -> Self {
        match err {
            ScoringError::Timeout => AppError::UpstreamTimeout,
            ScoringError::Upstream { status, body } => AppError::Upstream {
                status,
                message: body,
            },
            ScoringError::Http(e) => AppError::Upstream {
                status: 502,
                message: e.to_string(),
            },
            ScoringError::Workflow(msg) => AppError::Workflow(msg),
            ScoringError::Parse(msg) => {
                AppError::Workflow(format!("malformed workflow output: {msg}"))
            }
            ScoringError::Empty { hint } => AppError::EmptyResult(hint),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UpstreamTimeout => (
                StatusCode::REQUEST_TIMEOUT,
                "UPSTREAM_TIMEOUT",
                "The scoring service did not respond in time".to_string(),
            ),
            AppError::Upstream { status, message } => {
                tracing::error!("Upstream scoring error ({status}): {message}");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_ERROR",
                    "The scoring service returned an error".to_string(),
                )
            }
            AppError::Workflow(msg) => {
                tracing::error!("Workflow error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "WORKFLOW_ERROR",
                    msg.clone(),
                )
            }
            // The hint is user-facing: an empty model output usually points at
            // an upstream problem (quota exhaustion), not a bad resume.
            AppError::EmptyResult(hint) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "EMPTY_RESULT",
                hint.clone(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
