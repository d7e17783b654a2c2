//! HTTP error mapping for the gateway

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use types::errors::FeedError;

/// Central error type for the gateway application
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl From<FeedError> for AppError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::InstrumentNotFound { .. }
            | FeedError::SubscriptionNotFound { .. }
            | FeedError::SessionNotFound { .. } => AppError::NotFound(err.to_string()),
            FeedError::AlreadyExists { .. } => AppError::Conflict(err.to_string()),
            FeedError::InvalidArgument { .. } | FeedError::PredicateEval { .. } => {
                AppError::BadRequest(err.to_string())
            }
            FeedError::TransportFull { .. } | FeedError::Shutdown => {
                AppError::Internal(anyhow::anyhow!(err))
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND"),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, "ALREADY_EXISTS"),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "INVALID_ARGUMENT"),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "INTERNAL_ERROR",
            ),
        };

        let body = Json(json!({
            "error": code,
            "message": error_message
        }));

        (status, body).into_response()
    }
}
