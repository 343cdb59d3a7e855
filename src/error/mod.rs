use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::message::ValidationError;
use crate::queue::QueueError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Malformed request shape or unknown filter value
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_)
            | AppError::Queue(_)
            | AppError::Store(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let log_message = self.to_string();

        let client_message = match &self {
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Validation(e) => e.message().to_string(),
            AppError::Queue(_) if is_production() => "Service temporarily unavailable".to_string(),
            AppError::Config(_) | AppError::Store(_) | AppError::Internal(_)
                if is_production() =>
            {
                "Internal server error".to_string()
            }
            _ => log_message.clone(),
        };

        if status.is_server_error() {
            tracing::error!(
                status = %status.as_u16(),
                message = %log_message,
                "API error"
            );
        } else {
            tracing::debug!(
                status = %status.as_u16(),
                message = %log_message,
                "Rejected request"
            );
        }

        (status, Json(ErrorResponse { error: client_message })).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
