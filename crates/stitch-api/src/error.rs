//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use stitch_queue::{LedgerError, QueueError};
use stitch_remote::RemoteError;
use stitch_storage::StorageError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("{0}")]
    Remote(#[from] RemoteError),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Storage(StorageError::InvalidName(_)) => StatusCode::BAD_REQUEST,
            ApiError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Queue(QueueError::InputNotFound(_)) => StatusCode::BAD_REQUEST,
            ApiError::Queue(QueueError::QueueClosed) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Ledger(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Remote(
                RemoteError::Config(_) | RemoteError::InvalidState(_) | RemoteError::Json(_),
            ) => StatusCode::BAD_REQUEST,
            ApiError::Remote(RemoteError::MissingCredentials(_) | RemoteError::Auth(_)) => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Remote(RemoteError::Upload { .. } | RemoteError::Network(_)) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn is_internal(&self) -> bool {
        self.status_code().is_server_error()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = if self.is_internal()
            && std::env::var("ENVIRONMENT").unwrap_or_default() == "production"
        {
            "An internal error occurred".to_string()
        } else {
            match &self {
                ApiError::Ledger(e) if e.is_not_found() => "Upload not found".to_string(),
                _ => self.to_string(),
            }
        };

        if self.is_internal() {
            tracing::error!(status = %status, error = %self, "Request failed");
        }

        (status, Json(ErrorResponse { detail })).into_response()
    }
}
