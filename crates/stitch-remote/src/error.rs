//! Remote upload error types.

use thiserror::Error;

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors that can occur while talking to remote storage.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The remote service rejected a request.
    #[error("Upload failed with status {status}: {message}")]
    Upload { status: u16, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Credentials not found: {0}")]
    MissingCredentials(String),

    #[error("Invalid OAuth state: {0}")]
    InvalidState(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] stitch_storage::StorageError),
}

impl RemoteError {
    pub fn upload(status: u16, message: impl Into<String>) -> Self {
        Self::Upload {
            status,
            message: message.into(),
        }
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Check if the upload session is worth resuming after this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Network(_) => true,
            RemoteError::Upload { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
