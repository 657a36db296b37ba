//! Remote upload configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{RemoteError, RemoteResult};

/// Granularity Google requires for every non-final chunk.
pub const CHUNK_GRANULARITY: usize = 256 * 1024;

/// Default chunk size (256 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = CHUNK_GRANULARITY;

/// Scope requested for Drive uploads with a service account.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Scope requested for YouTube uploads.
pub const YOUTUBE_UPLOAD_SCOPE: &str = "https://www.googleapis.com/auth/youtube.upload";

/// Remote upload configuration.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Bytes per PUT; a non-zero multiple of 256 KiB
    pub chunk_size: usize,
    /// How many times a broken session is queried and resumed
    pub max_resume_attempts: u32,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Drive resumable upload endpoint
    pub drive_upload_url: String,
    /// YouTube resumable upload endpoint
    pub youtube_upload_url: String,
    /// OAuth redirect URI; `{application}` is replaced per application
    pub oauth_redirect_uri: String,
    /// Directory holding OAuth client secrets and tokens
    pub token_dir: PathBuf,
    /// How long a consent flow waits for its callback
    pub oauth_state_ttl: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_resume_attempts: 3,
            request_timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(10),
            drive_upload_url: "https://www.googleapis.com/upload/drive/v3/files".to_string(),
            youtube_upload_url: "https://www.googleapis.com/upload/youtube/v3/videos".to_string(),
            oauth_redirect_uri:
                "http://localhost:8000/api/v1/youtube/{application}/oauth2callback".to_string(),
            token_dir: PathBuf::from("storage/credentials"),
            oauth_state_ttl: Duration::from_secs(600),
        }
    }
}

impl RemoteConfig {
    /// Create config from environment variables.
    pub fn from_env() -> RemoteResult<Self> {
        let defaults = Self::default();

        let config = Self {
            chunk_size: std::env::var("UPLOAD_CHUNK_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.chunk_size),
            max_resume_attempts: std::env::var("UPLOAD_MAX_RESUME_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_resume_attempts),
            request_timeout: std::env::var("UPLOAD_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            connect_timeout: defaults.connect_timeout,
            drive_upload_url: std::env::var("DRIVE_UPLOAD_URL")
                .unwrap_or(defaults.drive_upload_url),
            youtube_upload_url: std::env::var("YOUTUBE_UPLOAD_URL")
                .unwrap_or(defaults.youtube_upload_url),
            oauth_redirect_uri: std::env::var("GOOGLE_OAUTH_REDIRECT_URI")
                .unwrap_or(defaults.oauth_redirect_uri),
            token_dir: std::env::var("GOOGLE_TOKEN_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.token_dir),
            oauth_state_ttl: std::env::var("OAUTH_STATE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.oauth_state_ttl),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the upload protocol cannot work with.
    pub fn validate(&self) -> RemoteResult<()> {
        validate_chunk_size(self.chunk_size)
    }

    /// Redirect URI for one application.
    pub fn redirect_uri_for(&self, application: &str) -> String {
        self.oauth_redirect_uri.replace("{application}", application)
    }
}

/// Chunk sizes must be non-zero multiples of 256 KiB.
pub fn validate_chunk_size(chunk_size: usize) -> RemoteResult<()> {
    if chunk_size == 0 || chunk_size % CHUNK_GRANULARITY != 0 {
        return Err(RemoteError::config(format!(
            "chunk size {} is not a non-zero multiple of {}",
            chunk_size, CHUNK_GRANULARITY
        )));
    }
    Ok(())
}
