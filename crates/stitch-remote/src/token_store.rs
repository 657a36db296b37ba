//! Durable per-application OAuth token storage.
//!
//! Files live under the token directory as
//! `{application}_google_credentials.json` (token) and
//! `{application}_google_secret.json` (client secrets).

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use stitch_storage::fs_utils::write_atomic;
use tracing::debug;

use crate::error::{RemoteError, RemoteResult};

/// Tokens are refreshed this long before they expire.
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// OAuth token persisted after the consent callback.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl fmt::Debug for StoredToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredToken")
            .field("expires_at", &self.expires_at)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl StoredToken {
    /// True once the token is within the refresh margin of expiry.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) >= self.expires_at
    }
}

/// File-backed token store.
#[derive(Debug, Clone)]
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn token_path(&self, application: &str) -> RemoteResult<PathBuf> {
        validate_application(application)?;
        Ok(self
            .dir
            .join(format!("{}_google_credentials.json", application)))
    }

    fn secrets_path(&self, application: &str) -> RemoteResult<PathBuf> {
        validate_application(application)?;
        Ok(self.dir.join(format!("{}_google_secret.json", application)))
    }

    /// Load the token for `application`, if one was stored.
    pub async fn load(&self, application: &str) -> RemoteResult<Option<StoredToken>> {
        let path = self.token_path(application)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist the token for `application`.
    pub async fn save(&self, application: &str, token: &StoredToken) -> RemoteResult<()> {
        let path = self.token_path(application)?;
        let bytes = serde_json::to_vec_pretty(token)?;
        write_atomic(&path, &bytes).await?;
        debug!(application, "Stored OAuth token");
        Ok(())
    }

    /// Persist the client secrets JSON for `application`.
    pub async fn save_secrets(
        &self,
        application: &str,
        secrets: &serde_json::Value,
    ) -> RemoteResult<()> {
        let path = self.secrets_path(application)?;
        let bytes = serde_json::to_vec_pretty(secrets)?;
        write_atomic(&path, &bytes).await?;
        Ok(())
    }
}

/// Application names become file name prefixes.
pub fn validate_application(application: &str) -> RemoteResult<()> {
    let valid = !application.is_empty()
        && application.len() <= 64
        && application
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(RemoteError::config(format!(
            "invalid application name: {application:?}"
        )))
    }
}
