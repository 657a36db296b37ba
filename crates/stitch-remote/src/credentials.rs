//! Per-call credentials for Drive uploads.

use std::fmt;

use gcp_auth::{CustomServiceAccount, TokenProvider};
use tracing::debug;

use crate::config::DRIVE_SCOPE;
use crate::error::{RemoteError, RemoteResult};

/// Credentials supplied with a single Drive upload.
///
/// Resolved to an access token at the start of the upload and dropped with
/// the job; nothing is cached across calls.
#[derive(Clone)]
pub enum DriveCredentials {
    /// Service account key JSON, exchanged for a token via `gcp_auth`
    ServiceAccount(String),
    /// Ready-made bearer token
    AccessToken(String),
}

impl fmt::Debug for DriveCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveCredentials::ServiceAccount(_) => f.write_str("ServiceAccount(<redacted>)"),
            DriveCredentials::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
        }
    }
}

impl DriveCredentials {
    /// Obtain a bearer token for the Drive upload scope.
    pub async fn access_token(&self) -> RemoteResult<String> {
        match self {
            DriveCredentials::AccessToken(token) => Ok(token.clone()),
            DriveCredentials::ServiceAccount(json) => {
                let account = CustomServiceAccount::from_json(json).map_err(|e| {
                    RemoteError::auth(format!("Failed to load service account: {}", e))
                })?;
                let token = account.token(&[DRIVE_SCOPE]).await.map_err(|e| {
                    RemoteError::auth(format!("Failed to obtain auth token: {}", e))
                })?;
                debug!("Obtained Drive token from service account");
                Ok(token.as_str().to_string())
            }
        }
    }
}
