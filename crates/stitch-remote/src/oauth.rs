//! OAuth consent flow and token refresh for YouTube uploads.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use stitch_models::next_id;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{RemoteConfig, YOUTUBE_UPLOAD_SCOPE};
use crate::error::{RemoteError, RemoteResult};
use crate::token_store::{validate_application, StoredToken, TokenStore};

/// Client secrets as downloaded from the Google Cloud console.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl OAuthClientSecrets {
    /// Parse a client secrets file, with or without the `web`/`installed` wrapper.
    pub fn from_json(value: &serde_json::Value) -> RemoteResult<Self> {
        let inner = value
            .get("web")
            .or_else(|| value.get("installed"))
            .unwrap_or(value);
        serde_json::from_value(inner.clone())
            .map_err(|e| RemoteError::config(format!("Invalid client secrets: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

/// A consent flow waiting for its callback.
#[derive(Debug, Clone)]
struct PendingFlow {
    application: String,
    secrets: OAuthClientSecrets,
    redirect_uri: String,
    started: Instant,
}

/// Runs the consent flow and hands out fresh access tokens.
#[derive(Clone)]
pub struct OAuthManager {
    http: Client,
    config: RemoteConfig,
    store: TokenStore,
    pending: Arc<Mutex<HashMap<String, PendingFlow>>>,
}

impl OAuthManager {
    pub fn new(config: RemoteConfig) -> RemoteResult<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(RemoteError::Network)?;

        Ok(Self {
            http,
            store: TokenStore::new(config.token_dir.clone()),
            config,
            pending: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Store the client secrets and return the consent URL.
    pub async fn authorize(
        &self,
        application: &str,
        client_secrets: &str,
    ) -> RemoteResult<String> {
        validate_application(application)?;

        let raw: serde_json::Value = serde_json::from_str(client_secrets)
            .map_err(|e| RemoteError::config(format!("Invalid JSON format: {}", e)))?;
        let secrets = OAuthClientSecrets::from_json(&raw)?;
        self.store.save_secrets(application, &raw).await?;

        let state = next_id();
        let redirect_uri = self.config.redirect_uri_for(application);

        let url = Url::parse_with_params(
            &secrets.auth_uri,
            &[
                ("client_id", secrets.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", YOUTUBE_UPLOAD_SCOPE),
                ("access_type", "offline"),
                ("include_granted_scopes", "true"),
                ("prompt", "consent"),
                ("state", state.as_str()),
            ],
        )
        .map_err(|e| RemoteError::config(format!("Invalid auth_uri: {}", e)))?;

        {
            let ttl = self.config.oauth_state_ttl;
            let mut pending = self.pending.lock().await;
            let before = pending.len();
            pending.retain(|_, flow| flow.started.elapsed() < ttl);
            if pending.len() < before {
                debug!(evicted = before - pending.len(), "Evicted abandoned OAuth flows");
            }
            pending.insert(
                state,
                PendingFlow {
                    application: application.to_string(),
                    secrets,
                    redirect_uri,
                    started: Instant::now(),
                },
            );
        }

        info!(application, "Generated OAuth authorization URL");
        Ok(url.to_string())
    }

    /// Exchange the authorization code and persist the token.
    ///
    /// A state is accepted once; it is removed whether or not the exchange succeeds.
    pub async fn callback(&self, application: &str, state: &str, code: &str) -> RemoteResult<()> {
        let flow = self
            .pending
            .lock()
            .await
            .remove(state)
            .filter(|flow| flow.started.elapsed() < self.config.oauth_state_ttl)
            .ok_or_else(|| RemoteError::InvalidState("Invalid state or session expired.".into()))?;

        if flow.application != application {
            return Err(RemoteError::InvalidState(
                "State belongs to a different application.".into(),
            ));
        }

        let response = self
            .http
            .post(&flow.secrets.token_uri)
            .form(&[
                ("code", code),
                ("client_id", flow.secrets.client_id.as_str()),
                ("client_secret", flow.secrets.client_secret.as_str()),
                ("redirect_uri", flow.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        let token = parse_token_response(response).await?;
        let stored = StoredToken {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in.unwrap_or(3600)),
            token_uri: flow.secrets.token_uri,
            client_id: flow.secrets.client_id,
            client_secret: flow.secrets.client_secret,
            scopes: token
                .scope
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
        };

        self.store.save(application, &stored).await?;
        info!(application, "OAuth authorization complete");
        Ok(())
    }

    /// Current access token for `application`, refreshed and re-saved when expired.
    pub async fn access_token(&self, application: &str) -> RemoteResult<String> {
        let mut token = self.store.load(application).await?.ok_or_else(|| {
            RemoteError::MissingCredentials(
                "YouTube API credentials not found. Please authenticate first.".into(),
            )
        })?;

        if !token.needs_refresh(Utc::now()) {
            return Ok(token.access_token);
        }

        let Some(refresh_token) = token.refresh_token.clone() else {
            warn!(application, "Stored token expired and has no refresh token");
            return Err(RemoteError::auth(
                "Stored token expired and cannot be refreshed. Please authenticate again.",
            ));
        };

        let response = self
            .http
            .post(&token.token_uri)
            .form(&[
                ("client_id", token.client_id.as_str()),
                ("client_secret", token.client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let refreshed = parse_token_response(response).await?;
        token.access_token = refreshed.access_token;
        token.expires_at = Utc::now() + Duration::seconds(refreshed.expires_in.unwrap_or(3600));
        if let Some(rotated) = refreshed.refresh_token {
            token.refresh_token = Some(rotated);
        }

        self.store.save(application, &token).await?;
        info!(application, "Refreshed OAuth token");
        Ok(token.access_token)
    }
}

async fn parse_token_response(response: reqwest::Response) -> RemoteResult<TokenResponse> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RemoteError::auth(format!(
            "Failed to fetch token: {} - {}",
            status.as_u16(),
            body
        )));
    }
    Ok(response.json::<TokenResponse>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secrets_accept_web_wrapper() {
        let raw = serde_json::json!({
            "web": {"client_id": "cid", "client_secret": "cs", "token_uri": "http://t"}
        });
        let secrets = OAuthClientSecrets::from_json(&raw).unwrap();
        assert_eq!(secrets.client_id, "cid");
        assert_eq!(secrets.token_uri, "http://t");
        assert_eq!(secrets.auth_uri, default_auth_uri());
    }

    #[tokio::test]
    async fn test_abandoned_flows_are_evicted() {
        let dir = tempfile::TempDir::new().unwrap();
        let oauth = OAuthManager::new(RemoteConfig {
            token_dir: dir.path().to_path_buf(),
            oauth_state_ttl: std::time::Duration::ZERO,
            ..Default::default()
        })
        .unwrap();
        let secrets = r#"{"web": {"client_id": "cid", "client_secret": "cs"}}"#;

        oauth.authorize("tuneezy", secrets).await.unwrap();
        oauth.authorize("tuneezy", secrets).await.unwrap();

        assert_eq!(oauth.pending.lock().await.len(), 1);
    }

    #[test]
    fn test_secrets_missing_fields() {
        let raw = serde_json::json!({"installed": {"client_id": "cid"}});
        assert!(OAuthClientSecrets::from_json(&raw).is_err());
    }
}
