//! YouTube OAuth consent handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use stitch_models::ApiMessage;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizationUrl {
    pub authorization_url: String,
}

/// Query Google sends back to the redirect URI.
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub state: Option<String>,
    pub code: Option<String>,
    pub error: Option<String>,
}

/// Store the application's client secret JSON and return the consent URL.
pub async fn authorize(
    State(state): State<AppState>,
    Path(application): Path<String>,
    client_secrets: String,
) -> ApiResult<Json<AuthorizationUrl>> {
    let authorization_url = state.oauth.authorize(&application, &client_secrets).await?;
    Ok(Json(AuthorizationUrl { authorization_url }))
}

/// Finish the consent flow and persist the token.
pub async fn oauth2callback(
    State(state): State<AppState>,
    Path(application): Path<String>,
    Query(query): Query<OAuthCallbackQuery>,
) -> ApiResult<Json<ApiMessage>> {
    if let Some(error) = query.error {
        return Err(ApiError::bad_request(format!("Authorization denied: {error}")));
    }
    let (Some(oauth_state), Some(code)) = (query.state, query.code) else {
        return Err(ApiError::bad_request("state and code are required"));
    };

    state.oauth.callback(&application, &oauth_state, &code).await?;

    Ok(Json(ApiMessage {
        success: true,
        message: "Authentication successful. You can close this window.".to_string(),
    }))
}
