//! Authorization endpoints.
//!
//! Implements the authorization code flow for the single Spotify account:
//! 1. GET /auth/login → authorization URL with a fresh CSRF state
//! 2. User authorizes on Spotify
//! 3. Spotify redirects to /auth/callback?code=..&state=..
//! 4. Code exchanged, credentials persisted, manager `Authenticated`

use super::error::AppError;
use crate::auth::{AuthManager, AuthStatus};
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared state for the authorization API
#[derive(Clone)]
pub struct AuthAppState {
    pub auth: Arc<AuthManager>,
}

/// GET /auth/login query parameters
#[derive(Deserialize, Default)]
pub struct LoginQuery {
    /// Answer with a 307 to the provider instead of JSON
    #[serde(default)]
    redirect: bool,
}

/// Authorization callback query parameters
#[derive(Deserialize)]
pub struct AuthCallback {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    auth_url: String,
    state: String,
}

#[derive(Serialize)]
pub struct ActionResponse {
    success: bool,
    message: String,
}

/// Create authorization API router
pub fn create_auth_router(state: AuthAppState) -> Router {
    Router::new()
        .route("/auth/login", get(login))
        .route("/auth/callback", get(callback))
        .route("/auth/status", get(status))
        .route("/auth/logout", post(logout))
        .route("/auth/cache/clear", post(clear_cache))
        .with_state(Arc::new(state))
}

/// GET /auth/login
async fn login(
    State(state): State<Arc<AuthAppState>>,
    Query(query): Query<LoginQuery>,
) -> Result<Response, AppError> {
    let request = state.auth.begin_authorization()?;

    if query.redirect {
        info!("Redirecting to Spotify authorization");
        return Ok(Redirect::temporary(&request.url).into_response());
    }

    Ok(Json(LoginResponse {
        auth_url: request.url,
        state: request.state,
    })
    .into_response())
}

/// GET /auth/callback
///
/// # Security
/// - State must have been issued by /auth/login and not yet used
/// - Code is only exchanged after the state checks out
async fn callback(
    State(state): State<Arc<AuthAppState>>,
    Query(callback): Query<AuthCallback>,
) -> Result<Json<ActionResponse>, AppError> {
    debug!("Authorization callback received");

    if let Some(error) = callback.error {
        let description = callback
            .error_description
            .unwrap_or_else(|| "Unknown error".to_string());
        warn!(error = %error, description = %description, "Authorization denied");
        return Err(AppError::BadRequest(format!(
            "Authorization failed: {} - {}",
            error, description
        )));
    }

    let code = callback
        .code
        .ok_or_else(|| AppError::BadRequest("Missing 'code' parameter".to_string()))?;
    let csrf_state = callback
        .state
        .ok_or_else(|| AppError::BadRequest("Missing 'state' parameter".to_string()))?;

    if !state.auth.verify_state(&csrf_state) {
        warn!("Invalid or expired authorization state");
        return Err(AppError::InvalidState);
    }

    state.auth.complete_authorization(&code).await?;

    Ok(Json(ActionResponse {
        success: true,
        message: "Spotify account connected".to_string(),
    }))
}

/// GET /auth/status
async fn status(State(state): State<Arc<AuthAppState>>) -> Json<AuthStatus> {
    Json(state.auth.status().await)
}

/// POST /auth/logout
async fn logout(State(state): State<Arc<AuthAppState>>) -> Result<Json<ActionResponse>, AppError> {
    state.auth.try_disconnect().await?;
    Ok(Json(ActionResponse {
        success: true,
        message: "Disconnected from Spotify".to_string(),
    }))
}

/// POST /auth/cache/clear
async fn clear_cache(State(state): State<Arc<AuthAppState>>) -> Json<ActionResponse> {
    let success = state.auth.clear_cache();
    Json(ActionResponse {
        success,
        message: "Cache cleared".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_deserialization() {
        let query = "code=auth_code_123&state=csrf_state_456";
        let callback: AuthCallback = serde_urlencoded::from_str(query).unwrap();
        assert_eq!(callback.code, Some("auth_code_123".to_string()));
        assert_eq!(callback.state, Some("csrf_state_456".to_string()));
        assert_eq!(callback.error, None);

        let query = "error=access_denied&error_description=User+cancelled";
        let callback: AuthCallback = serde_urlencoded::from_str(query).unwrap();
        assert_eq!(callback.error, Some("access_denied".to_string()));
        assert_eq!(callback.error_description, Some("User cancelled".to_string()));
        assert_eq!(callback.code, None);
    }

    #[test]
    fn test_login_query_defaults() {
        let query: LoginQuery = serde_urlencoded::from_str("").unwrap();
        assert!(!query.redirect);

        let query: LoginQuery = serde_urlencoded::from_str("redirect=true").unwrap();
        assert!(query.redirect);
    }
}
