use super::error::AppError;
use crate::auth::AuthManager;
use crate::cache::CacheTtls;
use crate::provider::SpotifyApiClient;
use axum::{extract::State, response::Json, routing::get, Router};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const PROFILE_CACHE_KEY: &str = "current_user_profile";

/// Shared state for health and profile endpoints
#[derive(Clone)]
pub struct UtilityAppState {
    pub auth: Arc<AuthManager>,
    pub client: SpotifyApiClient,
    pub ttls: CacheTtls,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    authenticated: bool,
    authorization_available: bool,
    cache_entries: usize,
}

pub fn create_utility_router(state: UtilityAppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/me", get(current_user))
        .with_state(Arc::new(state))
}

/// GET /health
async fn health(State(state): State<Arc<UtilityAppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        authenticated: state.auth.state().is_authenticated(),
        authorization_available: state.auth.authorization_available(),
        cache_entries: state.auth.cache().len(),
    })
}

/// GET /me
///
/// Profile of the connected account, served from cache for the medium tier.
async fn current_user(State(state): State<Arc<UtilityAppState>>) -> Result<Json<Value>, AppError> {
    let token = state.auth.usable_token().await?;

    if let Some(profile) = state
        .auth
        .cache()
        .get::<Value>(PROFILE_CACHE_KEY, state.ttls.medium)
    {
        debug!("Serving profile from cache");
        return Ok(Json(profile));
    }

    let client = &state.client;
    let token = token.as_str();
    let profile = state
        .auth
        .executor()
        .execute(move || client.get_json(token, "/me"))
        .await?;

    state
        .auth
        .cache()
        .set_with_ttl(PROFILE_CACHE_KEY, &profile, state.ttls.medium);
    Ok(Json(profile))
}
