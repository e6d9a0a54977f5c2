// HTTP surface over the credential lifecycle core

pub mod auth;
mod error;
pub mod utility;

pub use auth::{create_auth_router, AuthAppState};
pub use utility::{create_utility_router, UtilityAppState};

use crate::auth::AuthManager;
use crate::cache::CacheTtls;
use crate::provider::SpotifyApiClient;
use axum::Router;
use std::sync::Arc;

/// All routes served by the binary.
pub fn create_app(auth: Arc<AuthManager>, client: SpotifyApiClient, ttls: CacheTtls) -> Router {
    create_auth_router(AuthAppState { auth: auth.clone() }).merge(create_utility_router(
        UtilityAppState { auth, client, ttls },
    ))
}
