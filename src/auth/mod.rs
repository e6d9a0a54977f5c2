//! Credential lifecycle: authorization, refresh and disconnect.
//!
//! [`AuthManager`] is the only owner of the in-memory authentication state.
//! It is built once by the process's composition root and shared by handle
//! (`Arc<AuthManager>`) with every handler.
//!
//! # State machine
//!
//! ```text
//!                 complete_authorization(code) ok
//!   ┌─────────────────┐ ───────────────────────────▶ ┌───────────────┐
//!   │ Unauthenticated │                              │ Authenticated │──┐ refresh ok
//!   └─────────────────┘ ◀─────────────────────────── └───────────────┘◀─┘
//!        exchange/refresh failure, missing refresh token, disconnect
//! ```
//!
//! A record is *expiring soon* when less than `refresh_margin` seconds of
//! validity remain. Startup, [`AuthManager::get_usable_token`] and
//! [`AuthManager::is_authenticated`] refresh such records before using them.
//!
//! Concurrent refreshes are not coordinated; the last writer to the
//! credential store wins. The lock below only guards memory safety and is
//! never held across an await.

mod state_manager;

pub use state_manager::StateManager;

use crate::cache::ResponseCache;
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::credentials::{CredentialRecord, CredentialStore};
use crate::error::{Result, SpotifyError};
use crate::provider::{OAuthProvider, SpotifyOAuthClient};
use crate::resilience::{ResilientExecutor, RetryPolicy};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, warn};


/// Default safety margin before expiry at which a token is refreshed.
pub const DEFAULT_REFRESH_MARGIN_SECONDS: i64 = 60;

const DEFAULT_STATE_EXPIRY_SECONDS: i64 = 600;

/// Process-wide authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated(CredentialRecord),
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }
}

/// An authorization URL together with the CSRF state embedded in it.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

/// Snapshot for status reporting. Contains no secrets.
#[derive(Debug, Clone, Serialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub authorization_available: bool,
    pub expires_at: Option<i64>,
    pub has_refresh_token: bool,
    pub scope: Option<String>,
}

/// Credential lifecycle manager.
pub struct AuthManager {
    provider: std::result::Result<Arc<dyn OAuthProvider>, String>,
    store: CredentialStore,
    cache: ResponseCache,
    executor: ResilientExecutor,
    states: StateManager,
    clock: Arc<dyn Clock>,
    refresh_margin: i64,
    state: RwLock<AuthState>,
}

impl AuthManager {
    /// Creates a manager in the `Unauthenticated` state with no OAuth client.
    ///
    /// Attach a provider with [`with_provider`](Self::with_provider) and load
    /// persisted credentials with [`restore`](Self::restore).
    pub fn new(store: CredentialStore, cache: ResponseCache) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            provider: Err("no OAuth client configured".to_string()),
            store,
            cache,
            executor: ResilientExecutor::new(RetryPolicy::default()),
            states: StateManager::new(DEFAULT_STATE_EXPIRY_SECONDS, clock.clone()),
            clock,
            refresh_margin: DEFAULT_REFRESH_MARGIN_SECONDS,
            state: RwLock::new(AuthState::Unauthenticated),
        }
    }

    /// Wires a manager from process configuration.
    ///
    /// Missing client credentials do not fail construction: authorization
    /// operations report [`SpotifyError::Configuration`] instead.
    pub fn from_config(config: &AppConfig, cache: ResponseCache, clock: Arc<dyn Clock>) -> Self {
        let manager = Self::new(CredentialStore::new(&config.storage.token_path), cache)
            .with_clock(clock.clone())
            .with_executor(ResilientExecutor::new(RetryPolicy::from(&config.retry)))
            .with_refresh_margin(config.auth.refresh_margin_seconds)
            .with_state_expiry(config.auth.state_expiry_seconds);

        match SpotifyOAuthClient::with_clock(&config.spotify, clock) {
            Ok(client) => manager.with_provider(Arc::new(client)),
            Err(e) => {
                warn!(error = %e, "Spotify client credentials missing, authorization unavailable");
                manager.without_provider(e.to_string())
            }
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn OAuthProvider>) -> Self {
        self.provider = Ok(provider);
        self
    }

    /// Marks authorization as unavailable, with the reason reported to callers.
    pub fn without_provider(mut self, reason: impl Into<String>) -> Self {
        self.provider = Err(reason.into());
        self
    }

    pub fn with_executor(mut self, executor: ResilientExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.states = StateManager::new(self.states.expiry_seconds(), clock.clone());
        self.clock = clock;
        self
    }

    pub fn with_refresh_margin(mut self, seconds: i64) -> Self {
        self.refresh_margin = seconds;
        self
    }

    pub fn with_state_expiry(mut self, seconds: i64) -> Self {
        self.states = StateManager::new(seconds, self.clock.clone());
        self
    }

    /// Startup transition: seed in-memory state from the credential store,
    /// refreshing a record that is already expiring soon.
    pub async fn restore(&self) -> bool {
        let Some(record) = self.store.load() else {
            info!("No saved credentials, authorization required");
            self.set_state(AuthState::Unauthenticated);
            return false;
        };

        if !self.is_expiring_soon(&record) {
            info!(expires_at = record.expires_at, "Loaded saved credentials");
            self.set_state(AuthState::Authenticated(record));
            return true;
        }

        info!(expires_at = record.expires_at, "Saved credentials expiring, refreshing");
        match self.refresh_record(&record).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Saved credentials unusable, authorization required");
                false
            }
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> AuthState {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_state(&self, next: AuthState) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = next;
    }

    fn is_expiring_soon(&self, record: &CredentialRecord) -> bool {
        record.is_expiring_soon(self.clock.now(), self.refresh_margin)
    }

    fn provider(&self) -> Result<&dyn OAuthProvider> {
        match &self.provider {
            Ok(provider) => Ok(provider.as_ref()),
            Err(reason) => Err(SpotifyError::Configuration(reason.clone())),
        }
    }

    pub fn authorization_available(&self) -> bool {
        self.provider.is_ok()
    }

    /// Builds an authorization URL with a freshly issued CSRF state.
    pub fn begin_authorization(&self) -> Result<AuthorizationRequest> {
        let provider = self.provider()?;
        let state = self.states.create_state();
        let url = provider.authorize_url(&state);
        info!("Authorization URL issued");
        Ok(AuthorizationRequest { url, state })
    }

    /// Authorization URL, or `None` when client configuration is missing.
    pub fn get_auth_url(&self) -> Option<String> {
        match self.begin_authorization() {
            Ok(request) => Some(request.url),
            Err(e) => {
                error!(error = %e, "Cannot build authorization URL");
                None
            }
        }
    }

    /// Consumes a CSRF state returned on the callback.
    pub fn verify_state(&self, state: &str) -> bool {
        self.states.validate_and_consume(state)
    }

    pub fn states(&self) -> &StateManager {
        &self.states
    }

    /// Exchanges `code` for credentials, persists them and becomes
    /// `Authenticated`. Any failure leaves the manager `Unauthenticated`
    /// without touching the store.
    pub async fn complete_authorization(&self, code: &str) -> Result<()> {
        let provider = self.provider()?;

        let record = match self
            .executor
            .execute(move || provider.exchange_code(code))
            .await
        {
            Ok(record) => record,
            Err(e) => {
                error!(error = %e, "Authorization code exchange failed");
                self.set_state(AuthState::Unauthenticated);
                return Err(e);
            }
        };

        if let Err(e) = self.store.save(&record) {
            self.set_state(AuthState::Unauthenticated);
            return Err(e);
        }

        info!(
            expires_at = record.expires_at,
            has_refresh_token = record.usable_refresh_token().is_some(),
            "Authorization completed"
        );
        self.set_state(AuthState::Authenticated(record));
        Ok(())
    }

    /// [`complete_authorization`](Self::complete_authorization) reduced to success/failure.
    pub async fn handle_callback(&self, code: &str) -> bool {
        self.complete_authorization(code).await.is_ok()
    }

    /// Refreshes the current record.
    pub async fn refresh(&self) -> Result<CredentialRecord> {
        match self.state() {
            AuthState::Authenticated(record) => self.refresh_record(&record).await,
            AuthState::Unauthenticated => {
                warn!("Refresh requested without credentials, reauthorization required");
                Err(SpotifyError::ReauthorizationRequired)
            }
        }
    }

    /// Refreshes `record` and adopts the result.
    ///
    /// Without a usable refresh token this fails with
    /// [`SpotifyError::ReauthorizationRequired`] before any network call.
    /// If the new record cannot be persisted it is still adopted in memory
    /// (the old refresh token may already be revoked) and the persistence
    /// error is returned.
    pub async fn refresh_record(&self, record: &CredentialRecord) -> Result<CredentialRecord> {
        let Some(refresh_token) = record.usable_refresh_token() else {
            warn!("No refresh token available, reauthorization required");
            self.set_state(AuthState::Unauthenticated);
            return Err(SpotifyError::ReauthorizationRequired);
        };

        let provider = match self.provider() {
            Ok(provider) => provider,
            Err(e) => {
                error!(error = %e, "Cannot refresh credentials");
                self.set_state(AuthState::Unauthenticated);
                return Err(e);
            }
        };

        let refreshed = match self
            .executor
            .execute(move || provider.refresh(refresh_token))
            .await
        {
            Ok(refreshed) => refreshed,
            Err(e) => {
                error!(error = %e, "Token refresh failed");
                self.set_state(AuthState::Unauthenticated);
                return Err(e);
            }
        };

        let persisted = self.store.save(&refreshed);
        self.set_state(AuthState::Authenticated(refreshed.clone()));
        persisted?;

        info!(expires_at = refreshed.expires_at, "Access token refreshed");
        Ok(refreshed)
    }

    /// Access token safe to use right now, refreshing inline if it is
    /// expiring soon.
    pub async fn usable_token(&self) -> Result<String> {
        let record = match self.state() {
            AuthState::Authenticated(record) => record,
            AuthState::Unauthenticated => return Err(SpotifyError::ReauthorizationRequired),
        };

        if !self.is_expiring_soon(&record) {
            return Ok(record.access_token);
        }

        debug!(expires_at = record.expires_at, "Access token expiring soon, refreshing");
        self.refresh_record(&record)
            .await
            .map(|refreshed| refreshed.access_token)
    }

    /// [`usable_token`](Self::usable_token), `None` on any failure.
    pub async fn get_usable_token(&self) -> Option<String> {
        match self.usable_token().await {
            Ok(token) => Some(token),
            Err(e) => {
                debug!(error = %e, "No usable access token");
                None
            }
        }
    }

    /// Same refresh policy as [`usable_token`](Self::usable_token), reported
    /// as a boolean.
    pub async fn is_authenticated(&self) -> bool {
        self.usable_token().await.is_ok()
    }

    /// Status snapshot, after applying the refresh policy.
    pub async fn status(&self) -> AuthStatus {
        let authenticated = self.is_authenticated().await;
        let record = match self.state() {
            AuthState::Authenticated(record) => Some(record),
            AuthState::Unauthenticated => None,
        };
        AuthStatus {
            authenticated,
            authorization_available: self.authorization_available(),
            expires_at: record.as_ref().map(|r| r.expires_at),
            has_refresh_token: record
                .as_ref()
                .map_or(false, |r| r.usable_refresh_token().is_some()),
            scope: record.map(|r| r.scope),
        }
    }

    /// Deletes persisted credentials, clears cached data and becomes
    /// `Unauthenticated`. The in-memory state is reset even when the delete
    /// fails; that failure is still returned.
    pub async fn try_disconnect(&self) -> Result<()> {
        let deleted = self.store.delete();
        let cleared = self.cache.clear_all();
        self.set_state(AuthState::Unauthenticated);

        match &deleted {
            Ok(()) => info!(cache_entries_removed = cleared, "Disconnected"),
            Err(e) => error!(error = %e, "Disconnected, but stored credentials could not be removed"),
        }
        deleted
    }

    pub async fn disconnect(&self) -> bool {
        self.try_disconnect().await.is_ok()
    }

    /// Removes every cached entry; authentication is unaffected.
    pub fn clear_cache(&self) -> bool {
        let removed = self.cache.clear_all();
        info!(removed, "Cached data cleared");
        true
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn executor(&self) -> &ResilientExecutor {
        &self.executor
    }
}

/// Periodically drops expired authorization states and stale cache entries.
pub async fn run_maintenance(manager: Arc<AuthManager>, interval_seconds: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds));

    loop {
        interval.tick().await;
        let states = manager.states().cleanup_expired();
        let entries = manager.cache().prune_stale();
        debug!(
            expired_states = states,
            pruned_entries = entries,
            "Maintenance sweep complete"
        );
    }
}
