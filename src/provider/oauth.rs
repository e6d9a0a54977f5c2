//! Token endpoint client for the authorization-code flow.

use super::api::response_error;
use super::{OAuthProvider, TokenResponse};
use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::credentials::CredentialRecord;
use crate::error::{ProviderError, SpotifyError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// reqwest-backed [`OAuthProvider`] for the Spotify accounts service.
pub struct SpotifyOAuthClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: Vec<String>,
    show_dialog: bool,
    auth_url: String,
    token_url: String,
    http_client: reqwest::Client,
    clock: Arc<dyn Clock>,
}

impl SpotifyOAuthClient {
    /// Builds the client from configuration.
    ///
    /// Fails with [`SpotifyError::Configuration`] naming the missing
    /// variables when client id, secret or redirect URI are absent.
    pub fn from_config(config: &ClientConfig) -> Result<Self, SpotifyError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &ClientConfig, clock: Arc<dyn Clock>) -> Result<Self, SpotifyError> {
        let missing = config.missing_fields();
        if !missing.is_empty() {
            return Err(SpotifyError::Configuration(format!(
                "missing {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            client_id: config.client_id.clone().unwrap_or_default(),
            client_secret: config.client_secret.clone().unwrap_or_default(),
            redirect_uri: config.redirect_uri.clone().unwrap_or_default(),
            scopes: config.scopes.clone(),
            show_dialog: config.show_dialog,
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            http_client: reqwest::Client::new(),
            clock,
        })
    }

    async fn request_token(
        &self,
        form: &[(&str, &str)],
        previous_refresh: Option<&str>,
    ) -> Result<CredentialRecord, ProviderError> {
        debug!(token_url = %self.token_url, grant_type = form[0].1, "Requesting token");

        let response = self
            .http_client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(response_error(response).await);
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Transport(format!("invalid token response: {}", e)))?;

        debug!(
            has_refresh_token = token_response.refresh_token.is_some(),
            expires_in = ?token_response.expires_in,
            "Token request successful"
        );

        Ok(token_response.into_record(self.clock.now(), previous_refresh))
    }
}

#[async_trait]
impl OAuthProvider for SpotifyOAuthClient {
    fn authorize_url(&self, state: &str) -> String {
        let scopes = self.scopes.join(" ");
        format!(
            "{}?client_id={}&response_type=code&redirect_uri={}&scope={}&state={}&show_dialog={}",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&scopes),
            urlencoding::encode(state),
            self.show_dialog
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<CredentialRecord, ProviderError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        self.request_token(&form, None).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<CredentialRecord, ProviderError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        self.request_token(&form, Some(refresh_token)).await
    }
}
