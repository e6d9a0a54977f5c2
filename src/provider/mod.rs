//! Provider SDK seam.
//!
//! The credential lifecycle talks to the provider only through
//! [`OAuthProvider`]; authenticated resource calls go through
//! [`SpotifyApiClient`]. Both report failures as classified
//! [`ProviderError`]s and never decide on retries themselves.

mod api;
mod oauth;

pub use api::{parse_retry_after, SpotifyApiClient};
pub use oauth::SpotifyOAuthClient;

use crate::credentials::CredentialRecord;
use crate::error::ProviderError;
use async_trait::async_trait;
use serde::Deserialize;

/// Authorization-code flow operations of the provider.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// URL the user visits to grant access. `state` is echoed back on the
    /// callback.
    fn authorize_url(&self, state: &str) -> String;

    /// Exchanges an authorization code for a new credential record.
    async fn exchange_code(&self, code: &str) -> Result<CredentialRecord, ProviderError>;

    /// Exchanges a refresh token for a new credential record.
    ///
    /// When the provider does not rotate the refresh token, the returned
    /// record carries `refresh_token` forward.
    async fn refresh(&self, refresh_token: &str) -> Result<CredentialRecord, ProviderError>;
}

/// Standard OAuth 2.0 token endpoint response
#[derive(Deserialize, Debug)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Lifetime assumed when the provider omits `expires_in`.
const DEFAULT_EXPIRES_IN: i64 = 3600;

impl TokenResponse {
    /// Builds a record issued at `now`, keeping `previous_refresh` when the
    /// response carries no refresh token of its own.
    pub(crate) fn into_record(self, now: i64, previous_refresh: Option<&str>) -> CredentialRecord {
        let refresh_token = self
            .refresh_token
            .filter(|token| !token.is_empty())
            .or_else(|| previous_refresh.map(|token| token.to_string()));

        CredentialRecord {
            access_token: self.access_token,
            refresh_token,
            expires_at: now + self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN),
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: self.scope.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_deserialization() {
        let json = r#"{
            "access_token": "BQD_access",
            "token_type": "Bearer",
            "scope": "user-read-playback-state user-top-read",
            "expires_in": 3600,
            "refresh_token": "AQC_refresh"
        }"#;

        let response: TokenResponse = serde_json::from_str(json).unwrap();
        let record = response.into_record(1_000, None);
        assert_eq!(record.access_token, "BQD_access");
        assert_eq!(record.refresh_token.as_deref(), Some("AQC_refresh"));
        assert_eq!(record.expires_at, 4_600);
        assert_eq!(record.scope, "user-read-playback-state user-top-read");
    }

    #[test]
    fn test_token_response_minimal() {
        let json = r#"{"access_token": "token_12345"}"#;

        let response: TokenResponse = serde_json::from_str(json).unwrap();
        let record = response.into_record(0, None);
        assert_eq!(record.refresh_token, None);
        assert_eq!(record.expires_at, DEFAULT_EXPIRES_IN);
        assert_eq!(record.token_type, "Bearer");
    }

    #[test]
    fn test_refresh_token_carried_forward() {
        let json = r#"{"access_token": "new", "expires_in": 3600}"#;
        let response: TokenResponse = serde_json::from_str(json).unwrap();
        let record = response.into_record(0, Some("kept"));
        assert_eq!(record.refresh_token.as_deref(), Some("kept"));

        let json = r#"{"access_token": "new", "refresh_token": "rotated"}"#;
        let response: TokenResponse = serde_json::from_str(json).unwrap();
        let record = response.into_record(0, Some("kept"));
        assert_eq!(record.refresh_token.as_deref(), Some("rotated"));
    }
}
