//! Error taxonomy shared by the credential lifecycle and the call executor.
//!
//! Two layers:
//! - [`ProviderError`]: what a single outbound provider call reports, already
//!   classified by HTTP status.
//! - [`SpotifyError`]: what the core surfaces to callers. Every variant has a
//!   stable [`SpotifyError::code`] so handlers can pick a status and message
//!   without matching on display strings.

use std::time::Duration;
use thiserror::Error;

/// Classified failure of one outbound call to the provider.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// HTTP 429. `retry_after` is the provider's hint, when it sent a parseable one.
    #[error("too many requests (retry after {retry_after:?})")]
    TooManyRequests { retry_after: Option<Duration> },

    /// HTTP 401
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// HTTP 403
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// HTTP 404
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success status
    #[error("provider returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Request never produced a usable response (connect, TLS, decode...)
    #[error("transport failure: {0}")]
    Transport(String),
}

impl ProviderError {
    /// Builds the classified error for a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        let message = message.into();
        match status {
            429 => ProviderError::TooManyRequests { retry_after },
            401 => ProviderError::Unauthorized(message),
            403 => ProviderError::Forbidden(message),
            404 => ProviderError::NotFound(message),
            _ => ProviderError::Status { status, message },
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::TooManyRequests { .. })
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => ProviderError::from_status(status.as_u16(), e.to_string(), None),
            None => ProviderError::Transport(e.to_string()),
        }
    }
}

/// Errors surfaced by the core to its callers.
#[derive(Debug, Error)]
pub enum SpotifyError {
    /// Required client credentials are missing; authorization is unavailable.
    #[error("authorization unavailable: {0}")]
    Configuration(String),

    /// Credential store could not be written or removed.
    #[error("credential persistence failed: {0}")]
    Persistence(#[source] std::io::Error),

    /// No usable refresh token; the user has to log in again.
    #[error("reauthorization required")]
    ReauthorizationRequired,

    /// Provider kept throttling after all retries.
    #[error("rate limited by provider after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Generic or unclassified provider failure. `status` is absent when the
    /// call never produced an HTTP response.
    #[error("upstream error: {message}")]
    Upstream { status: Option<u16>, message: String },
}

impl SpotifyError {
    /// Stable identifier for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            SpotifyError::Configuration(_) => "configuration_error",
            SpotifyError::Persistence(_) => "persistence_error",
            SpotifyError::ReauthorizationRequired => "reauthorization_required",
            SpotifyError::RateLimited { .. } => "rate_limited",
            SpotifyError::Unauthorized(_) => "unauthorized",
            SpotifyError::Forbidden(_) => "forbidden",
            SpotifyError::NotFound(_) => "not_found",
            SpotifyError::Upstream { .. } => "upstream_error",
        }
    }
}

impl From<ProviderError> for SpotifyError {
    /// Non-throttling translation. Throttling is only turned into
    /// `RateLimited` by the executor once it gives up retrying.
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::TooManyRequests { .. } => SpotifyError::RateLimited { attempts: 1 },
            ProviderError::Unauthorized(msg) => SpotifyError::Unauthorized(msg),
            ProviderError::Forbidden(msg) => SpotifyError::Forbidden(msg),
            ProviderError::NotFound(msg) => SpotifyError::NotFound(msg),
            ProviderError::Status { status, message } => SpotifyError::Upstream {
                status: Some(status),
                message,
            },
            ProviderError::Transport(message) => SpotifyError::Upstream {
                status: None,
                message,
            },
        }
    }
}

pub type Result<T, E = SpotifyError> = std::result::Result<T, E>;
