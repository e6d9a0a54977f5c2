use crate::error::SpotifyError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

/// Error response
#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Application error types for HTTP handlers
pub(crate) enum AppError {
    /// Malformed request (missing parameter, provider-reported denial)
    BadRequest(String),
    /// Unknown or expired CSRF state
    InvalidState,
    Spotify(SpotifyError),
}

impl From<SpotifyError> for AppError {
    fn from(e: SpotifyError) -> Self {
        AppError::Spotify(e)
    }
}

/// HTTP status for each error kind.
pub(crate) fn status_for(e: &SpotifyError) -> StatusCode {
    match e {
        SpotifyError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        SpotifyError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        SpotifyError::ReauthorizationRequired => StatusCode::UNAUTHORIZED,
        SpotifyError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        SpotifyError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        SpotifyError::Forbidden(_) => StatusCode::FORBIDDEN,
        SpotifyError::NotFound(_) => StatusCode::NOT_FOUND,
        SpotifyError::Upstream { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::InvalidState => (
                StatusCode::BAD_REQUEST,
                "invalid_state",
                "Invalid or expired authorization state".to_string(),
            ),
            AppError::Spotify(e) => (status_for(&e), e.code(), e.to_string()),
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
        });

        (status, body).into_response()
    }
}
