//! Authenticated Web API client and provider error classification.

use crate::error::ProviderError;
use reqwest::{Client, Method, Response};
use serde_json::Value;
use std::time::Duration;

/// HTTP client for authenticated Web API calls.
///
/// Each call is a single attempt; throttling and retries belong to the
/// executor wrapping it.
#[derive(Clone)]
pub struct SpotifyApiClient {
    http_client: Client,
    base_url: String,
}

impl SpotifyApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET `path` and decode the JSON body.
    pub async fn get_json(&self, access_token: &str, path: &str) -> Result<Value, ProviderError> {
        self.send_json(Method::GET, access_token, path, None).await
    }

    /// Sends a request with an optional JSON body. Empty success bodies
    /// (204 and friends) decode as `Value::Null`.
    pub async fn send_json(
        &self,
        method: Method,
        access_token: &str,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ProviderError> {
        let mut request = self
            .http_client
            .request(method, self.url(path))
            .bearer_auth(access_token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(response_error(response).await);
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| ProviderError::Transport(format!("invalid JSON response: {}", e)))
    }
}

/// Classifies a non-success response, pulling the provider's message and
/// `Retry-After` hint out of it.
pub(crate) async fn response_error(response: Response) -> ProviderError {
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let body = response.text().await.unwrap_or_default();

    ProviderError::from_status(status, error_message(status, &body), retry_after)
}

/// Parses a `Retry-After` value given in (possibly fractional) seconds.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let seconds: f64 = value.trim().parse().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}

/// Extracts the human-readable message from either error body shape the
/// provider uses:
/// `{"error": {"status": 404, "message": "..."}}` (Web API) or
/// `{"error": "invalid_grant", "error_description": "..."}` (accounts service).
fn error_message(status: u16, body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|json| {
        json.pointer("/error/message")
            .and_then(Value::as_str)
            .or_else(|| json.get("error_description").and_then(Value::as_str))
            .or_else(|| json.get("error").and_then(Value::as_str))
            .map(str::to_string)
    });

    match message {
        Some(message) => message,
        None if body.trim().is_empty() => format!("HTTP {}", status),
        None => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn test_get_json() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/me")
            .match_header("authorization", "Bearer test_token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"user1","display_name":"Test User"}"#)
            .create_async()
            .await;

        let client = SpotifyApiClient::new(server.url());
        let profile = client.get_json("test_token", "/me").await.unwrap();
        assert_eq!(profile["id"], "user1");
    }

    #[tokio::test]
    async fn test_no_content_is_null() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("PUT", "/me/player/pause")
            .with_status(204)
            .create_async()
            .await;

        let client = SpotifyApiClient::new(format!("{}/", server.url()));
        let result = client
            .send_json(Method::PUT, "test_token", "me/player/pause", None)
            .await
            .unwrap();
        assert_eq!(result, Value::Null);
    }

    #[tokio::test]
    async fn test_404_classified() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/me/player")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":{"status":404,"message":"Player command failed: No active device found"}}"#)
            .create_async()
            .await;

        let client = SpotifyApiClient::new(server.url());
        let err = client.get_json("test_token", "/me/player").await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::NotFound("Player command failed: No active device found".to_string())
        );
    }

    #[tokio::test]
    async fn test_429_carries_retry_after() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/search")
            .with_status(429)
            .with_header("Retry-After", "2.5")
            .create_async()
            .await;

        let client = SpotifyApiClient::new(server.url());
        let err = client.get_json("test_token", "/search").await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::TooManyRequests {
                retry_after: Some(Duration::from_millis(2500))
            }
        );
    }

    #[tokio::test]
    async fn test_429_with_oversized_retry_after_has_no_hint() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/search")
            .with_status(429)
            .with_header("Retry-After", "1e20")
            .create_async()
            .await;

        let client = SpotifyApiClient::new(server.url());
        let err = client.get_json("test_token", "/search").await.unwrap_err();
        assert_eq!(err, ProviderError::TooManyRequests { retry_after: None });
    }

    #[tokio::test]
    async fn test_unreachable_is_transport() {
        let client = SpotifyApiClient::new("http://127.0.0.1:9");
        let err = client.get_json("test_token", "/me").await.unwrap_err();
        assert!(matches!(err, ProviderError::Transport(_)));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("3"), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after(" 0.5 "), Some(Duration::from_millis(500)));
        assert_eq!(parse_retry_after("-1"), None);
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after("NaN"), None);
        assert_eq!(parse_retry_after("inf"), None);
        assert_eq!(parse_retry_after("1e20"), None);
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            error_message(403, r#"{"error":{"status":403,"message":"Premium required"}}"#),
            "Premium required"
        );
        assert_eq!(
            error_message(400, r#"{"error":"invalid_grant","error_description":"Refresh token revoked"}"#),
            "Refresh token revoked"
        );
        assert_eq!(error_message(400, r#"{"error":"invalid_client"}"#), "invalid_client");
        assert_eq!(error_message(500, ""), "HTTP 500");
        assert_eq!(error_message(502, "<html>bad gateway</html>"), "<html>bad gateway</html>");
    }
}
