// Integration tests for the /auth/* endpoints

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use spotify_mcp::api::create_app;
use spotify_mcp::auth::AuthManager;
use spotify_mcp::cache::{CacheTtls, ResponseCache};
use spotify_mcp::credentials::{CredentialRecord, CredentialStore};
use spotify_mcp::error::ProviderError;
use spotify_mcp::provider::{OAuthProvider, SpotifyApiClient};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Accepts any code except "bad-code".
#[derive(Default)]
struct StubProvider {
    exchanges: AtomicU32,
}

#[async_trait]
impl OAuthProvider for StubProvider {
    fn authorize_url(&self, state: &str) -> String {
        format!("https://accounts.example.test/authorize?state={}", state)
    }

    async fn exchange_code(&self, code: &str) -> Result<CredentialRecord, ProviderError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if code == "bad-code" {
            return Err(ProviderError::Status {
                status: 400,
                message: "Invalid authorization code".to_string(),
            });
        }
        Ok(CredentialRecord {
            access_token: "access-123".to_string(),
            refresh_token: Some("refresh-123".to_string()),
            expires_at: chrono::Utc::now().timestamp() + 3600,
            token_type: "Bearer".to_string(),
            scope: "user-read-private".to_string(),
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<CredentialRecord, ProviderError> {
        Err(ProviderError::Unauthorized("not expected in these tests".to_string()))
    }
}

struct TestApp {
    dir: TempDir,
    provider: Arc<StubProvider>,
    auth: Arc<AuthManager>,
    router: Router,
}

impl TestApp {
    fn token_path(&self) -> std::path::PathBuf {
        self.dir.path().join("spotify_token.json")
    }
}

fn create_test_app(with_provider: bool) -> TestApp {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(StubProvider::default());
    let store = CredentialStore::new(dir.path().join("spotify_token.json"));
    let cache = ResponseCache::new(dir.path().join("cache"), 3600);

    let manager = AuthManager::new(store, cache);
    let manager = if with_provider {
        manager.with_provider(provider.clone())
    } else {
        manager.without_provider("missing SPOTIFY_CLIENT_ID, SPOTIFY_CLIENT_SECRET")
    };
    let auth = Arc::new(manager);

    let router = create_app(
        auth.clone(),
        SpotifyApiClient::new("http://127.0.0.1:9"),
        CacheTtls::default(),
    );

    TestApp {
        dir,
        provider,
        auth,
        router,
    }
}

async fn send(router: &Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_login_returns_url_with_state() {
    let app = create_test_app(true);

    let (status, body) = send(&app.router, "GET", "/auth/login").await;
    assert_eq!(status, StatusCode::OK);

    let state = body["state"].as_str().unwrap();
    assert!(body["auth_url"].as_str().unwrap().contains(state));
}

#[tokio::test]
async fn test_login_redirect() {
    let app = create_test_app(true);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/auth/login?redirect=true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response.headers()["location"].to_str().unwrap();
    assert!(location.starts_with("https://accounts.example.test/authorize?state="));
}

#[tokio::test]
async fn test_login_without_configuration() {
    let app = create_test_app(false);

    let (status, body) = send(&app.router, "GET", "/auth/login").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "configuration_error");
}

#[tokio::test]
async fn test_callback_completes_authorization() {
    let app = create_test_app(true);

    let (_, login) = send(&app.router, "GET", "/auth/login").await;
    let state = login["state"].as_str().unwrap();

    let (status, body) = send(
        &app.router,
        "GET",
        &format!("/auth/callback?code=good-code&state={}", state),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(app.token_path().is_file());

    let (status, body) = send(&app.router, "GET", "/auth/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["has_refresh_token"], true);
    assert!(body.get("access_token").is_none());
}

#[tokio::test]
async fn test_callback_rejects_unknown_state() {
    let app = create_test_app(true);

    let (status, body) = send(
        &app.router,
        "GET",
        "/auth/callback?code=good-code&state=forged",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_state");
    assert_eq!(app.provider.exchanges.load(Ordering::SeqCst), 0);
    assert!(!app.token_path().exists());
}

#[tokio::test]
async fn test_callback_state_is_single_use() {
    let app = create_test_app(true);

    let (_, login) = send(&app.router, "GET", "/auth/login").await;
    let uri = format!(
        "/auth/callback?code=good-code&state={}",
        login["state"].as_str().unwrap()
    );

    let (status, _) = send(&app.router, "GET", &uri).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app.router, "GET", &uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.provider.exchanges.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_callback_with_bad_code() {
    let app = create_test_app(true);

    let (_, login) = send(&app.router, "GET", "/auth/login").await;
    let (status, body) = send(
        &app.router,
        "GET",
        &format!(
            "/auth/callback?code=bad-code&state={}",
            login["state"].as_str().unwrap()
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "upstream_error");
    assert!(!app.token_path().exists());
    assert!(!app.auth.is_authenticated().await);
}

#[tokio::test]
async fn test_callback_reports_denial() {
    let app = create_test_app(true);

    let (status, body) = send(
        &app.router,
        "GET",
        "/auth/callback?error=access_denied&error_description=User+cancelled",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("access_denied"));
}

#[tokio::test]
async fn test_callback_missing_code() {
    let app = create_test_app(true);

    let (status, body) = send(&app.router, "GET", "/auth/callback?state=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn test_logout_removes_credentials() {
    let app = create_test_app(true);
    app.auth.complete_authorization("good-code").await.unwrap();
    assert!(app.token_path().is_file());

    let (status, body) = send(&app.router, "POST", "/auth/logout").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(!app.token_path().exists());

    let (_, body) = send(&app.router, "GET", "/auth/status").await;
    assert_eq!(body["authenticated"], false);
}

#[tokio::test]
async fn test_clear_cache_endpoint() {
    let app = create_test_app(true);
    app.auth.cache().set("top_tracks", &serde_json::json!(["a", "b"]));

    let (status, body) = send(&app.router, "POST", "/auth/cache/clear").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(app.auth.cache().is_empty());
}

#[tokio::test]
async fn test_health() {
    let app = create_test_app(false);

    let (status, body) = send(&app.router, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["authenticated"], false);
    assert_eq!(body["authorization_available"], false);
}
