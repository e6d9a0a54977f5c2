use anyhow::{Context, Result};
use spotify_mcp::api::create_app;
use spotify_mcp::auth::{run_maintenance, AuthManager};
use spotify_mcp::cache::{CacheTtls, ResponseCache};
use spotify_mcp::clock::SystemClock;
use spotify_mcp::config;
use spotify_mcp::provider::SpotifyApiClient;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spotify_mcp=info".into()),
        )
        .init();

    info!("Spotify MCP starting...");

    let config_path = std::env::args().nth(1);
    let config = config::resolve(config_path.as_deref()).context("Failed to load configuration")?;

    info!(
        token_path = %config.storage.token_path.display(),
        cache_dir = %config.storage.cache_dir.display(),
        bind_addr = %config.server.bind_addr,
        client_configured = config.spotify.is_complete(),
        "Configuration loaded"
    );

    let cache = ResponseCache::new(&config.storage.cache_dir, config.cache.default_ttl_seconds);
    let auth = Arc::new(AuthManager::from_config(&config, cache, Arc::new(SystemClock)));

    if auth.restore().await {
        info!("Spotify account connected");
    } else {
        info!("Not connected, visit /auth/login to authorize");
    }

    tokio::spawn(run_maintenance(
        Arc::clone(&auth),
        config.cache.prune_interval_seconds,
    ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let router = create_app(
        Arc::clone(&auth),
        SpotifyApiClient::new(&config.spotify.api_base_url),
        CacheTtls::from(&config.cache),
    )
    .layer(cors);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!(bind_addr = %config.server.bind_addr, "HTTP API listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!(error = %e, "HTTP server error");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    info!("Spotify MCP stopped");

    Ok(())
}
