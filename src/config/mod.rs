pub mod env;

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::PathBuf;

/// Scopes requested during authorization when none are configured.
pub const DEFAULT_SCOPES: [&str; 12] = [
    "user-library-read",
    "playlist-read-private",
    "playlist-read-collaborative",
    "playlist-modify-private",
    "playlist-modify-public",
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
    "user-read-recently-played",
    "user-top-read",
    "user-follow-read",
    "user-follow-modify",
];

/// Complete server configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub spotify: ClientConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// OAuth client registration and provider endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: Option<String>,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// Always show the consent dialog, even for a previously approved client
    #[serde(default = "default_show_dialog")]
    pub show_dialog: bool,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_redirect_uri() -> Option<String> {
    Some("http://127.0.0.1:8000/auth/callback".to_string())
}

fn default_scopes() -> Vec<String> {
    DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
}

fn default_show_dialog() -> bool {
    true
}

fn default_auth_url() -> String {
    "https://accounts.spotify.com/authorize".to_string()
}

fn default_token_url() -> String {
    "https://accounts.spotify.com/api/token".to_string()
}

fn default_api_base_url() -> String {
    "https://api.spotify.com/v1".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: default_redirect_uri(),
            scopes: default_scopes(),
            show_dialog: default_show_dialog(),
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            api_base_url: default_api_base_url(),
        }
    }
}

impl ClientConfig {
    /// Names of the environment variables whose values are still missing.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(&self.client_id) {
            missing.push(env::CLIENT_ID);
        }
        if is_blank(&self.client_secret) {
            missing.push(env::CLIENT_SECRET);
        }
        if is_blank(&self.redirect_uri) {
            missing.push(env::REDIRECT_URI);
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).map_or(true, str::is_empty)
}

/// Locations of persisted state
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Credential record file
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
    /// Directory holding one file per cache key
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "spotify-mcp")
}

fn default_token_path() -> PathBuf {
    match project_dirs() {
        Some(dirs) => dirs.data_dir().join("spotify_token.json"),
        None => PathBuf::from("tokens").join("spotify_token.json"),
    }
}

fn default_cache_dir() -> PathBuf {
    match project_dirs() {
        Some(dirs) => dirs.cache_dir().to_path_buf(),
        None => PathBuf::from("cache"),
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            token_path: default_token_path(),
            cache_dir: default_cache_dir(),
        }
    }
}

/// Credential lifecycle policy
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// A token with less remaining lifetime than this is refreshed before use
    #[serde(default = "default_refresh_margin")]
    pub refresh_margin_seconds: i64,
    /// How long an issued authorization `state` stays valid
    #[serde(default = "default_state_expiry")]
    pub state_expiry_seconds: i64,
}

fn default_refresh_margin() -> i64 {
    60
}

fn default_state_expiry() -> i64 {
    600
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_margin_seconds: default_refresh_margin(),
            state_expiry_seconds: default_state_expiry(),
        }
    }
}

/// Response cache lifetimes (seconds)
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// TTL recorded on entries written without an explicit one
    #[serde(default = "default_medium_ttl")]
    pub default_ttl_seconds: u64,
    /// Volatile lookups such as search results
    #[serde(default = "default_short_ttl")]
    pub short_ttl_seconds: u64,
    /// Playlists and recommendations
    #[serde(default = "default_medium_ttl")]
    pub medium_ttl_seconds: u64,
    #[serde(default = "default_long_ttl")]
    pub long_ttl_seconds: u64,
    /// Artist metadata and genre seeds
    #[serde(default = "default_day_ttl")]
    pub day_ttl_seconds: u64,
    /// How often the background sweep prunes stale entries
    #[serde(default = "default_prune_interval")]
    pub prune_interval_seconds: u64,
}

fn default_short_ttl() -> u64 {
    300
}

fn default_medium_ttl() -> u64 {
    3600
}

fn default_long_ttl() -> u64 {
    43200
}

fn default_day_ttl() -> u64 {
    86400
}

fn default_prune_interval() -> u64 {
    900
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: default_medium_ttl(),
            short_ttl_seconds: default_short_ttl(),
            medium_ttl_seconds: default_medium_ttl(),
            long_ttl_seconds: default_long_ttl(),
            day_ttl_seconds: default_day_ttl(),
            prune_interval_seconds: default_prune_interval(),
        }
    }
}

/// Retry policy for throttled provider calls
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

impl AppConfig {
    /// Rejects values outside their supported ranges.
    pub fn validate(&self) -> Result<()> {
        if !(0..=3600).contains(&self.auth.refresh_margin_seconds) {
            bail!(
                "auth.refresh_margin_seconds must be within 0..=3600, got {}",
                self.auth.refresh_margin_seconds
            );
        }
        if self.auth.state_expiry_seconds <= 0 {
            bail!("auth.state_expiry_seconds must be positive");
        }
        if self.retry.max_retries > 10 {
            bail!(
                "retry.max_retries must be at most 10, got {}",
                self.retry.max_retries
            );
        }
        if self.retry.initial_backoff_ms == 0 {
            bail!("retry.initial_backoff_ms must be positive");
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            bail!(
                "retry.initial_backoff_ms ({}) exceeds retry.max_backoff_ms ({})",
                self.retry.initial_backoff_ms,
                self.retry.max_backoff_ms
            );
        }
        if self.cache.default_ttl_seconds == 0 {
            bail!("cache.default_ttl_seconds must be positive");
        }
        if self.cache.prune_interval_seconds == 0 {
            bail!("cache.prune_interval_seconds must be positive");
        }
        Ok(())
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &str) -> Result<AppConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path))?;
    let config: AppConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse config file {}", path))?;
    Ok(config)
}

/// Resolves the process configuration: optional TOML file, then environment
/// overrides, then validation.
pub fn resolve(path: Option<&str>) -> Result<AppConfig> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    env::apply_env(&mut config);
    config.validate()?;
    Ok(config)
}
