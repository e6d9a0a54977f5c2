use super::AppConfig;
use std::path::PathBuf;

pub const CLIENT_ID: &str = "SPOTIFY_CLIENT_ID";
pub const CLIENT_SECRET: &str = "SPOTIFY_CLIENT_SECRET";
pub const REDIRECT_URI: &str = "SPOTIFY_REDIRECT_URI";
pub const TOKEN_PATH: &str = "SPOTIFY_MCP_TOKEN_PATH";
pub const CACHE_DIR: &str = "SPOTIFY_MCP_CACHE_DIR";
pub const BIND_ADDR: &str = "SPOTIFY_MCP_BIND_ADDR";
pub const REFRESH_MARGIN: &str = "SPOTIFY_MCP_REFRESH_MARGIN_SECONDS";
pub const MAX_RETRIES: &str = "SPOTIFY_MCP_MAX_RETRIES";

/// Overlay environment variables on top of file/default values.
///
/// Unset or empty variables leave the existing value alone; unparseable
/// numbers are ignored.
pub fn apply_env(config: &mut AppConfig) {
    apply_with(config, |key| std::env::var(key).ok());
}

pub(crate) fn apply_with<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get(CLIENT_ID) {
        config.spotify.client_id = Some(v);
    }
    if let Some(v) = get(CLIENT_SECRET) {
        config.spotify.client_secret = Some(v);
    }
    if let Some(v) = get(REDIRECT_URI) {
        config.spotify.redirect_uri = Some(v);
    }
    if let Some(v) = get(TOKEN_PATH) {
        config.storage.token_path = PathBuf::from(v);
    }
    if let Some(v) = get(CACHE_DIR) {
        config.storage.cache_dir = PathBuf::from(v);
    }
    if let Some(v) = get(BIND_ADDR) {
        config.server.bind_addr = v;
    }
    if let Some(v) = get(REFRESH_MARGIN) {
        if let Ok(n) = v.parse::<i64>() {
            config.auth.refresh_margin_seconds = n;
        }
    }
    if let Some(v) = get(MAX_RETRIES) {
        if let Ok(n) = v.parse::<u32>() {
            config.retry.max_retries = n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = AppConfig::default();
        config.spotify.client_id = Some("from-file".to_string());

        apply_with(
            &mut config,
            lookup(&[
                (CLIENT_ID, "from-env"),
                (CLIENT_SECRET, "secret"),
                (CACHE_DIR, "/var/cache/spotify"),
                (MAX_RETRIES, "5"),
            ]),
        );

        assert_eq!(config.spotify.client_id.as_deref(), Some("from-env"));
        assert_eq!(config.spotify.client_secret.as_deref(), Some("secret"));
        assert_eq!(config.storage.cache_dir, PathBuf::from("/var/cache/spotify"));
        assert_eq!(config.retry.max_retries, 5);
    }

    #[test]
    fn test_blank_and_invalid_values_ignored() {
        let mut config = AppConfig::default();
        apply_with(
            &mut config,
            lookup(&[(CLIENT_ID, "   "), (REFRESH_MARGIN, "soon")]),
        );

        assert!(config.spotify.client_id.is_none());
        assert_eq!(config.auth.refresh_margin_seconds, 60);
    }
}
