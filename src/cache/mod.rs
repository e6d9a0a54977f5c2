//! Expiring response cache.
//!
//! Memoizes provider responses (and any other serializable value) on disk so
//! repeated lookups within a freshness window skip the outbound call. The
//! cache is an optimization only: every failure reads as a miss.

mod store;

pub use store::{sanitize_key, ResponseCache};

use crate::config::CacheConfig;

/// Named freshness windows for different kinds of provider data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub short: u64,
    pub medium: u64,
    pub long: u64,
    pub day: u64,
}

impl From<&CacheConfig> for CacheTtls {
    fn from(config: &CacheConfig) -> Self {
        Self {
            short: config.short_ttl_seconds,
            medium: config.medium_ttl_seconds,
            long: config.long_ttl_seconds,
            day: config.day_ttl_seconds,
        }
    }
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}
