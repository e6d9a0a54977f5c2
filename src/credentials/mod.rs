//! Credential record and its durable, file-backed store.
//!
//! A single record per process: the access/refresh token pair issued by the
//! provider's authorization-code flow, plus its absolute expiry.
//!
//! # Usage
//!
//! ```no_run
//! use spotify_mcp::credentials::{CredentialRecord, CredentialStore};
//! use chrono::Utc;
//!
//! # fn main() -> Result<(), spotify_mcp::error::SpotifyError> {
//! let store = CredentialStore::new("tokens/spotify_token.json");
//!
//! let record = CredentialRecord {
//!     access_token: "BQD...".to_string(),
//!     refresh_token: Some("AQC...".to_string()),
//!     expires_at: Utc::now().timestamp() + 3600,
//!     token_type: "Bearer".to_string(),
//!     scope: "user-read-playback-state".to_string(),
//! };
//! store.save(&record)?;
//!
//! if let Some(record) = store.load() {
//!     println!("expires at {}", record.expires_at);
//! }
//!
//! store.delete()?;
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

mod storage;

pub use storage::CredentialStore;

/// One user's authorization grant.
///
/// Replaced wholesale on every refresh; never patched in place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Bearer token for API requests
    pub access_token: String,

    /// Token used to obtain a new access token. Without it the record
    /// cannot be renewed silently.
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Absolute expiry, epoch seconds
    pub expires_at: i64,

    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Space-delimited granted scopes
    #[serde(default)]
    pub scope: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl CredentialRecord {
    /// Remaining lifetime in seconds at `now` (negative once expired).
    pub fn remaining(&self, now: i64) -> i64 {
        self.expires_at - now
    }

    /// True when less than `margin` seconds of validity remain.
    pub fn is_expiring_soon(&self, now: i64, margin: i64) -> bool {
        self.remaining(now) < margin
    }

    /// Refresh token, ignoring an empty string the provider may have sent.
    pub fn usable_refresh_token(&self) -> Option<&str> {
        self.refresh_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
    }

    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.split_whitespace()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(expires_at: i64, refresh_token: Option<&str>) -> CredentialRecord {
        CredentialRecord {
            access_token: "access".to_string(),
            refresh_token: refresh_token.map(|s| s.to_string()),
            expires_at,
            token_type: "Bearer".to_string(),
            scope: "user-read-playback-state user-top-read".to_string(),
        }
    }

    #[test]
    fn test_expiring_soon_margin() {
        let now = 1_000_000;
        assert!(record(now + 30, None).is_expiring_soon(now, 60));
        assert!(record(now + 59, None).is_expiring_soon(now, 60));
        assert!(!record(now + 60, None).is_expiring_soon(now, 60));
        assert!(!record(now + 120, None).is_expiring_soon(now, 60));
        assert!(record(now - 10, None).is_expiring_soon(now, 60));
    }

    #[test]
    fn test_usable_refresh_token() {
        assert_eq!(record(0, Some("r")).usable_refresh_token(), Some("r"));
        assert_eq!(record(0, Some("")).usable_refresh_token(), None);
        assert_eq!(record(0, None).usable_refresh_token(), None);
    }

    #[test]
    fn test_scopes_split() {
        let r = record(0, None);
        let scopes: Vec<&str> = r.scopes().collect();
        assert_eq!(scopes, vec!["user-read-playback-state", "user-top-read"]);
    }

    #[test]
    fn test_deserialize_minimal_record() {
        let json = r#"{"access_token":"a","expires_at":42}"#;
        let record: CredentialRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.token_type, "Bearer");
        assert_eq!(record.refresh_token, None);
        assert_eq!(record.scope, "");
    }

    #[test]
    fn test_deserialize_requires_expiry() {
        let json = r#"{"access_token":"a","refresh_token":"r"}"#;
        assert!(serde_json::from_str::<CredentialRecord>(json).is_err());
    }
}
