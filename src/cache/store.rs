//! File-per-key response cache.
//!
//! Each key maps to `<cache_dir>/<escaped key>.json` holding the payload, the
//! second it was stored and the TTL in effect when it was stored.

use crate::clock::{Clock, SystemClock};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const ENTRY_EXTENSION: &str = "json";

/// Longest file stem produced by [`sanitize_key`], well under common
/// 255-byte filename limits once the extension is added.
const MAX_STEM_LEN: usize = 200;

/// `_h` marker plus a hex SHA-256 digest.
const HASH_SUFFIX_LEN: usize = 2 + 64;

/// On-disk representation of one cache entry
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    data: Value,
    /// Epoch seconds
    stored_at: i64,
    /// Effective TTL in seconds
    ttl: u64,
}

impl CacheEntry {
    fn age(&self, now: i64) -> i64 {
        now - self.stored_at
    }

    /// An entry whose age has reached `max_age` is expired.
    fn is_expired(&self, now: i64, max_age: u64) -> bool {
        self.age(now) >= max_age as i64
    }
}

/// Expiring key-value cache persisted as one JSON file per key.
///
/// Every operation degrades instead of failing: unreadable entries read as
/// misses, failed writes are logged and dropped, sweeps continue past entries
/// they cannot process.
#[derive(Clone)]
pub struct ResponseCache {
    cache_dir: PathBuf,
    default_ttl: u64,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("cache_dir", &self.cache_dir)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl ResponseCache {
    /// Creates a cache rooted at `cache_dir`. Entries written with [`set`]
    /// record `default_ttl` seconds as their TTL.
    ///
    /// [`set`]: ResponseCache::set
    pub fn new<P: AsRef<Path>>(cache_dir: P, default_ttl: u64) -> Self {
        Self::with_clock(cache_dir, default_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock<P: AsRef<Path>>(cache_dir: P, default_ttl: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            default_ttl,
            clock,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", sanitize_key(key), ENTRY_EXTENSION))
    }

    fn read_entry(path: &Path) -> io::Result<CacheEntry> {
        let content = fs::read(path)?;
        serde_json::from_slice(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn lookup(&self, key: &str, max_age: Option<u64>) -> Option<Value> {
        let path = self.entry_path(key);
        let entry = match Self::read_entry(&path) {
            Ok(entry) => entry,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(key = %key, "Cache miss");
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Unreadable cache entry, treating as miss");
                return None;
            }
        };

        let max_age = max_age.unwrap_or(entry.ttl);
        let now = self.clock.now();
        if entry.is_expired(now, max_age) {
            debug!(key = %key, age = entry.age(now), max_age, "Cache entry expired");
            if let Err(e) = fs::remove_file(&path) {
                warn!(key = %key, error = %e, "Failed to remove expired cache entry");
            }
            return None;
        }

        debug!(key = %key, "Cache hit");
        Some(entry.data)
    }

    /// Returns the payload for `key` unless it is missing or at least
    /// `max_age` seconds old. Expired entries are removed on the way out.
    pub fn get<T: DeserializeOwned>(&self, key: &str, max_age: u64) -> Option<T> {
        self.lookup(key, Some(max_age))
            .and_then(|data| decode(key, data))
    }

    /// Like [`get`](ResponseCache::get), but judged against the TTL the
    /// entry was stored with.
    pub fn get_fresh<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.lookup(key, None).and_then(|data| decode(key, data))
    }

    /// Stores `payload` under `key` with the cache-wide default TTL.
    pub fn set<T: Serialize>(&self, key: &str, payload: &T) {
        self.set_with_ttl(key, payload, self.default_ttl);
    }

    /// Stores `payload` under `key`, replacing any previous entry.
    pub fn set_with_ttl<T: Serialize>(&self, key: &str, payload: &T, ttl: u64) {
        let data = match serde_json::to_value(payload) {
            Ok(data) => data,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache payload is not serializable, skipping");
                return;
            }
        };
        let entry = CacheEntry {
            data,
            stored_at: self.clock.now(),
            ttl,
        };

        let result = fs::create_dir_all(&self.cache_dir).and_then(|_| {
            let json = serde_json::to_vec(&entry)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            fs::write(self.entry_path(key), json)
        });

        match result {
            Ok(()) => debug!(key = %key, ttl, "Cache entry stored"),
            Err(e) => warn!(key = %key, error = %e, "Failed to write cache entry"),
        }
    }

    /// Removes the entry for `key`. Returns whether an entry was removed.
    pub fn delete(&self, key: &str) -> bool {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => {
                debug!(key = %key, "Cache entry deleted");
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to delete cache entry");
                false
            }
        }
    }

    /// Entry files currently in the cache directory.
    fn entry_files(&self) -> Vec<PathBuf> {
        let dir = match fs::read_dir(&self.cache_dir) {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(dir = %self.cache_dir.display(), error = %e, "Failed to list cache directory");
                return Vec::new();
            }
        };

        dir.filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|ext| ext.to_str()) == Some(ENTRY_EXTENSION)
            })
            .collect()
    }

    /// Removes every entry. Returns how many were removed; entries that
    /// cannot be removed are logged and skipped.
    pub fn clear_all(&self) -> usize {
        let mut removed = 0;
        for path in self.entry_files() {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove cache entry"),
            }
        }
        info!(removed, "Cache cleared");
        removed
    }

    /// Removes entries at least `max_age` seconds old.
    pub fn prune_expired(&self, max_age: u64) -> usize {
        self.sweep(|_| max_age)
    }

    /// Removes entries that outlived the TTL they were stored with.
    pub fn prune_stale(&self) -> usize {
        self.sweep(|entry| entry.ttl)
    }

    fn sweep<F>(&self, max_age_of: F) -> usize
    where
        F: Fn(&CacheEntry) -> u64,
    {
        let now = self.clock.now();
        let mut removed = 0;

        for path in self.entry_files() {
            let expired = match Self::read_entry(&path) {
                Ok(entry) => entry.is_expired(now, max_age_of(&entry)),
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    debug!(path = %path.display(), "Removing corrupt cache entry");
                    true
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to read cache entry during prune");
                    false
                }
            };

            if expired {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Failed to remove expired cache entry")
                    }
                }
            }
        }

        if removed > 0 {
            info!(removed, "Pruned expired cache entries");
        }
        removed
    }

    /// Total bytes used by cache entries. Entries whose size cannot be read
    /// are left out of the total.
    pub fn size(&self) -> u64 {
        self.entry_files()
            .iter()
            .filter_map(|path| match fs::metadata(path) {
                Ok(meta) => Some(meta.len()),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to stat cache entry");
                    None
                }
            })
            .sum()
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entry_files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn decode<T: DeserializeOwned>(key: &str, data: Value) -> Option<T> {
    match serde_json::from_value(data) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key = %key, error = %e, "Cached payload has unexpected shape, treating as miss");
            None
        }
    }
}

/// Maps an arbitrary key onto a safe file stem.
///
/// ASCII alphanumerics and `-` pass through; every other byte becomes `_xx`
/// (lowercase hex). `_` is always an escape prefix, so distinct keys never
/// share a file and no key can name a path outside the cache directory.
///
/// Stems longer than `MAX_STEM_LEN` keep a prefix of whole escapes and end
/// in `_h` plus the SHA-256 of the full key. `h` is not a hex digit, so a
/// hashed stem never equals an unhashed one.
pub fn sanitize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        push_escaped(&mut out, byte);
    }
    if out.is_empty() {
        out.push('_');
    }
    if out.len() <= MAX_STEM_LEN {
        return out;
    }

    let keep = MAX_STEM_LEN - HASH_SUFFIX_LEN;
    let mut stem = String::with_capacity(MAX_STEM_LEN);
    for byte in key.bytes() {
        let width = if is_plain(byte) { 1 } else { 3 };
        if stem.len() + width > keep {
            break;
        }
        push_escaped(&mut stem, byte);
    }
    let _ = write!(stem, "_h{:x}", Sha256::digest(key.as_bytes()));
    stem
}

fn is_plain(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'-'
}

fn push_escaped(out: &mut String, byte: u8) {
    if is_plain(byte) {
        out.push(byte as char);
    } else {
        let _ = write!(out, "_{:02x}", byte);
    }
}
