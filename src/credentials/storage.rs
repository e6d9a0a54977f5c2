//! File-backed credential storage.
//!
//! Stores the single credential record as JSON at a well-known path.
//! Writes go to a sibling temp file and are renamed into place so a crash
//! mid-write never leaves a truncated record behind.

use super::CredentialRecord;
use crate::error::{Result, SpotifyError};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Durable store for the process's credential record.
///
/// # Failure policy
/// - `save`/`delete` failures are returned as [`SpotifyError::Persistence`];
///   losing a refresh token silently is not acceptable.
/// - `load` never fails: missing, unreadable or foreign content is "no record".
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Creates a store for the record at `path`. Nothing is touched on disk
    /// until the first `save`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Serializes `record` to the backing file, replacing prior content.
    ///
    /// Creates the containing directory if it does not exist.
    pub fn save(&self, record: &CredentialRecord) -> Result<()> {
        self.write_atomic(record).map_err(|e| {
            error!(path = %self.path.display(), error = %e, "Failed to save credential record");
            SpotifyError::Persistence(e)
        })?;

        info!(
            path = %self.path.display(),
            expires_at = record.expires_at,
            has_refresh_token = record.usable_refresh_token().is_some(),
            "Credential record saved"
        );
        Ok(())
    }

    fn write_atomic(&self, record: &CredentialRecord) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let temp = self.temp_path();
        {
            let mut file = fs::File::create(&temp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        restrict_permissions(&temp);

        if let Err(e) = fs::rename(&temp, &self.path) {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }
        Ok(())
    }

    /// Reads the stored record.
    ///
    /// Returns `None` when nothing is stored, the path is not a regular file,
    /// or the content is not a valid record.
    pub fn load(&self) -> Option<CredentialRecord> {
        if self.path.is_dir() {
            warn!(path = %self.path.display(), "Credential path is a directory, ignoring");
            return None;
        }

        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No stored credential record");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read credential record");
                return None;
            }
        };

        match serde_json::from_slice::<CredentialRecord>(&content) {
            Ok(record) => {
                debug!(path = %self.path.display(), "Credential record loaded");
                Some(record)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Stored credential record is invalid");
                None
            }
        }
    }

    /// Removes the stored record. Already absent is not an error.
    pub fn delete(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Credential record deleted");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No credential record to delete");
                Ok(())
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to delete credential record");
                Err(SpotifyError::Persistence(e))
            }
        }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        warn!(path = %path.display(), error = %e, "Failed to restrict credential file permissions");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}
