//! File-system token store
//!
//! Each key maps to `<directory>/<sha256(key)>.json`. Every write goes
//! through its own uniquely named temporary sibling which is then renamed
//! into place, so readers never observe a partial entry.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::NamedTempFile;

use super::{sha256_hex, CacheError, CacheResult, StoredToken, TokenStore};
use crate::time::{Clock, SystemClock};

/// Token store persisted as JSON files under a directory.
pub struct FileTokenStore<C: Clock = SystemClock> {
    directory: PathBuf,
    clock: Arc<C>,
}

impl FileTokenStore<SystemClock> {
    /// Open (creating if needed) a store rooted at `directory`.
    pub fn open(directory: impl Into<PathBuf>) -> CacheResult<Self> {
        Self::open_with_clock(directory, SystemClock)
    }
}

impl<C: Clock> FileTokenStore<C> {
    /// Open a store with a custom clock (for testing).
    pub fn open_with_clock(directory: impl Into<PathBuf>, clock: C) -> CacheResult<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|e| io_error(&directory, &e))?;
        Ok(Self { directory, clock: Arc::new(clock) })
    }

    /// Directory holding the entries.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{}.json", sha256_hex(key)))
    }

    fn read_entry(&self, path: &Path) -> Option<StoredToken> {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read token cache file");
                return None;
            }
        };

        match serde_json::from_slice(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Discarding corrupt token cache file");
                let _ = fs::remove_file(path);
                None
            }
        }
    }
}

impl<C: Clock> TokenStore for FileTokenStore<C> {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.entry_path(key);
        let entry = self.read_entry(&path)?;

        if entry.key != key {
            return None;
        }
        if entry.is_live(self.clock.millis_since_epoch()) {
            return Some(entry.value);
        }

        tracing::debug!(backend = self.backend(), "Token cache entry expired");
        let _ = fs::remove_file(&path);
        None
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let entry = StoredToken::new(key, value, self.clock.millis_since_epoch(), ttl);
        let json = serde_json::to_vec(&entry).map_err(|e| CacheError::Serialization(e.to_string()))?;

        let path = self.entry_path(key);
        let mut staging =
            NamedTempFile::new_in(&self.directory).map_err(|e| io_error(&self.directory, &e))?;
        staging.write_all(&json).map_err(|e| io_error(staging.path(), &e))?;
        staging.persist(&path).map(|_| ()).map_err(|e| io_error(&path, &e.error))
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        let path = self.entry_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, &e)),
        }
    }

    fn backend(&self) -> &'static str {
        "filesystem"
    }
}

fn io_error(path: &Path, error: &std::io::Error) -> CacheError {
    CacheError::Io { path: path.to_path_buf(), message: error.to_string() }
}
