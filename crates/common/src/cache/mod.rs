//! Token stores for the SII session layer
//!
//! A [`TokenStore`] keeps short-lived session tokens keyed by a string that
//! the caller derives from the signing identity. Two backends are provided:
//!
//! - [`MemoryTokenStore`]: process-local, backed by `moka` with a per-entry
//!   TTL
//! - [`FileTokenStore`]: one JSON file per key, shared by every process that
//!   points at the same directory
//!
//! Both backends evaluate expiry against an injected [`Clock`] so tests can
//! move time forward without sleeping.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use siilink_common::cache::{MemoryTokenStore, TokenStore};
//!
//! let store = MemoryTokenStore::new();
//! store.set("sii_token_abc", "TOKEN123", Duration::from_secs(30)).unwrap();
//! assert!(store.has("sii_token_abc"));
//! assert_eq!(store.get("sii_token_abc").as_deref(), Some("TOKEN123"));
//! ```
//!
//! [`Clock`]: crate::time::Clock

mod file;
mod memory;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use self::file::FileTokenStore;
pub use self::memory::MemoryTokenStore;

/// Errors raised by token store backends.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Reading or writing a cache file failed.
    #[error("cache I/O error at {path}: {message}")]
    Io { path: PathBuf, message: String },

    /// A cache entry could not be encoded or decoded.
    #[error("cache serialization error: {0}")]
    Serialization(String),
}

/// Result alias for token store operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Key-value store for session tokens with per-entry time-to-live.
///
/// Lookups never fail: a missing, expired or unreadable entry is reported as
/// absent. Only writes surface errors.
pub trait TokenStore: Send + Sync {
    /// Whether a live entry exists for `key`.
    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Live value for `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key` for `ttl`.
    fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Drop the entry for `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> CacheResult<()>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}

/// Entry persisted by the backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredToken {
    pub(crate) key: String,
    pub(crate) value: String,
    pub(crate) expires_at_ms: u64,
}

impl StoredToken {
    pub(crate) fn new(key: &str, value: &str, now_ms: u64, ttl: Duration) -> Self {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        Self {
            key: key.to_string(),
            value: value.to_string(),
            expires_at_ms: now_ms.saturating_add(ttl_ms),
        }
    }

    pub(crate) fn is_live(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at_ms
    }
}

/// Hex-encoded SHA-256 of `input`.
///
/// Used to derive cache keys from signing identities and file names from
/// cache keys.
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}
