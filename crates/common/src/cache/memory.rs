//! In-process token store backed by moka

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::sync::Cache;
use moka::Expiry;

use super::{CacheResult, StoredToken, TokenStore};
use crate::time::{Clock, SystemClock};

/// Default max capacity of the in-memory store.
pub const DEFAULT_MEMORY_CAPACITY: u64 = 256;

#[derive(Debug, Clone)]
struct MemoryEntry {
    token: StoredToken,
    ttl: Duration,
}

/// Evicts each entry after its own TTL.
struct PerEntryTtl;

impl Expiry<String, MemoryEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &MemoryEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &MemoryEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Process-local token store.
///
/// Generic over [`Clock`] so expiry can be driven by `MockClock` in tests.
/// moka evicts entries on its own timer as well; the clock check is what
/// decides whether a returned value is still live.
pub struct MemoryTokenStore<C: Clock = SystemClock> {
    entries: Cache<String, MemoryEntry>,
    clock: Arc<C>,
}

impl MemoryTokenStore<SystemClock> {
    /// Create a store using the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryTokenStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryTokenStore<C> {
    /// Create a store with a custom clock (for testing).
    pub fn with_clock(clock: C) -> Self {
        let entries = Cache::builder()
            .max_capacity(DEFAULT_MEMORY_CAPACITY)
            .expire_after(PerEntryTtl)
            .build();

        Self { entries, clock: Arc::new(clock) }
    }

    /// Number of entries currently held (including ones not yet evicted).
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C: Clock> TokenStore for MemoryTokenStore<C> {
    fn get(&self, key: &str) -> Option<String> {
        let entry = self.entries.get(key)?;
        if entry.token.is_live(self.clock.millis_since_epoch()) {
            return Some(entry.token.value);
        }

        tracing::debug!(backend = self.backend(), "Token cache entry expired");
        self.entries.invalidate(key);
        None
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let token = StoredToken::new(key, value, self.clock.millis_since_epoch(), ttl);
        self.entries.insert(key.to_string(), MemoryEntry { token, ttl });
        Ok(())
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        self.entries.invalidate(key);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
