//! Time abstraction for testability
//!
//! Token expiry is computed against a [`Clock`] so TTL behaviour can be
//! tested without waiting for real time to pass.
//!
//! ```
//! use siilink_common::time::{Clock, SystemClock};
//!
//! let clock = SystemClock;
//! assert!(clock.millis_since_epoch() > 0);
//! ```

use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Trait for time operations to enable testing
pub trait Clock: Send + Sync {
    /// Monotonic timestamp suitable for measuring durations.
    fn now(&self) -> Instant;

    /// Wall clock time.
    fn system_time(&self) -> SystemTime;

    /// Milliseconds since the UNIX epoch.
    fn millis_since_epoch(&self) -> u64 {
        self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }
}

/// Real system clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}
