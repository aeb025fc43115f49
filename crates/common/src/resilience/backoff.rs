//! Linear backoff and sleeping

use std::time::Duration;

/// Pause between attempts.
///
/// Production code uses [`ThreadSleeper`]; tests use
/// `testing::RecordingSleeper` to capture the requested delays.
pub trait Sleeper: Send + Sync {
    /// Block the current thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Sleeps the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Backoff where the wait after failed attempt `n` (1-based) is `n * base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBackoff {
    base: Duration,
}

impl LinearBackoff {
    /// Create a backoff with the given base step.
    pub const fn new(base: Duration) -> Self {
        Self { base }
    }

    /// Base step.
    pub const fn base(&self) -> Duration {
        self.base
    }

    /// Delay to wait after failed attempt `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(attempt)
    }
}
