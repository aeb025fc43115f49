//! Sleeper that records requested delays instead of waiting

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::resilience::Sleeper;

/// Records every requested delay and returns immediately.
///
/// Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order.
    pub fn recorded(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }

    /// Sum of all requested delays.
    pub fn total(&self) -> Duration {
        self.delays.lock().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays.lock().push(duration);
    }
}
