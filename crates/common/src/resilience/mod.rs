//! Resilience patterns for remote calls
//!
//! - [`LinearBackoff`]: delay grows linearly with the attempt number
//! - [`Sleeper`]: injectable pause so tests can record delays instead of
//!   waiting
//! - [`BlockingRetry`]: bounded retry loop that collects a diagnostic per
//!   failed attempt

pub mod backoff;
pub mod retry;

pub use backoff::{LinearBackoff, Sleeper, ThreadSleeper};
pub use retry::{BlockingRetry, RetryError};
