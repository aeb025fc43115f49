//! Modular common utilities shared across SiiLink crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: pure helpers without side effects
//! - `runtime`: token cache backends, backoff and retry loops, clocks
//! - `test-utils`: deterministic clocks and sleepers for tests
//! - `observability`: tracing (pulled in by `runtime`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod cache;
#[cfg(feature = "runtime")]
pub mod resilience;
#[cfg(feature = "runtime")]
pub mod time;

// Test utilities
// --------------------------------------------------------------------
#[cfg(all(feature = "runtime", any(test, feature = "test-utils")))]
pub mod testing;
