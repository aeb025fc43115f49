//! Deterministic test doubles for time and sleeping

pub mod sleep;
pub mod time;

pub use sleep::RecordingSleeper;
pub use time::MockClock;
