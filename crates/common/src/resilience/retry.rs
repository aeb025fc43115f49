//! Bounded blocking retry loop
//!
//! The loop runs an operation up to `budget` times. Between failed attempts
//! it waits `backoff.delay(attempt)`; after the final attempt it returns
//! immediately. Every failure is kept so callers can report all of them.

use std::fmt;

use thiserror::Error;
use tracing::debug;

use super::backoff::{LinearBackoff, Sleeper};

/// Why a retry loop gave up.
#[derive(Debug, Error)]
pub enum RetryError<E: fmt::Display> {
    /// Every attempt failed with a retryable error.
    #[error("all {attempts} attempt(s) failed")]
    Exhausted { attempts: u32, failures: Vec<E> },

    /// An attempt failed with an error the policy refused to retry.
    #[error("attempt {attempt} failed without retry: {error}")]
    NonRetryable { attempt: u32, error: E, failures: Vec<E> },
}

impl<E: fmt::Display> RetryError<E> {
    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
            Self::NonRetryable { attempt, .. } => *attempt,
        }
    }
}

/// Bounded retry loop with linear backoff.
pub struct BlockingRetry<'a> {
    budget: u32,
    backoff: LinearBackoff,
    sleeper: &'a dyn Sleeper,
}

impl<'a> BlockingRetry<'a> {
    /// Create a loop making at most `budget` attempts (minimum one).
    pub fn new(budget: u32, backoff: LinearBackoff, sleeper: &'a dyn Sleeper) -> Self {
        Self { budget: budget.max(1), backoff, sleeper }
    }

    /// Effective attempt budget.
    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// Run `operation` until it succeeds, the budget is spent, or
    /// `is_retryable` rejects a failure.
    ///
    /// `operation` receives the 1-based attempt number.
    pub fn run<T, E, F, P>(&self, mut operation: F, is_retryable: P) -> Result<T, RetryError<E>>
    where
        E: fmt::Display,
        F: FnMut(u32) -> Result<T, E>,
        P: Fn(&E) -> bool,
    {
        let mut failures = Vec::new();

        for attempt in 1..=self.budget {
            match operation(attempt) {
                Ok(value) => return Ok(value),
                Err(error) if !is_retryable(&error) => {
                    return Err(RetryError::NonRetryable { attempt, error, failures });
                }
                Err(error) => {
                    debug!(attempt, budget = self.budget, error = %error, "Attempt failed");
                    failures.push(error);
                    if attempt < self.budget {
                        self.sleeper.sleep(self.backoff.delay(attempt));
                    }
                }
            }
        }

        Err(RetryError::Exhausted { attempts: self.budget, failures })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::RecordingSleeper;

    fn backoff() -> LinearBackoff {
        LinearBackoff::new(Duration::from_millis(200))
    }

    #[test]
    fn returns_first_success_without_sleeping() {
        let sleeper = RecordingSleeper::new();
        let retry = BlockingRetry::new(5, backoff(), &sleeper);

        let result: Result<u32, RetryError<String>> = retry.run(Ok, |_| true);

        assert_eq!(result.unwrap(), 1);
        assert!(sleeper.recorded().is_empty());
    }

    #[test]
    fn sleeps_linearly_between_failures_but_not_after_last() {
        let sleeper = RecordingSleeper::new();
        let retry = BlockingRetry::new(3, backoff(), &sleeper);

        let result: Result<(), _> = retry.run(|attempt| Err(format!("boom {attempt}")), |_| true);

        match result {
            Err(RetryError::Exhausted { attempts, failures }) => {
                assert_eq!(attempts, 3);
                assert_eq!(failures, vec!["boom 1", "boom 2", "boom 3"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(
            sleeper.recorded(),
            vec![Duration::from_millis(200), Duration::from_millis(400)]
        );
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let sleeper = RecordingSleeper::new();
        let retry = BlockingRetry::new(10, backoff(), &sleeper);

        let result = retry.run(
            |attempt| if attempt < 3 { Err("flaky".to_string()) } else { Ok(attempt) },
            |_| true,
        );

        assert_eq!(result.unwrap(), 3);
        assert_eq!(sleeper.recorded().len(), 2);
    }

    #[test]
    fn stops_on_non_retryable_error() {
        let sleeper = RecordingSleeper::new();
        let retry = BlockingRetry::new(10, backoff(), &sleeper);

        let result: Result<(), _> = retry.run(
            |attempt| Err(if attempt == 1 { "transient" } else { "fatal" }.to_string()),
            |e| e != "fatal",
        );

        let err = result.unwrap_err();
        assert_eq!(err.attempts(), 2);
        assert!(matches!(err, RetryError::NonRetryable { ref error, .. } if error == "fatal"));
    }

    #[test]
    fn zero_budget_still_makes_one_attempt() {
        let sleeper = RecordingSleeper::new();
        let retry = BlockingRetry::new(0, backoff(), &sleeper);
        assert_eq!(retry.budget(), 1);
    }
}
