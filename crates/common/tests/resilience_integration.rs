//! Integration tests for the blocking retry loop

#![cfg(feature = "test-utils")]

use std::time::Duration;

use siilink_common::resilience::{BlockingRetry, LinearBackoff, RetryError};
use siilink_common::testing::RecordingSleeper;

/// A budget of N allows exactly N attempts and N-1 waits of growing length.
#[test]
fn test_exhaustion_collects_every_failure() {
    let sleeper = RecordingSleeper::new();
    let retry = BlockingRetry::new(4, LinearBackoff::new(Duration::from_millis(100)), &sleeper);

    let result: Result<(), RetryError<String>> =
        retry.run(|attempt| Err(format!("attempt {attempt} refused")), |_| true);

    match result {
        Err(RetryError::Exhausted { attempts, failures }) => {
            assert_eq!(attempts, 4);
            assert_eq!(failures, ["attempt 1 refused", "attempt 2 refused", "attempt 3 refused", "attempt 4 refused"]);
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(
        sleeper.recorded(),
        [Duration::from_millis(100), Duration::from_millis(200), Duration::from_millis(300)]
    );
}

/// Success on the last allowed attempt is still a success.
#[test]
fn test_success_on_last_attempt() {
    let sleeper = RecordingSleeper::new();
    let retry = BlockingRetry::new(3, LinearBackoff::new(Duration::from_millis(10)), &sleeper);

    let result: Result<u32, RetryError<&str>> =
        retry.run(|attempt| if attempt < 3 { Err("busy") } else { Ok(attempt) }, |_| true);

    assert_eq!(result.unwrap(), 3);
    assert_eq!(sleeper.total(), Duration::from_millis(30));
}

/// A non-retryable failure stops the loop immediately without waiting.
#[test]
fn test_non_retryable_failure_stops_the_loop() {
    let sleeper = RecordingSleeper::new();
    let retry = BlockingRetry::new(5, LinearBackoff::new(Duration::from_millis(10)), &sleeper);

    let result: Result<(), RetryError<&str>> = retry.run(
        |attempt| if attempt == 1 { Err("transient") } else { Err("fatal") },
        |failure| *failure == "transient",
    );

    match result {
        Err(RetryError::NonRetryable { attempt, error, failures }) => {
            assert_eq!(attempt, 2);
            assert_eq!(error, "fatal");
            assert_eq!(failures, ["transient"]);
        }
        other => panic!("expected non-retryable stop, got {other:?}"),
    }
    assert_eq!(sleeper.recorded(), [Duration::from_millis(10)]);
}

/// Zero budgets still make one attempt.
#[test]
fn test_zero_budget_makes_one_attempt() {
    let sleeper = RecordingSleeper::new();
    let retry = BlockingRetry::new(0, LinearBackoff::new(Duration::from_millis(10)), &sleeper);

    let result: Result<(), RetryError<&str>> = retry.run(|_| Err("down"), |_| true);

    assert_eq!(result.unwrap_err().attempts(), 1);
    assert!(sleeper.recorded().is_empty());
}
