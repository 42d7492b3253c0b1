//! Tests for the bounded polling primitive
//!
//! Timing-sensitive cases run under tokio's paused clock so attempt counts
//! are exact; the wall-clock cases assert on real elapsed time with wide
//! margins.

use ocs_harness::error::HarnessError;
use ocs_harness::waiter::Waiter;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn check_that_always_fails_expires_after_timeout() {
    // timeout=30 interval=10 gives attempts at t=0,10,20,30.
    let mut w = Waiter::from_secs(30, 10);
    let start = Instant::now();
    let mut attempts = 0;
    while w.next().await {
        attempts += 1; // check "fails", keep looping
    }
    assert_eq!(attempts, 4);
    assert!(w.expired());
    // Total time is bounded by timeout + interval.
    assert!(start.elapsed() <= Duration::from_secs(40));
}

#[tokio::test(start_paused = true)]
async fn check_that_succeeds_on_second_attempt_breaks_early() {
    let mut w = Waiter::from_secs(30, 10);
    let mut attempts = 0;
    while w.next().await {
        attempts += 1;
        if attempts == 2 {
            break;
        }
    }
    assert_eq!(attempts, 2);
    assert!(!w.expired());
}

#[tokio::test(start_paused = true)]
async fn zero_timeout_still_offers_one_attempt() {
    let mut w = Waiter::from_secs(0, 5);
    let mut attempts = 0;
    while w.next().await {
        attempts += 1;
    }
    assert_eq!(attempts, 1);
    assert!(w.expired());
}

#[tokio::test]
async fn immediate_success_does_not_sleep() {
    // Real clock: with a 10s interval, breaking on the first attempt must
    // return well before a single interval could elapse.
    let start = std::time::Instant::now();
    let mut w = Waiter::from_secs(30, 10);
    while w.next().await {
        break;
    }
    assert!(!w.expired());
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn no_trailing_sleep_once_deadline_passed() {
    let mut w = Waiter::from_secs(10, 10);
    while w.next().await {}
    assert!(w.expired());
    // The terminating call must not sleep another interval.
    let before = Instant::now();
    assert!(!w.next().await);
    assert_eq!(before.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn error_in_check_body_propagates_immediately() {
    async fn wait_with_failing_check() -> Result<(), HarnessError> {
        let mut w = Waiter::from_secs(30, 10);
        while w.next().await {
            // A non-transient failure aborts the whole wait.
            return Err(HarnessError::Config(
                ocs_harness::error::ConfigError::MissingField("cluster".to_string()),
            ));
        }
        unreachable!("first attempt always runs");
    }

    let err = wait_with_failing_check().await.unwrap_err();
    assert!(matches!(err, HarnessError::Config(_)));
}

#[tokio::test(start_paused = true)]
async fn caller_builds_the_timeout_error() {
    // The waiter itself never errors; this is the calling convention every
    // cluster helper follows.
    let mut w = Waiter::from_secs(5, 1);
    while w.next().await {
        // check never succeeds
    }
    let result: Result<(), HarnessError> = if w.expired() {
        Err(HarnessError::Timeout {
            what: "resource autotests-pvc-x to be deleted".to_string(),
            seconds: w.timeout_secs(),
        })
    } else {
        Ok(())
    };
    let msg = result.unwrap_err().to_string();
    assert!(msg.contains("5s"));
    assert!(msg.contains("autotests-pvc-x"));
}
