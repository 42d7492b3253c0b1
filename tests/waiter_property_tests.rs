//! Property tests for the bounded polling primitive
//!
//! Each case drives a waiter to exhaustion on a paused clock, so the
//! attempt counts are exact functions of timeout and interval.

use ocs_harness::waiter::Waiter;
use proptest::prelude::*;

fn run_to_exhaustion(timeout: u64, interval: u64) -> (u64, bool) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("runtime");
    rt.block_on(async {
        let mut w = Waiter::from_secs(timeout, interval);
        let mut attempts = 0u64;
        while w.next().await {
            attempts += 1;
        }
        (attempts, w.expired())
    })
}

proptest! {
    #[test]
    fn at_least_one_attempt_for_any_budget(timeout in 0u64..120, interval in 1u64..30) {
        let (attempts, expired) = run_to_exhaustion(timeout, interval);
        prop_assert!(attempts >= 1);
        prop_assert!(expired);
    }

    #[test]
    fn attempt_count_is_bounded_by_the_budget(timeout in 0u64..120, interval in 1u64..30) {
        let (attempts, _) = run_to_exhaustion(timeout, interval);
        // Attempts land at t=0, interval, 2*interval, ..., up to and
        // including the deadline itself.
        prop_assert!(attempts <= timeout / interval + 2);
    }

    #[test]
    fn breaking_early_never_reports_expiry(timeout in 1u64..120, interval in 1u64..30) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .expect("runtime");
        let expired = rt.block_on(async {
            let mut w = Waiter::from_secs(timeout, interval);
            while w.next().await {
                break;
            }
            w.expired()
        });
        prop_assert!(!expired);
    }
}
