//! Bounded polling for eventually-consistent cluster state
//!
//! Every wait in the harness ("PVC bound", "pod ready", "node reachable",
//! "resource gone") is the same shape: retry a check until it succeeds or a
//! deadline passes, sleeping a fixed interval between attempts. `Waiter`
//! owns the timing; the caller owns the check and the error it raises on
//! timeout.
//!
//! ```no_run
//! # async fn check() -> bool { true }
//! # async fn demo() -> Result<(), ocs_harness::error::HarnessError> {
//! use std::time::Duration;
//! use ocs_harness::waiter::Waiter;
//!
//! let mut w = Waiter::new(Duration::from_secs(60), Duration::from_secs(5));
//! while w.next().await {
//!     if check().await {
//!         break;
//!     }
//! }
//! if w.expired() {
//!     return Err(ocs_harness::error::HarnessError::Timeout {
//!         what: "pod my-pod to become ready".to_string(),
//!         seconds: 60,
//!     });
//! }
//! # Ok(()) }
//! ```

use std::time::Duration;
use tokio::time::Instant;

/// A finite stream of retry attempts bounded by a wall-clock deadline.
///
/// The deadline clock starts at construction. One instance serves one wait;
/// it is not restartable, and a caller that holds on to a `Waiter` across
/// two loops shares the one time budget between them.
#[derive(Debug)]
pub struct Waiter {
    start: Instant,
    timeout: Duration,
    interval: Duration,
    first: bool,
    expired: bool,
}

impl Waiter {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            start: Instant::now(),
            timeout,
            interval,
            first: true,
            expired: false,
        }
    }

    /// Convenience constructor matching the second/interval pairs the
    /// cluster helpers take.
    pub fn from_secs(timeout: u64, interval: u64) -> Self {
        Self::new(Duration::from_secs(timeout), Duration::from_secs(interval))
    }

    /// Advance to the next attempt.
    ///
    /// Returns `true` when the caller should run its check. The first call
    /// always returns `true`, even with a zero timeout, so a single check
    /// never needs special-casing. Subsequent calls test the deadline
    /// first and only then sleep `interval`, so an exhausted waiter never
    /// pays a trailing sleep. Once this returns `false` it stays `false`.
    pub async fn next(&mut self) -> bool {
        if self.expired {
            return false;
        }
        if self.first {
            self.first = false;
            return true;
        }
        if self.start.elapsed() >= self.timeout {
            self.expired = true;
            return false;
        }
        tokio::time::sleep(self.interval).await;
        true
    }

    /// `true` iff the attempt stream ended because the deadline passed.
    ///
    /// Stays `false` when the caller broke out of its loop early. The
    /// waiter never raises on timeout itself; callers inspect this and
    /// build their own error naming the resource and the timeout.
    pub fn expired(&self) -> bool {
        self.expired
    }

    /// Seconds in the original time budget, for timeout error messages.
    pub fn timeout_secs(&self) -> u64 {
        self.timeout.as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_yields_exactly_one_attempt() {
        let mut w = Waiter::from_secs(0, 5);
        let mut attempts = 0;
        while w.next().await {
            attempts += 1;
        }
        assert_eq!(attempts, 1);
        assert!(w.expired());
    }

    #[tokio::test(start_paused = true)]
    async fn early_break_leaves_expired_false() {
        let mut w = Waiter::from_secs(30, 10);
        while w.next().await {
            break; // check succeeded on the first attempt
        }
        assert!(!w.expired());
    }

    #[tokio::test(start_paused = true)]
    async fn failing_check_sees_bounded_attempt_count() {
        // timeout=30 interval=10: attempts at t=0,10,20,30, then expiry.
        let mut w = Waiter::from_secs(30, 10);
        let mut attempts = 0;
        while w.next().await {
            attempts += 1;
        }
        assert_eq!(attempts, 4);
        assert!(w.expired());
    }

    #[tokio::test(start_paused = true)]
    async fn success_mid_stream_stops_the_clock() {
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
    async fn exhausted_waiter_stays_exhausted() {
        let mut w = Waiter::from_secs(0, 1);
        while w.next().await {}
        assert!(w.expired());
        assert!(!w.next().await);
        assert!(w.expired());
    }

    #[tokio::test(start_paused = true)]
    async fn reuse_after_break_shares_the_budget() {
        let mut w = Waiter::from_secs(20, 10);
        while w.next().await {
            break;
        }
        // Second loop over the same waiter keeps the original deadline:
        // attempts land at t=10 and t=20, then the stream ends.
        let mut attempts = 0;
        while w.next().await {
            attempts += 1;
        }
        assert_eq!(attempts, 2);
        assert!(w.expired());
    }
}
