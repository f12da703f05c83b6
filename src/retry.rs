//! Loop pacing: how long to wait between iterations and after failures.
//!
//! Both long-running loops take their timing as values instead of
//! sleeping on hard-coded constants, and the controller sleeps through
//! a [`Sleeper`] so tests can run without real delays.
//!
//! ## Rust concepts
//! - Small `Copy` value types for configuration
//! - A trait with a blanket `impl` for `Arc<T>`
//! - `Send + Sync` bounds for values that cross into a thread

use std::sync::Arc;
use std::thread;
use std::time::Duration;

// ── Retry policy ─────────────────────────────────────────────────────

/// Fixed-interval retry with no attempt limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    interval: Duration,
}

impl RetryPolicy {
    pub fn fixed(interval: Duration) -> Self {
        Self { interval }
    }

    /// Delay before retry number `attempt` (1-based). Always the same.
    pub fn delay(&self, _attempt: u32) -> Duration {
        self.interval
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

// ── Monitor pacing ───────────────────────────────────────────────────

/// Outcome of one monitor iteration, deciding the wait before the next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// The mailbox was queried successfully.
    Ready,
    /// Connecting or querying failed; back off before trying again.
    Backoff,
}

/// Short cadence on the happy path, long backoff after an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pacing {
    pub cadence: Duration,
    pub backoff: RetryPolicy,
}

impl Pacing {
    pub const CADENCE: Duration = Duration::from_secs(1);
    pub const ERROR_BACKOFF: Duration = Duration::from_secs(60);

    pub fn new(cadence: Duration, backoff: RetryPolicy) -> Self {
        Self { cadence, backoff }
    }

    /// One second between polls, one minute after a failure.
    pub fn monitor() -> Self {
        Self::new(Self::CADENCE, RetryPolicy::fixed(Self::ERROR_BACKOFF))
    }

    /// `failures` counts consecutive failed ticks, including this one.
    pub fn delay_after(&self, tick: Tick, failures: u32) -> Duration {
        match tick {
            Tick::Ready => self.cadence,
            Tick::Backoff => self.backoff.delay(failures),
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::monitor()
    }
}

// ── Controller timing ────────────────────────────────────────────────

/// Blink half-period and the wait between failed device opens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControllerTiming {
    pub blink: Duration,
    pub open_retry: RetryPolicy,
}

impl ControllerTiming {
    pub const BLINK: Duration = Duration::from_millis(100);
    pub const OPEN_RETRY: Duration = Duration::from_secs(10);
}

impl Default for ControllerTiming {
    fn default() -> Self {
        Self {
            blink: Self::BLINK,
            open_retry: RetryPolicy::fixed(Self::OPEN_RETRY),
        }
    }
}

// ── Sleeping ─────────────────────────────────────────────────────────

/// Blocking sleep used by the controller thread.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Real wall-clock sleeping via `std::thread::sleep`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

impl<T: Sleeper + ?Sized> Sleeper for Arc<T> {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::sync::Mutex;

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(1_000)]
    #[case(u32::MAX)]
    fn fixed_policy_never_grows_or_gives_up(#[case] attempt: u32) {
        let policy = RetryPolicy::fixed(Duration::from_secs(10));
        assert_eq!(policy.delay(attempt), Duration::from_secs(10));
    }

    #[test]
    fn monitor_pacing_uses_short_cadence_when_ready() {
        let pacing = Pacing::monitor();
        assert_eq!(pacing.delay_after(Tick::Ready, 0), Duration::from_secs(1));
    }

    #[test]
    fn monitor_pacing_backs_off_after_errors() {
        let pacing = Pacing::monitor();
        assert_eq!(pacing.delay_after(Tick::Backoff, 1), Duration::from_secs(60));
        assert_eq!(pacing.delay_after(Tick::Backoff, 50), Duration::from_secs(60));
    }

    #[test]
    fn controller_timing_defaults() {
        let timing = ControllerTiming::default();
        assert_eq!(timing.blink, Duration::from_millis(100));
        assert_eq!(timing.open_retry.interval(), Duration::from_secs(10));
    }

    struct Recording(Mutex<Vec<Duration>>);

    impl Sleeper for Recording {
        fn sleep(&self, duration: Duration) {
            self.0.lock().unwrap().push(duration);
        }
    }

    #[test]
    fn arc_sleeper_delegates() {
        let inner = Arc::new(Recording(Mutex::new(Vec::new())));
        let shared: Arc<Recording> = inner.clone();
        shared.sleep(Duration::from_millis(3));
        Sleeper::sleep(&shared, Duration::from_millis(4));
        assert_eq!(
            *inner.0.lock().unwrap(),
            vec![Duration::from_millis(3), Duration::from_millis(4)]
        );
    }
}
