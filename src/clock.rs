//! Time sources.
//!
//! Anything time-dependent (the GCRA limiter, timestamp matchers) takes a
//! [`Clock`] at construction instead of reading the system time directly,
//! so tests can drive time explicitly with [`MockClock`].

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of the current time.
pub trait Clock: Send + Sync + Debug {
    /// Monotonic now, used for rate limiter arithmetic.
    fn now(&self) -> Instant;

    /// Wall-clock now, used to compare against event timestamps.
    fn utc_now(&self) -> DateTime<Utc>;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests.
///
/// Clones share the same time; advancing one advances all of them.
#[derive(Debug, Clone)]
pub struct MockClock {
    state: Arc<Mutex<(Instant, DateTime<Utc>)>>,
}

impl MockClock {
    /// Create a mock clock frozen at the current system time.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Create a mock clock whose wall-clock reading starts at `utc`.
    pub fn starting_at(utc: DateTime<Utc>) -> Self {
        Self {
            state: Arc::new(Mutex::new((Instant::now(), utc))),
        }
    }

    /// Advance both readings by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut state = self.state.lock();
        state.0 += duration;
        state.1 += chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.state.lock().0
    }

    fn utc_now(&self) -> DateTime<Utc> {
        self.state.lock().1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_clock_advance() {
        let clock = MockClock::new();
        let (t0, u0) = (clock.now(), clock.utc_now());

        clock.advance(Duration::from_secs(10));

        assert_eq!(clock.now(), t0 + Duration::from_secs(10));
        assert_eq!(clock.utc_now(), u0 + chrono::Duration::seconds(10));
    }

    #[test]
    fn test_mock_clock_clones_share_time() {
        let clock = MockClock::new();
        let other = clock.clone();

        other.advance(Duration::from_millis(1500));

        assert_eq!(clock.now(), other.now());
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock::new();
        let t1 = clock.now();
        std::thread::sleep(Duration::from_millis(5));
        assert!(clock.now() > t1);
    }
}
