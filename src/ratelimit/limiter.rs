//! GCRA (Generic Cell Rate Algorithm) rate limiter.
//!
//! Each key carries a theoretical arrival time (TAT). With emission interval
//! `T` and burst `B`, a request at `now` is admitted iff
//! `now >= TAT - B*T`; admission moves the TAT to `max(TAT, now) + T`.
//! Denied requests leave the TAT untouched.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::quota::Quota;
use super::store::{MemoryStore, TatStore};
use crate::clock::{Clock, SystemClock};
use crate::error::{Result, SieveError};

/// Default bound on a single state store call.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of one GCRA step for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcraVerdict {
    pub admitted: bool,
    /// TAT to store after this step
    pub tat: Duration,
    /// Requests that could still be admitted right now
    pub remaining: u32,
    /// When a denied request could next be admitted
    pub retry_after: Option<Duration>,
}

/// Run one GCRA step at time `now` on a key whose stored TAT is `prev`.
pub fn gcra_step(
    prev: Option<Duration>,
    now: Duration,
    interval: Duration,
    tolerance: Duration,
) -> GcraVerdict {
    let tat = prev.unwrap_or(now);
    let allow_at = tat.saturating_sub(tolerance);

    if now < allow_at {
        return GcraVerdict {
            admitted: false,
            tat,
            remaining: 0,
            retry_after: Some(allow_at - now),
        };
    }

    let new_tat = tat.max(now) + interval;
    // Capacity left is how far the new TAT stays within the tolerance window.
    let remaining = (now + tolerance)
        .checked_sub(new_tat)
        .map(|slack| (slack.as_nanos() / interval.as_nanos()) as u32 + 1)
        .unwrap_or(0);

    GcraVerdict {
        admitted: true,
        tat: new_tat,
        remaining,
        retry_after: None,
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    pub limited: bool,
    pub remaining: u32,
    pub retry_after: Option<Duration>,
}

/// Knobs shared by every limiter a rate-limit sifter creates.
#[derive(Debug, Clone)]
pub struct LimiterOptions {
    pub clock: Arc<dyn Clock>,
    pub store_capacity: usize,
    pub check_timeout: Duration,
}

impl Default for LimiterOptions {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock::new()),
            store_capacity: super::store::DEFAULT_CAPACITY,
            check_timeout: DEFAULT_CHECK_TIMEOUT,
        }
    }
}

/// A GCRA limiter for one quota, tracking every key independently.
///
/// This struct is thread-safe and can be shared across multiple tasks.
#[derive(Debug)]
pub struct GcraLimiter {
    quota: Quota,
    interval: Duration,
    tolerance: Duration,
    store: Arc<dyn TatStore>,
    clock: Arc<dyn Clock>,
    epoch: Instant,
    timeout: Duration,
}

impl GcraLimiter {
    /// Create a limiter backed by its own [`MemoryStore`].
    pub fn new(quota: Quota, options: &LimiterOptions) -> Result<Self> {
        let store = Arc::new(MemoryStore::with_capacity(options.store_capacity));
        Self::with_store(quota, store, options.clock.clone(), options.check_timeout)
    }

    /// Create a limiter over an explicit store.
    pub fn with_store(
        quota: Quota,
        store: Arc<dyn TatStore>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Result<Self> {
        let interval = quota.rate.emission_interval()?;
        let tolerance = interval
            .checked_mul(quota.burst)
            .ok_or_else(|| SieveError::Config(format!("burst {} is too large", quota.burst)))?;
        let epoch = clock.now();

        Ok(Self {
            quota,
            interval,
            tolerance,
            store,
            clock,
            epoch,
            timeout,
        })
    }

    pub fn quota(&self) -> Quota {
        self.quota
    }

    /// Get the number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }

    /// Check (and count) one request for `key`.
    ///
    /// Store calls slower than the configured timeout fail with
    /// [`SieveError::LimiterTimeout`].
    pub async fn check(&self, key: &str) -> Result<RateLimitResult> {
        let now = self.clock.now().saturating_duration_since(self.epoch);
        let (interval, tolerance) = (self.interval, self.tolerance);
        let step = move |prev: Option<Duration>| gcra_step(prev, now, interval, tolerance);

        trace!(key = %key, "Checking rate limit");

        let verdict = tokio::time::timeout(self.timeout, self.store.transact(key, now, &step))
            .await
            .map_err(|_| SieveError::LimiterTimeout(self.timeout))??;

        if !verdict.admitted {
            debug!(key = %key, retry_after = ?verdict.retry_after, "Rate limit exceeded");
        }

        Ok(RateLimitResult {
            limited: !verdict.admitted,
            remaining: verdict.remaining,
            retry_after: verdict.retry_after,
        })
    }
}
