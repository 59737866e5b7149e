//! Quotas: how many writes are allowed per period, plus burst.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, SieveError};

/// Time unit for rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    /// Get the duration of this time unit.
    pub fn duration(&self) -> Duration {
        match self {
            TimeUnit::Second => Duration::from_secs(1),
            TimeUnit::Minute => Duration::from_secs(60),
            TimeUnit::Hour => Duration::from_secs(3600),
            TimeUnit::Day => Duration::from_secs(86400),
        }
    }
}

/// `count` requests per `period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
    pub count: u32,
    pub period: Duration,
}

impl Rate {
    pub fn per(count: u32, unit: TimeUnit) -> Self {
        Self::per_duration(count, unit.duration())
    }

    pub fn per_duration(count: u32, period: Duration) -> Self {
        Self { count, period }
    }

    /// Spacing between admissions at the steady rate (`period / count`).
    pub fn emission_interval(&self) -> Result<Duration> {
        match self.period.checked_div(self.count) {
            Some(interval) if !interval.is_zero() => Ok(interval),
            _ => Err(SieveError::Config(format!(
                "invalid rate: {} per {:?}",
                self.count, self.period
            ))),
        }
    }
}

/// A rate plus the number of extra requests that may be admitted back-to-back.
///
/// Quotas built by the `per_*` constructors allow no burst; use
/// [`Quota::with_burst`] to allow one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub rate: Rate,
    pub burst: u32,
}

impl Quota {
    pub fn per_second(n: u32) -> Self {
        Self::from_rate(Rate::per(n, TimeUnit::Second))
    }

    pub fn per_minute(n: u32) -> Self {
        Self::from_rate(Rate::per(n, TimeUnit::Minute))
    }

    pub fn per_hour(n: u32) -> Self {
        Self::from_rate(Rate::per(n, TimeUnit::Hour))
    }

    pub fn per_day(n: u32) -> Self {
        Self::from_rate(Rate::per(n, TimeUnit::Day))
    }

    pub fn per_duration(n: u32, period: Duration) -> Self {
        Self::from_rate(Rate::per_duration(n, period))
    }

    fn from_rate(rate: Rate) -> Self {
        Self { rate, burst: 0 }
    }

    pub fn with_burst(self, burst: u32) -> Self {
        Self { burst, ..self }
    }

    /// Only apply this quota to events whose kind is in `kinds`.
    pub fn for_kinds(self, kinds: impl IntoIterator<Item = u32>) -> KindQuota {
        let kinds: std::collections::HashSet<u32> = kinds.into_iter().collect();
        self.for_kinds_matching(move |k| kinds.contains(&k))
    }

    /// Only apply this quota to events whose kind satisfies `matches`.
    pub fn for_kinds_matching<F>(self, matches: F) -> KindQuota
    where
        F: Fn(u32) -> bool + Send + Sync + 'static,
    {
        KindQuota {
            matches: Arc::new(matches),
            quota: self,
        }
    }
}

/// A quota restricted to some event kinds.
#[derive(Clone)]
pub struct KindQuota {
    pub(crate) matches: Arc<dyn Fn(u32) -> bool + Send + Sync>,
    pub(crate) quota: Quota,
}

impl KindQuota {
    pub fn matches(&self, kind: u32) -> bool {
        (self.matches)(kind)
    }

    pub fn quota(&self) -> Quota {
        self.quota
    }
}

impl fmt::Debug for KindQuota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindQuota").field("quota", &self.quota).finish_non_exhaustive()
    }
}
