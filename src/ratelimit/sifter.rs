//! Rate limiting as a sifter.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use super::key::{LimitKey, UserKey};
use super::limiter::{GcraLimiter, LimiterOptions};
use super::quota::{KindQuota, Quota};
use crate::error::Result;
use crate::input::{Decision, Input};
use crate::sifters::{Rejectable, Rejection, Sifter};

const DEFAULT_REJECTION: &str = "rate-limited: rate limit exceeded";

type ExcludeFn = Arc<dyn Fn(&Input) -> bool + Send + Sync>;

struct KindLimiter {
    quota: KindQuota,
    limiter: GcraLimiter,
}

/// Rejects inputs from users who exceed their quota.
///
/// Only inputs from end-user clients are limited; imported and relayed
/// events, inputs matching the exclusion predicate and inputs whose identity
/// can't be determined are always accepted. When quotas are per kind, the
/// first quota whose kind predicate matches applies and each quota tracks
/// users independently; events of kinds no quota matches are accepted.
pub struct RateLimitSifter {
    limiters: Vec<KindLimiter>,
    user_key: UserKey,
    per_kind: bool,
    exclude: Option<ExcludeFn>,
    rejection: Rejection,
}

/// Limit every user to `quota`.
pub fn by_user(quota: Quota, user_key: UserKey) -> Result<RateLimitSifter> {
    RateLimitSifter::by_user(quota, user_key, &LimiterOptions::default())
}

/// Limit every user per event kind, with the quota chosen by kind.
pub fn by_user_and_kind(quotas: Vec<KindQuota>, user_key: UserKey) -> Result<RateLimitSifter> {
    RateLimitSifter::by_user_and_kind(quotas, user_key, &LimiterOptions::default())
}

impl RateLimitSifter {
    pub fn by_user(quota: Quota, user_key: UserKey, options: &LimiterOptions) -> Result<Self> {
        let limiters = vec![KindLimiter {
            quota: quota.for_kinds_matching(|_| true),
            limiter: GcraLimiter::new(quota, options)?,
        }];
        Ok(Self::new(limiters, user_key, false))
    }

    pub fn by_user_and_kind(
        quotas: Vec<KindQuota>,
        user_key: UserKey,
        options: &LimiterOptions,
    ) -> Result<Self> {
        let limiters = quotas
            .into_iter()
            .map(|kq| {
                let limiter = GcraLimiter::new(kq.quota(), options)?;
                Ok(KindLimiter { quota: kq, limiter })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(limiters, user_key, true))
    }

    fn new(limiters: Vec<KindLimiter>, user_key: UserKey, per_kind: bool) -> Self {
        Self {
            limiters,
            user_key,
            per_kind,
            exclude: None,
            rejection: Rejection::message(DEFAULT_REJECTION),
        }
    }

    /// Never rate limit inputs for which `exclude` returns true.
    pub fn exclude<F>(mut self, exclude: F) -> Self
    where
        F: Fn(&Input) -> bool + Send + Sync + 'static,
    {
        self.exclude = Some(Arc::new(exclude));
        self
    }

    /// The key `input` is limited under, or `None` if it isn't limited.
    pub fn limit_key(&self, input: &Input) -> Option<LimitKey> {
        if !input.source_type.is_end_user() {
            return None;
        }
        if self.exclude.as_ref().is_some_and(|exclude| exclude(input)) {
            return None;
        }
        LimitKey::derive(input, self.user_key, self.per_kind)
    }

    fn select_limiter(&self, kind: u32) -> Option<&GcraLimiter> {
        self.limiters
            .iter()
            .find(|kl| kl.quota.matches(kind))
            .map(|kl| &kl.limiter)
    }
}

#[async_trait]
impl Sifter for RateLimitSifter {
    async fn sift(&self, input: &Input) -> Result<Decision> {
        let Some(key) = self.limit_key(input) else {
            trace!(id = %input.event.id, "Not subject to rate limiting");
            return Ok(input.accept());
        };
        let Some(limiter) = self.select_limiter(input.event.kind) else {
            trace!(id = %input.event.id, kind = input.event.kind, "No quota for kind");
            return Ok(input.accept());
        };

        let result = limiter.check(key.as_str()).await?;
        if result.limited {
            debug!(key = %key, id = %input.event.id, "Rate limited event");
            return Ok(self.rejection.apply(input));
        }
        Ok(input.accept())
    }
}

impl Rejectable for RateLimitSifter {
    fn rejection_mut(&mut self) -> &mut Rejection {
        &mut self.rejection
    }
}

impl fmt::Debug for RateLimitSifter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitSifter")
            .field("quotas", &self.limiters.iter().map(|kl| kl.quota.quota()).collect::<Vec<_>>())
            .field("user_key", &self.user_key)
            .field("per_kind", &self.per_kind)
            .field("rejection", &self.rejection)
            .finish_non_exhaustive()
    }
}
