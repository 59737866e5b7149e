//! Per-user admission control using GCRA.

mod key;
mod limiter;
mod quota;
mod sifter;
mod store;

pub use key::{LimitKey, UserKey};
pub use limiter::{
    gcra_step, GcraLimiter, GcraVerdict, LimiterOptions, RateLimitResult, DEFAULT_CHECK_TIMEOUT,
};
pub use quota::{KindQuota, Quota, Rate, TimeUnit};
pub use sifter::{by_user, by_user_and_kind, RateLimitSifter};
pub use store::{GcraStep, MemoryStore, TatStore, DEFAULT_CAPACITY};
