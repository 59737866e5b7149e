//! Storage for per-key GCRA state.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt::Debug;
use std::time::Duration;
use tracing::debug;

use super::limiter::GcraVerdict;
use crate::error::Result;

/// Default number of keys a [`MemoryStore`] tracks before evicting.
pub const DEFAULT_CAPACITY: usize = 65536;

/// Number of entries inspected when choosing an eviction victim.
const EVICTION_SAMPLE: usize = 32;

/// A GCRA step: given the stored TAT (`None` for an unseen key), decide
/// admission and the TAT to store.
pub type GcraStep<'a> = &'a (dyn Fn(Option<Duration>) -> GcraVerdict + Send + Sync);

/// Storage for theoretical arrival times, keyed by limit key.
///
/// Implementations must run `step` and store its resulting TAT atomically
/// with respect to other calls for the same key.
#[async_trait]
pub trait TatStore: Send + Sync + Debug {
    /// Apply `step` to the state under `key`. `now` is the caller's current
    /// time on the same timeline as the stored TATs.
    async fn transact(&self, key: &str, now: Duration, step: GcraStep<'_>) -> Result<GcraVerdict>;

    /// Get the number of tracked keys.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    tat: Duration,
    touched: Duration,
}

/// In-process, sharded, capacity-bounded TAT store.
///
/// When full, inserting a new key evicts the least recently touched entry
/// among a small sample. An evicted key starts over with a fresh quota.
#[derive(Debug)]
pub struct MemoryStore {
    slots: DashMap<String, Slot>,
    capacity: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Get the stored TAT for a key.
    pub fn tat(&self, key: &str) -> Option<Duration> {
        self.slots.get(key).map(|s| s.tat)
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.slots.clear();
    }

    fn evict_one(&self) {
        // Guards from iter() must be dropped before remove() takes the shard lock.
        let victim = self
            .slots
            .iter()
            .take(EVICTION_SAMPLE)
            .min_by_key(|entry| entry.value().touched)
            .map(|entry| entry.key().clone());

        if let Some(key) = victim {
            debug!(key = %key, "Evicting rate limit state");
            self.slots.remove(&key);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TatStore for MemoryStore {
    async fn transact(&self, key: &str, now: Duration, step: GcraStep<'_>) -> Result<GcraVerdict> {
        if !self.slots.contains_key(key) && self.slots.len() >= self.capacity {
            self.evict_one();
        }

        // The entry guard holds the shard's write lock until the slot is updated.
        let verdict = match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                let verdict = step(Some(slot.tat));
                slot.tat = verdict.tat;
                slot.touched = now;
                verdict
            }
            Entry::Vacant(vacant) => {
                let verdict = step(None);
                vacant.insert(Slot {
                    tat: verdict.tat,
                    touched: now,
                });
                verdict
            }
        };
        Ok(verdict)
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}
