//! Short-horizon in-memory layer in front of the durable store.
//!
//! Answers "was this key added in the last few seconds?" without a store
//! round-trip. A hit is authoritative; a miss is not, since entries age out
//! long before the durable TTL.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Bounded map of recently added keys with a fixed lifetime.
///
/// Reads use `peek`, so recency order is insertion order and a full cache
/// evicts the key whose last `set` is oldest.
///
/// # Lock Poisoning
///
/// Fails open: a poisoned lock turns `get` into a miss (the caller falls
/// through to the store) and `set` into a no-op.
pub struct HotCache {
    entries: Mutex<LruCache<String, Instant>>,
    lifetime: Duration,
}

impl HotCache {
    pub fn new(capacity: NonZeroUsize, lifetime: Duration) -> Self {
        Self { entries: Mutex::new(LruCache::new(capacity)), lifetime }
    }

    /// Mark `key` present and restart its lifetime.
    pub fn set(&self, key: &str) {
        let Ok(mut entries) = self.entries.lock() else {
            tracing::warn!(key, "hot cache lock poisoned, skipping set");
            return;
        };
        entries.put(key.to_string(), Instant::now());
    }

    /// True iff `key` is present and younger than the lifetime.
    ///
    /// An expired entry found here is evicted.
    pub fn get(&self, key: &str) -> bool {
        let Ok(mut entries) = self.entries.lock() else {
            return false;
        };

        match entries.peek(key).map(|set_at| set_at.elapsed() < self.lifetime) {
            Some(true) => true,
            Some(false) => {
                entries.pop(key);
                false
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
