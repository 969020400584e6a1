//! Thread-safe expiring cache.
//!
//! Generic key→value store with per-entry TTL and a bounded entry count.
//! Memoizes full query results in the batch pipeline driver; also suitable
//! for configuration and client handles.
//!
//! ## Guarantees
//! - A hit never returns an entry past its TTL; reading an expired entry
//!   behaves as a miss and evicts it.
//! - Inserting beyond capacity evicts exactly one least-recently-used entry
//!   per overflow, so `len() <= capacity` always holds.
//! - Hits promote the entry to most-recently-used.
//! - All operations take one mutual-exclusion lock per instance; the lock is
//!   never held across I/O or await points.
//!
//! ## Edge cases
//! - Capacity 0: every `set` inserts and immediately evicts, so the cache
//!   stores nothing.
//! - TTL of zero: the entry expires immediately and the next `get` is a miss.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tracing::debug;

/// One stored value with its expiry instant and recency stamp.
struct CacheSlot<V> {
    value: V,
    expires_at: Instant,
    /// Monotonic recency stamp; the minimum stamp is the eviction victim.
    stamp: u64,
}

struct CacheInner<K, V> {
    slots: HashMap<K, CacheSlot<V>>,
    next_stamp: u64,
}

/// Thread-safe key→value store with per-entry TTL and bounded size.
///
/// Values are cloned out on hit, so `V` should be cheap to clone (or wrapped
/// in `Arc`). Missing keys are normal control flow, never an error.
///
/// # Example
///
/// ```rust
/// use query_orchestrator::ExpiringCache;
/// use std::time::Duration;
///
/// let cache: ExpiringCache<String, u32> = ExpiringCache::new(100, Duration::from_secs(600));
/// cache.set("answer".to_string(), 42);
/// assert_eq!(cache.get(&"answer".to_string()), Some(42));
/// ```
pub struct ExpiringCache<K, V> {
    inner: Mutex<CacheInner<K, V>>,
    capacity: usize,
    default_ttl: Duration,
}

impl<K, V> ExpiringCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries, each expiring
    /// `default_ttl` after insertion unless overridden per entry.
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                slots: HashMap::new(),
                next_stamp: 0,
            }),
            capacity,
            default_ttl,
        }
    }

    /// Look up `key`, returning a clone of the stored value.
    ///
    /// Returns `None` for missing keys and for expired entries; an expired
    /// entry is evicted on the spot. A hit promotes the entry to
    /// most-recently-used.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        let expired = match inner.slots.get(key) {
            None => return None,
            Some(slot) => now >= slot.expires_at,
        };

        if expired {
            inner.slots.remove(key);
            debug!("cache entry expired");
            return None;
        }

        let stamp = inner.next_stamp;
        inner.next_stamp += 1;
        let slot = inner.slots.get_mut(key)?;
        slot.stamp = stamp;
        Some(slot.value.clone())
    }

    /// Insert `value` under `key` with the default TTL, overwriting any
    /// existing entry.
    pub fn set(&self, key: K, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Insert `value` under `key` with an explicit TTL.
    ///
    /// The expiry instant is absolute (`now + ttl`). If the insert pushes the
    /// cache past capacity, exactly one least-recently-used entry is evicted.
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let mut inner = self.inner.lock();
        let stamp = inner.next_stamp;
        inner.next_stamp += 1;

        inner.slots.insert(
            key,
            CacheSlot {
                value,
                expires_at: Instant::now() + ttl,
                stamp,
            },
        );

        if inner.slots.len() > self.capacity {
            let victim = inner
                .slots
                .iter()
                .min_by_key(|(_, slot)| slot.stamp)
                .map(|(k, _)| k.clone());
            if let Some(victim) = victim {
                inner.slots.remove(&victim);
                debug!("cache evicted oldest entry at capacity");
            }
        }
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.inner.lock().slots.clear();
    }

    /// Number of entries currently stored, including not-yet-collected
    /// expired entries.
    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize) -> ExpiringCache<String, String> {
        ExpiringCache::new(capacity, Duration::from_secs(600))
    }

    // -- round trip ------------------------------------------------------

    #[test]
    fn test_set_then_get_returns_value() {
        let c = cache(10);
        c.set("k".to_string(), "v".to_string());
        assert_eq!(c.get(&"k".to_string()), Some("v".to_string()));
    }

    #[test]
    fn test_get_missing_key_returns_none() {
        let c = cache(10);
        assert_eq!(c.get(&"missing".to_string()), None);
    }

    #[test]
    fn test_overwrite_existing_key() {
        let c = cache(10);
        c.set("k".to_string(), "old".to_string());
        c.set("k".to_string(), "new".to_string());
        assert_eq!(c.get(&"k".to_string()), Some("new".to_string()));
        assert_eq!(c.len(), 1);
    }

    // -- expiry ----------------------------------------------------------

    #[test]
    fn test_zero_ttl_entry_expires_immediately() {
        let c = cache(10);
        c.set_with_ttl("k".to_string(), "v".to_string(), Duration::ZERO);
        assert_eq!(c.get(&"k".to_string()), None);
    }

    #[test]
    fn test_expired_entry_is_evicted_on_read() {
        let c = cache(10);
        c.set_with_ttl("k".to_string(), "v".to_string(), Duration::ZERO);
        assert_eq!(c.len(), 1, "entry present until read");
        let _ = c.get(&"k".to_string());
        assert_eq!(c.len(), 0, "expired entry removed by the failed read");
    }

    #[test]
    fn test_entry_survives_within_ttl() {
        let c = cache(10);
        c.set_with_ttl("k".to_string(), "v".to_string(), Duration::from_secs(3600));
        assert_eq!(c.get(&"k".to_string()), Some("v".to_string()));
    }

    // -- capacity --------------------------------------------------------

    #[test]
    fn test_capacity_one_evicts_oldest() {
        let c = cache(1);
        c.set("a".to_string(), "1".to_string());
        c.set("b".to_string(), "2".to_string());
        assert_eq!(c.get(&"a".to_string()), None, "a evicted by b");
        assert_eq!(c.get(&"b".to_string()), Some("2".to_string()));
    }

    #[test]
    fn test_overflow_evicts_exactly_one_entry() {
        let c = cache(3);
        for k in ["a", "b", "c", "d"] {
            c.set(k.to_string(), k.to_string());
        }
        assert_eq!(c.len(), 3);
        assert_eq!(c.get(&"a".to_string()), None, "only the oldest is gone");
        assert_eq!(c.get(&"b".to_string()), Some("b".to_string()));
    }

    #[test]
    fn test_get_promotes_entry_over_eviction() {
        let c = cache(2);
        c.set("a".to_string(), "1".to_string());
        c.set("b".to_string(), "2".to_string());
        // Touch "a" so "b" becomes the eviction victim.
        let _ = c.get(&"a".to_string());
        c.set("c".to_string(), "3".to_string());
        assert_eq!(c.get(&"a".to_string()), Some("1".to_string()));
        assert_eq!(c.get(&"b".to_string()), None);
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let c = cache(0);
        c.set("k".to_string(), "v".to_string());
        assert_eq!(c.get(&"k".to_string()), None);
        assert_eq!(c.len(), 0);
    }

    // -- clear -----------------------------------------------------------

    #[test]
    fn test_clear_removes_all_entries() {
        let c = cache(10);
        for i in 0..5 {
            c.set(format!("k{i}"), format!("v{i}"));
        }
        assert_eq!(c.len(), 5);
        c.clear();
        assert!(c.is_empty());
    }

    // -- concurrency -----------------------------------------------------

    #[test]
    fn test_concurrent_access_no_corruption() {
        use std::sync::Arc;

        let c = Arc::new(ExpiringCache::<String, u64>::new(
            1000,
            Duration::from_secs(600),
        ));
        let mut handles = Vec::new();

        for t in 0..8u64 {
            let c = Arc::clone(&c);
            handles.push(std::thread::spawn(move || {
                for i in 0..100u64 {
                    c.set(format!("t{t}-k{i}"), i);
                    let _ = c.get(&format!("t{t}-k{i}"));
                }
            }));
        }

        for h in handles {
            let _ = h.join();
        }

        assert!(c.len() <= 1000, "entries must not exceed capacity");
    }
}
