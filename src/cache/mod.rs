//! Bounded LRU cache whose whole content expires after a fixed lifetime.
//!
//! Entries are evicted least-recently-used first once `max_size` is reached.
//! When the lifetime elapses, the next access clears the cache and starts a new one.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

#[derive(Debug)]
struct Slot<V> {
    value: V,
    last_used: AtomicU64,
}

/// Cache hit/miss counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Thread-safe expiring LRU cache.
#[derive(Debug)]
pub struct ExpiringLruCache<K, V>
where
    K: Eq + Hash,
{
    store: DashMap<K, Slot<V>>,
    max_size: usize,
    lifetime: Duration,
    expiration: Mutex<Instant>,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> ExpiringLruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(max_size: usize, lifetime: Duration) -> Self {
        Self {
            store: DashMap::with_capacity(max_size),
            max_size,
            lifetime,
            expiration: Mutex::new(Instant::now() + lifetime),
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get a value, refreshing its recency.
    pub fn get(&self, key: &K) -> Option<V> {
        self.expire_if_due();

        match self.store.get(key) {
            Some(slot) => {
                slot.last_used.store(self.tick(), Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(slot.value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert a value, evicting least recently used entries beyond `max_size`.
    pub fn insert(&self, key: K, value: V) {
        if self.max_size == 0 {
            return;
        }
        self.expire_if_due();

        self.store.insert(
            key,
            Slot {
                value,
                last_used: AtomicU64::new(self.tick()),
            },
        );

        // Length is re-checked after the insert
        while self.store.len() > self.max_size {
            if !self.evict_lru() {
                break;
            }
        }
    }

    /// Return the cached value or compute, store and return it.
    ///
    /// Errors from `compute` are returned and never cached.
    pub fn get_or_try_insert_with<E, F>(&self, key: &K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = compute()?;
        self.insert(key.clone(), value.clone());
        Ok(value)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.store.len(),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn expire_if_due(&self) {
        let now = Instant::now();
        let mut expiration = self
            .expiration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if now >= *expiration {
            debug!(entries = self.store.len(), "Cache lifetime elapsed, clearing");
            self.store.clear();
            *expiration = now + self.lifetime;
        }
    }

    fn evict_lru(&self) -> bool {
        let oldest = self
            .store
            .iter()
            .min_by_key(|entry| entry.value().last_used.load(Ordering::Relaxed))
            .map(|entry| entry.key().clone());

        // A lost `remove` race still returns true; the caller re-checks the length
        match oldest {
            Some(key) => {
                self.store.remove(&key);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_get_and_insert() {
        let cache = ExpiringLruCache::new(4, Duration::from_secs(60));
        assert_eq!(cache.get(&"a"), None);
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = ExpiringLruCache::new(2, Duration::from_secs(60));
        cache.insert("a", 1);
        cache.insert("b", 2);
        // touch "a" so "b" becomes the oldest
        assert_eq!(cache.get(&"a"), Some(1));
        cache.insert("c", 3);

        assert_eq!(cache.stats().entries, 2);
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn test_replacing_existing_key_does_not_evict() {
        let cache = ExpiringLruCache::new(2, Duration::from_secs(60));
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 10);

        assert_eq!(cache.stats().entries, 2);
        assert_eq!(cache.get(&"a"), Some(10));
        assert_eq!(cache.get(&"b"), Some(2));
    }

    #[test]
    fn test_whole_cache_expires() {
        let cache = ExpiringLruCache::new(8, Duration::from_millis(20));
        cache.insert("a", 1);
        cache.insert("b", 2);
        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.stats().entries, 0);

        cache.insert("c", 3);
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache: ExpiringLruCache<String, u32> = ExpiringLruCache::new(8, Duration::from_secs(60));
        let key = "k".to_string();

        let first: Result<u32, &str> = cache.get_or_try_insert_with(&key, || Err("boom"));
        assert!(first.is_err());
        assert_eq!(cache.stats().entries, 0);

        let second: Result<u32, &str> = cache.get_or_try_insert_with(&key, || Ok(7));
        assert_eq!(second, Ok(7));
        let third: Result<u32, &str> = cache.get_or_try_insert_with(&key, || Ok(99));
        assert_eq!(third, Ok(7));
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let cache = ExpiringLruCache::new(0, Duration::from_secs(60));
        cache.insert("a", 1);
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_concurrent_inserts_respect_capacity() {
        let cache = Arc::new(ExpiringLruCache::new(16, Duration::from_secs(60)));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let key = format!("{}-{}", t, i % 64);
                        cache.insert(key.clone(), i);
                        cache.get(&key);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = cache.stats();
        assert!(stats.entries <= 16, "entries = {}", stats.entries);
        assert!(stats.entries > 0);
        assert_eq!(stats.hits + stats.misses, 8 * 500);
    }

    #[test]
    fn test_expiry_survives_poisoned_lock() {
        let cache = Arc::new(ExpiringLruCache::new(4, Duration::from_millis(20)));
        cache.insert("a", 1);

        let poisoner = Arc::clone(&cache);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.expiration.lock().unwrap();
            panic!("poison the expiration lock");
        })
        .join();

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.stats().entries, 0);
    }
}
