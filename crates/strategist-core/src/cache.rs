//! Bounded LRU cache shared by the span extractor and the salience provider.
//!
//! Each component owns its own instance. Reads and writes go through one
//! mutex so that the size bound and the eviction order hold under concurrent
//! use. A hit refreshes recency but never changes the size.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

struct Entry<V> {
    value: V,
    tick: u64,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    /// Recency order: smallest tick is least recently used
    order: BTreeMap<u64, K>,
    tick: u64,
}

impl<K: Clone + Eq + Hash, V> Inner<K, V> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn touch(&mut self, key: &K) {
        let tick = self.next_tick();
        if let Some(entry) = self.entries.get_mut(key) {
            self.order.remove(&entry.tick);
            entry.tick = tick;
            self.order.insert(tick, key.clone());
        }
    }
}

/// A mutex-guarded map with least-recently-used eviction.
pub struct BoundedCache<K, V> {
    capacity: usize,
    inner: Mutex<Inner<K, V>>,
}

impl<K: Clone + Eq + Hash, V: Clone> BoundedCache<K, V> {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: BTreeMap::new(),
                tick: 0,
            }),
        }
    }

    /// Get a cached value and mark it most recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let value = inner.entries.get(key).map(|e| e.value.clone())?;
        inner.touch(key);
        Some(value)
    }

    /// Store a value, evicting the least recently used entry when full.
    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&key) {
            inner.touch(&key);
            if let Some(entry) = inner.entries.get_mut(&key) {
                entry.value = value;
            }
            return;
        }

        while inner.entries.len() >= self.capacity {
            let Some((_, oldest)) = inner.order.pop_first() else {
                break;
            };
            inner.entries.remove(&oldest);
        }

        let tick = inner.next_tick();
        inner.order.insert(tick, key.clone());
        inner.entries.insert(key, Entry { value, tick });
    }

    /// Return the cached value, or compute, store and return it.
    ///
    /// The computation runs outside the lock; a concurrent insert of the same
    /// key is overwritten, which leaves the size unchanged.
    pub fn get_or_insert_with(&self, key: K, compute: impl FnOnce() -> V) -> V {
        if let Some(value) = self.get(&key) {
            return value;
        }
        let value = compute();
        self.insert(key, value.clone());
        value
    }

    /// Check for a key without refreshing its recency.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys from least to most recently used.
    pub fn keys(&self) -> Vec<K> {
        self.inner.lock().order.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_cache_operations() {
        let cache: BoundedCache<String, u32> = BoundedCache::new(2);

        // Cache miss
        assert!(cache.get(&"a".to_string()).is_none());

        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);

        // Cache hit
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache: BoundedCache<&str, u32> = BoundedCache::new(3);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);

        // Refresh "a" so "b" becomes the oldest.
        cache.get(&"a");
        cache.insert("d", 4);

        assert_eq!(cache.keys(), vec!["c", "a", "d"]);
        assert!(!cache.contains(&"b"));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_reinsert_does_not_grow() {
        let cache: BoundedCache<&str, u32> = BoundedCache::new(2);
        cache.insert("a", 1);
        cache.insert("a", 5);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"a"), Some(5));
    }

    #[test]
    fn test_get_or_insert_with_computes_once() {
        let cache: BoundedCache<u32, u32> = BoundedCache::new(4);
        let mut calls = 0;
        let first = cache.get_or_insert_with(7, || {
            calls += 1;
            49
        });
        let second = cache.get_or_insert_with(7, || {
            calls += 1;
            0
        });
        assert_eq!((first, second, calls), (49, 49, 1));
    }

    #[test]
    fn test_concurrent_inserts_respect_capacity() {
        let cache: Arc<BoundedCache<u32, u32>> = Arc::new(BoundedCache::new(16));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        cache.insert(t * 1000 + i, i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 16);
        assert_eq!(cache.keys().len(), 16);
    }

    proptest! {
        #[test]
        fn prop_size_never_exceeds_capacity(
            capacity in 1usize..8,
            keys in proptest::collection::vec(0u8..20, 0..60),
        ) {
            let cache: BoundedCache<u8, u8> = BoundedCache::new(capacity);
            for key in keys {
                if cache.get(&key).is_none() {
                    cache.insert(key, key);
                }
                prop_assert!(cache.len() <= capacity);
                prop_assert_eq!(cache.keys().len(), cache.len());
            }
        }
    }
}
