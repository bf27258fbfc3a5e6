//! Input-keyed memoisation for the forecast stages.
//!
//! Each entry is stored under an owned copy of the stage's declared inputs, so
//! a lookup only hits when the inputs compare equal. Entries live for the
//! lifetime of the cache (in practice, the process). There is no eviction and
//! no invalidation.

use log::debug;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub struct MemoCache<K, V> {
    label: &'static str,
    entries: Mutex<HashMap<K, Arc<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> MemoCache<K, V>
where
    K: Hash + Eq + Clone + Debug,
{
    pub fn new(label: &'static str) -> Self {
        MemoCache {
            label,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the cached value for `inputs`, computing it with `compute` on a miss.
    ///
    /// Failed computations are not cached.
    pub fn get_or_try_insert_with<E, F>(&self, inputs: &K, compute: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.lookup(inputs) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("{} cache hit", self.label);
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("{} cache miss for {:?}", self.label, inputs);
        let value = Arc::new(compute()?);
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(entries.entry(inputs.clone()).or_insert(value).clone())
    }

    fn lookup(&self, inputs: &K) -> Option<Arc<V>> {
        let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.get(inputs).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::hash::Hasher;

    #[test]
    fn test_identical_inputs_compute_once() {
        let cache: MemoCache<(String, usize), String> = MemoCache::new("test");
        let key = ("static.nc".to_string(), 2usize);
        let mut calls = 0;

        for _ in 0..3 {
            let value = cache
                .get_or_try_insert_with(&key, || {
                    calls += 1;
                    Ok::<_, ()>("loaded".to_string())
                })
                .unwrap();
            assert_eq!(value.as_str(), "loaded");
        }

        assert_eq!(calls, 1);
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_distinct_inputs_get_distinct_entries() {
        let cache: MemoCache<&str, usize> = MemoCache::new("test");
        let a = cache.get_or_try_insert_with(&"a", || Ok::<_, ()>(1)).unwrap();
        let b = cache.get_or_try_insert_with(&"b", || Ok::<_, ()>(2)).unwrap();
        assert_eq!((*a, *b), (1, 2));
        assert_eq!(cache.len(), 2);
    }

    /// Every value hashes the same, so only equality tells keys apart.
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct SameHash(&'static str);

    impl Hash for SameHash {
        fn hash<H: Hasher>(&self, state: &mut H) {
            state.write_u64(42);
        }
    }

    #[test]
    fn test_colliding_hashes_keep_separate_values() {
        let cache: MemoCache<SameHash, usize> = MemoCache::new("test");
        let first = cache.get_or_try_insert_with(&SameHash("first"), || Ok::<_, ()>(1)).unwrap();
        let second = cache.get_or_try_insert_with(&SameHash("second"), || Ok::<_, ()>(2)).unwrap();
        let again = cache.get_or_try_insert_with(&SameHash("first"), || Ok::<_, ()>(3)).unwrap();

        assert_eq!((*first, *second, *again), (1, 2, 1));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.misses(), 2);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache: MemoCache<&str, usize> = MemoCache::new("test");
        let err = cache.get_or_try_insert_with(&"k", || Err::<usize, _>("boom"));
        assert_eq!(err.unwrap_err(), "boom");
        assert!(cache.is_empty());

        let ok = cache.get_or_try_insert_with(&"k", || Ok::<_, &str>(7)).unwrap();
        assert_eq!(*ok, 7);
        assert_eq!(cache.misses(), 2);
    }
}
