//! In-process cache of decoded objects
//!
//! A best-effort accelerator in front of the disk cache: entries expire after a
//! TTL and, once the entry bound is exceeded, a fixed batch of least recently
//! used entries is pruned. Never a source of truth.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Default lifetime of an in-memory entry
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Default entry bound
pub const DEFAULT_MAX_ENTRIES: usize = 4096;

type Value = Arc<dyn Any + Send + Sync>;

struct MemoryEntry {
    value: Value,
    expires_at: Instant,
    last_access: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, MemoryEntry>,
    access_counter: u64,
}

/// Bounded TTL cache of type-erased values, safe to share between workers.
pub struct MemoryCache {
    inner: Mutex<Inner>,
    max_entries: usize,
    prune_batch: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            inner: Mutex::new(Inner::default()),
            max_entries,
            // An eighth of the bound, at least one entry
            prune_batch: (max_entries / 8).max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a live entry of type `T`.
    ///
    /// Expired entries and entries stored under a different type are misses.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &str) -> Option<T> {
        let Ok(mut guard) = self.inner.lock() else {
            return None;
        };
        let inner = &mut *guard;
        inner.access_counter += 1;
        let tick = inner.access_counter;
        let now = Instant::now();

        let mut found = None;
        let mut expired = false;
        if let Some(entry) = inner.entries.get_mut(key) {
            if entry.expires_at > now {
                entry.last_access = tick;
                found = entry.value.downcast_ref::<T>().cloned();
            } else {
                expired = true;
            }
        }
        if expired {
            inner.entries.remove(key);
        }

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Insert or replace an entry.
    pub fn set<T: Send + Sync + 'static>(&self, key: &str, value: T, ttl: Duration) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        inner.access_counter += 1;
        let tick = inner.access_counter;

        inner.entries.insert(
            key.to_string(),
            MemoryEntry {
                value: Arc::new(value),
                expires_at: Instant::now() + ttl,
                last_access: tick,
            },
        );

        if inner.entries.len() > self.max_entries {
            self.prune(&mut inner);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (hits, misses) since creation
    pub fn hit_stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    /// Drop expired entries, then the `prune_batch` least recently used.
    fn prune(&self, inner: &mut Inner) {
        let now = Instant::now();
        inner.entries.retain(|_, e| e.expires_at > now);
        if inner.entries.len() <= self.max_entries {
            return;
        }

        let mut by_age: Vec<(u64, String)> = inner
            .entries
            .iter()
            .map(|(k, e)| (e.last_access, k.clone()))
            .collect();
        by_age.sort_unstable_by_key(|(access, _)| *access);

        for (_, key) in by_age.into_iter().take(self.prune_batch) {
            inner.entries.remove(&key);
        }
        log::debug!(
            "Memory cache pruned to {} entries (bound {})",
            inner.entries.len(),
            self.max_entries
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get() {
        let cache = MemoryCache::new(10);
        cache.set("k", vec![1u32, 2, 3], DEFAULT_TTL);
        assert_eq!(cache.get::<Vec<u32>>("k"), Some(vec![1, 2, 3]));
        assert_eq!(cache.hit_stats(), (1, 0));
    }

    #[test]
    fn test_miss_and_type_mismatch() {
        let cache = MemoryCache::new(10);
        assert!(cache.get::<String>("absent").is_none());

        cache.set("k", 42u64, DEFAULT_TTL);
        assert!(cache.get::<String>("k").is_none());
        assert_eq!(cache.get::<u64>("k"), Some(42));
        assert_eq!(cache.hit_stats(), (1, 2));
    }

    #[test]
    fn test_expiry() {
        let cache = MemoryCache::new(10);
        cache.set("k", "v".to_string(), Duration::from_secs(0));
        assert!(cache.get::<String>("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_prunes_least_recently_used_batch() {
        let cache = MemoryCache::new(8);
        for i in 0..8 {
            cache.set(&format!("k{}", i), i, DEFAULT_TTL);
        }
        // Touch k0 so it is the most recently used
        assert_eq!(cache.get::<i32>("k0"), Some(0));

        cache.set("k8", 8, DEFAULT_TTL);

        // Bound 8, batch 1: the oldest untouched entry (k1) goes
        assert_eq!(cache.len(), 8);
        assert!(cache.get::<i32>("k1").is_none());
        assert_eq!(cache.get::<i32>("k0"), Some(0));
        assert_eq!(cache.get::<i32>("k8"), Some(8));
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(MemoryCache::new(64));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let key = format!("{}-{}", t, i % 16);
                        cache.set(&key, i, DEFAULT_TTL);
                        let _ = cache.get::<i32>(&key);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(cache.len() <= 64);
    }
}
