//! A small, hand-rolled expirable LRU: a `HashMap` for storage plus a
//! `VecDeque` tracking recency, the whole thing behind a single
//! `tokio::sync::RwLock`. Strictly a read-through
//! optimization — every miss falls through to the caller's fetch
//! closure, so correctness never depends on what's cached.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// Default cache capacity.
pub const DEFAULT_CAPACITY: usize = 512;
/// Default time-to-live for a cached entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

struct Inner<K, V> {
    capacity: usize,
    ttl: Duration,
    entries: HashMap<K, Entry<V>>,
    recency: VecDeque<K>,
}

impl<K: Eq + Hash + Clone, V: Clone> Inner<K, V> {
    fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            entries: HashMap::new(),
            recency: VecDeque::new(),
        }
    }

    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            self.recency.remove(pos);
        }
        self.recency.push_back(key.clone());
    }

    fn get_live(&mut self, key: &K) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.inserted_at.elapsed() >= self.ttl,
            None => return None,
        };
        if expired {
            self.entries.remove(key);
            if let Some(pos) = self.recency.iter().position(|k| k == key) {
                self.recency.remove(pos);
            }
            return None;
        }
        self.touch(key);
        self.entries.get(key).map(|e| e.value.clone())
    }

    fn insert(&mut self, key: K, value: V) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            // Boundary behavior: evict least-recently-used
            // before inserting when at capacity.
            if let Some(lru) = self.recency.pop_front() {
                self.entries.remove(&lru);
            }
        }
        self.entries.insert(
            key.clone(),
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
        self.touch(&key);
    }

    fn purge(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }
}

/// An expirable LRU cache keyed by `K`, storing `V`.
pub struct TtlLruCache<K, V> {
    inner: RwLock<Inner<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlLruCache<K, V> {
    /// Creates a cache with the given `capacity` and `ttl`.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(Inner::new(capacity, ttl)),
        }
    }

    /// Returns the cached value for `key` if present and not expired;
    /// otherwise calls `fetch`, stores the result on success, and returns
    /// it. `fetch`'s errors are never cached.
    pub async fn get_or_insert_with<F, Fut, E>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<V, E>>,
    {
        if let Some(hit) = self.inner.write().await.get_live(&key) {
            return Ok(hit);
        }
        let value = fetch().await?;
        self.inner.write().await.insert(key, value.clone());
        Ok(value)
    }

    /// Atomically rebuilds the cache with a new TTL, discarding all
    /// existing entries.
    pub async fn set_ttl(&self, ttl: Duration) {
        let mut inner = self.inner.write().await;
        inner.ttl = ttl;
        inner.purge();
    }

    /// Empties the cache. Test-only; production code relies solely on
    /// TTL expiry and LRU eviction.
    #[cfg(test)]
    pub async fn purge(&self) {
        self.inner.write().await.purge();
    }

    /// Number of live (unexpired) entries currently stored. Test-only.
    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }
}
