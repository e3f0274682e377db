//! Bounded FIFO caches.
//!
//! Every cache evicts the oldest *inserted* key when full. Reading an entry
//! does not refresh it, so this is not an LRU; wrap the cache if recency
//! matters.

use crate::config::CacheConfig;
use crate::parser::ParseOutcome;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    inserted: Instant,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    order: VecDeque<K>,
}

/// A capacity-bounded map with first-in-first-out eviction and an optional
/// time-to-live.
///
/// All operations take `&self`; the size check, eviction and insertion of
/// one call happen under a single lock.
pub struct BoundedCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    capacity: usize,
    ttl: Option<Duration>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize) -> Self {
        BoundedCache {
            inner: Mutex::new(Inner {
                entries: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
            }),
            capacity,
            ttl: None,
        }
    }

    pub fn with_ttl(capacity: usize, ttl: Duration) -> Self {
        BoundedCache {
            ttl: Some(ttl),
            ..Self::new(capacity)
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        let mut inner = self.inner.lock();
        let entry = inner.entries.get(key)?;

        if let Some(ttl) = self.ttl
            && now.saturating_duration_since(entry.inserted) >= ttl
        {
            inner.entries.remove(key);
            inner.order.retain(|k| k != key);
            return None;
        }

        Some(entry.value.clone())
    }

    /// Inserts `value`, evicting the oldest entry if the cache is full.
    /// Replacing an existing key keeps its place in the eviction order.
    pub fn insert(&self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }

        let mut inner = self.inner.lock();
        let entry = Entry {
            value,
            inserted: Instant::now(),
        };

        if let Some(existing) = inner.entries.get_mut(&key) {
            *existing = entry;
            return;
        }

        while inner.entries.len() >= self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
            tracing::trace!(capacity = self.capacity, "cache full, evicted oldest entry");
        }

        inner.order.push_back(key.clone());
        inner.entries.insert(key, entry);
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let entry = inner.entries.remove(key)?;
        inner.order.retain(|k| k != key);
        Some(entry.value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }
}

/// Parse results keyed by exact formula text.
pub type ParseCache = BoundedCache<String, ParseOutcome>;

impl ParseCache {
    pub fn from_config(config: &CacheConfig) -> Self {
        BoundedCache::new(config.parse_capacity)
    }
}

/// Identifies one execution of a compiled query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ExecutionCacheKey {
    pub query_id: String,
    /// The serialized query body
    pub body: String,
}

impl ExecutionCacheKey {
    pub fn new(query_id: impl Into<String>, body: &Value) -> Self {
        ExecutionCacheKey {
            query_id: query_id.into(),
            body: body.to_string(),
        }
    }
}

/// Raw search responses and their transformed results, cached separately.
pub struct ExecutionCache<R = Value, T = Value> {
    pub responses: BoundedCache<ExecutionCacheKey, R>,
    pub transformed: BoundedCache<ExecutionCacheKey, T>,
}

impl<R: Clone, T: Clone> ExecutionCache<R, T> {
    pub fn new(config: &CacheConfig) -> Self {
        let ttl = Duration::from_secs(config.ttl_secs);
        ExecutionCache {
            responses: BoundedCache::with_ttl(config.response_capacity, ttl),
            transformed: BoundedCache::with_ttl(config.transformed_capacity, ttl),
        }
    }

    pub fn clear(&self) {
        self.responses.clear();
        self.transformed.clear();
    }
}
