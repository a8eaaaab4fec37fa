//! Lazy Cache Module
//!
//! A simpler cache used as a memoization fallback: no recency order, no
//! background worker. Staleness is only checked when an entry is looked up,
//! and the whole map is dropped once it grows past `maxsize`.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug)]
struct LazyEntry<V> {
    value: V,
    stored_at: Instant,
}

// == Lazy Cache ==
/// Mutex-guarded map with lookup-time expiration.
#[derive(Debug)]
pub struct LazyCache<K, V> {
    entries: Mutex<HashMap<K, LazyEntry<V>>>,
    maxsize: usize,
    ttl: Duration,
}

impl<K, V> LazyCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    pub fn new(maxsize: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            maxsize,
            ttl,
        }
    }

    /// Returns the value if present and not stale. A stale entry is removed.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut entries = self.entries.lock();
        let stale = entries.get(key)?.stored_at.elapsed() > self.ttl;
        if stale {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Stores a value, first dropping everything if the map is over `maxsize`.
    pub fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.lock();
        if entries.len() > self.maxsize {
            debug!("Lazy cache over {} entries, clearing", self.maxsize);
            entries.clear();
        }
        entries.insert(
            key,
            LazyEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
