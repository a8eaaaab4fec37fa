//! Cache Store Module
//!
//! Public cache facade combining the ordered core, the lock mode and the
//! expiration worker.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::cache::entry::deadline_after;
use crate::cache::{CacheEntry, CacheStats, Concurrent, Local, LockMode, OrderedCore};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::tasks::{ExpiryScheduler, ExpiryTarget};

struct Shared<K, V, L: LockMode> {
    core: L::Cell<OrderedCore<K, V>>,
    config: CacheConfig,
    /// Present only in `Concurrent` mode
    scheduler: Option<ExpiryScheduler<K>>,
}

impl<K, V, L> Shared<K, V, L>
where
    K: Hash + Eq + Clone,
    L: LockMode,
{
    fn with_core<R>(&self, f: impl FnOnce(&mut OrderedCore<K, V>) -> R) -> R {
        L::with(&self.core, |cell| f(&mut cell.borrow_mut()))
    }

    /// Withdraws a removed entry from the expiration queue.
    fn forget(&self, entry: &CacheEntry<K, V>) {
        if entry.expires_at.is_none() {
            return;
        }
        if let Some(scheduler) = &self.scheduler {
            scheduler.on_delete(entry.stamp);
        }
    }
}

impl<K, V> ExpiryTarget<K> for Shared<K, V, Concurrent>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Send + 'static,
{
    fn expire(&self, key: &K, stamp: u64) {
        if self.with_core(|core| core.remove_expired(key, stamp)).is_none() {
            debug!("Expiration of entry {} skipped, key was removed or replaced", stamp);
        }
    }
}

// == LRU Cache ==
/// Bounded key-value cache with LRU eviction and optional TTL expiration.
///
/// Entries are kept in recency order. Inserting past `capacity` evicts the
/// least recently used entry. Entries inserted with a TTL are deleted by a
/// background worker once their deadline passes.
///
/// The lock mode `L` is [`Concurrent`] by default. [`LocalLruCache`] skips
/// locking but cannot be shared across threads and has no TTL support.
///
/// ```
/// use std::time::Duration;
/// use ttl_lru::LruCache;
///
/// let cache = LruCache::with_ttl(128, Duration::from_secs(60)).unwrap();
/// cache.set("foo", "bar").unwrap();
/// assert_eq!(cache.get("foo").unwrap(), "bar");
/// ```
pub struct LruCache<K, V, L: LockMode = Concurrent> {
    shared: Arc<Shared<K, V, L>>,
}

/// Single-threaded cache without locking.
pub type LocalLruCache<K, V> = LruCache<K, V, Local>;

fn validate_capacity(capacity: usize) -> Result<()> {
    if capacity == 0 {
        return Err(CacheError::InvalidArgument(
            "capacity must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

fn validate_ttl(ttl: Duration) -> Result<()> {
    if ttl.is_zero() {
        return Err(CacheError::InvalidArgument(
            "ttl must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

impl<K, V> LruCache<K, V, Concurrent>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    // == Constructors ==
    /// Creates a thread-safe cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::from_config(&CacheConfig::new(capacity))
    }

    /// Creates a thread-safe cache whose entries expire `ttl` after insertion
    /// unless inserted with their own TTL.
    pub fn with_ttl(capacity: usize, ttl: Duration) -> Result<Self> {
        Self::from_config(&CacheConfig::new(capacity).with_default_ttl(ttl))
    }

    /// Creates a thread-safe cache from configuration.
    ///
    /// The expiration worker is not started until the first TTL-bearing insert.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        validate_capacity(config.capacity)?;
        if let Some(ttl) = config.default_ttl {
            validate_ttl(ttl)?;
        }

        let shared = Arc::new_cyclic(|weak: &Weak<Shared<K, V, Concurrent>>| {
            let target: Weak<dyn ExpiryTarget<K>> = weak.clone();
            Shared {
                core: Concurrent::new_cell(OrderedCore::new(config.capacity)),
                config: config.clone(),
                scheduler: Some(ExpiryScheduler::new(target, config.worker_name.clone())),
            }
        });
        Ok(Self { shared })
    }

    // == Set With TTL ==
    /// Stores a key-value pair that expires `ttl` from now.
    ///
    /// Fails with `InvalidArgument` for a zero TTL. A TTL too large to
    /// express as a deadline stores the entry without expiration.
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) -> Result<()> {
        validate_ttl(ttl)?;
        self.insert(key, value, deadline_after(ttl))
    }

    /// Stops the expiration worker and waits for it to exit.
    ///
    /// Entries already in the cache, and TTL-bearing entries inserted
    /// afterwards, are no longer expired. Dropping the cache does the same.
    pub fn stop_expiration(&self) {
        if let Some(scheduler) = &self.shared.scheduler {
            scheduler.shutdown();
        }
    }

    /// Returns true while the expiration worker thread is alive.
    pub fn is_expiring(&self) -> bool {
        self.shared
            .scheduler
            .as_ref()
            .map(|scheduler| scheduler.is_running())
            .unwrap_or(false)
    }

    // == Copy ==
    /// Returns an independent cache with the same configuration, entries,
    /// recency order and deadlines.
    pub fn copy(&self) -> Result<Self> {
        let copy = Self::from_config(&self.shared.config)?;
        self.copy_into(&copy)?;
        Ok(copy)
    }
}

impl<K, V> LruCache<K, V, Local>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Creates a single-threaded cache holding at most `capacity` entries.
    pub fn new_local(capacity: usize) -> Result<Self> {
        validate_capacity(capacity)?;
        Ok(Self {
            shared: Arc::new(Shared {
                core: Local::new_cell(OrderedCore::new(capacity)),
                config: CacheConfig::new(capacity),
                scheduler: None,
            }),
        })
    }

    /// Returns an independent cache with the same capacity, entries and
    /// recency order.
    pub fn copy(&self) -> Result<Self> {
        let copy = Self::new_local(self.capacity())?;
        self.copy_into(&copy)?;
        Ok(copy)
    }
}

impl<K, V, L> LruCache<K, V, L>
where
    K: Hash + Eq + Clone,
    V: Clone,
    L: LockMode,
{
    // == Get ==
    /// Returns a clone of the value and marks the entry most recently used.
    pub fn get<Q>(&self, key: &Q) -> Result<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared
            .with_core(|core| core.get(key).cloned())
            .ok_or(CacheError::NotFound)
    }

    /// Returns a clone of the value without changing recency or stats.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared.with_core(|core| core.peek(key).cloned())
    }

    // == Set ==
    /// Stores a key-value pair, applying the default TTL if one is configured.
    ///
    /// An existing entry under `key` is replaced by a new one: its TTL
    /// restarts and it moves to the most recently used position.
    pub fn set(&self, key: K, value: V) -> Result<()> {
        let expires_at = self.shared.config.default_ttl.and_then(deadline_after);
        self.insert(key, value, expires_at)
    }

    fn insert(&self, key: K, value: V, expires_at: Option<Instant>) -> Result<()> {
        let scheduler = expires_at.and(self.shared.scheduler.as_ref());
        if let Some(scheduler) = scheduler {
            scheduler.ensure_worker()?;
        }

        self.shared.with_core(|core| {
            let watched_key = scheduler.map(|_| key.clone());
            let insertion = core.insert(key, value, expires_at);

            if let Some(replaced) = &insertion.replaced {
                self.shared.forget(replaced);
            }
            for evicted in &insertion.evicted {
                self.shared.forget(evicted);
            }
            if !insertion.evicted.is_empty() {
                debug!("Evicted {} least recently used entries", insertion.evicted.len());
            }

            match (scheduler, watched_key, expires_at) {
                (Some(scheduler), Some(key), Some(deadline)) => {
                    scheduler.notify_inserted(key, insertion.stamp, deadline)
                }
                _ => Ok(()),
            }
        })
    }

    // == Delete ==
    /// Removes an entry by key.
    pub fn delete<Q>(&self, key: &Q) -> Result<()>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared.with_core(|core| match core.remove(key) {
            Some(entry) => {
                self.shared.forget(&entry);
                Ok(())
            }
            None => Err(CacheError::NotFound),
        })
    }

    // == Contains ==
    /// Checks for a key without changing recency or stats.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared.with_core(|core| core.contains(key))
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.shared.with_core(|core| core.len())
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the maximum number of entries kept after an insert.
    pub fn capacity(&self) -> usize {
        self.shared.config.capacity
    }

    /// Returns the remaining TTL of an entry, None if absent or not expiring.
    pub fn ttl_remaining<Q>(&self, key: &Q) -> Option<Duration>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared.with_core(|core| core.ttl_remaining(key))
    }

    // == Snapshots ==
    /// Keys, most recently used first.
    pub fn keys(&self) -> Vec<K> {
        self.shared
            .with_core(|core| core.iter().map(|entry| entry.key.clone()).collect())
    }

    /// Values, most recently used first.
    pub fn values(&self) -> Vec<V> {
        self.shared
            .with_core(|core| core.iter().map(|entry| entry.value.clone()).collect())
    }

    /// Key-value pairs, most recently used first.
    pub fn items(&self) -> Vec<(K, V)> {
        self.shared.with_core(|core| {
            core.iter()
                .map(|entry| (entry.key.clone(), entry.value.clone()))
                .collect()
        })
    }

    // == Clear ==
    /// Removes every entry. A no-op on an empty cache.
    pub fn clear(&self) {
        self.shared.with_core(|core| {
            for entry in core.drain() {
                self.shared.forget(&entry);
            }
        })
    }

    // == Update ==
    /// Inserts every pair in order, as `set` would, under one lock hold.
    pub fn update<I>(&self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        L::with(&self.shared.core, |_| {
            pairs.into_iter().try_for_each(|(key, value)| self.set(key, value))
        })
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.shared.with_core(|core| core.stats())
    }

    /// Walks the recency ring and returns its length, or None if the ring
    /// and the key map disagree.
    pub fn traverse_len(&self) -> Option<usize> {
        self.shared.with_core(|core| core.traverse_len())
    }

    /// Replays this cache's entries into `target`, least recently used first.
    fn copy_into(&self, target: &Self) -> Result<()> {
        let entries: Vec<(K, V, Option<Instant>)> = self.shared.with_core(|core| {
            core.iter()
                .map(|entry| (entry.key.clone(), entry.value.clone(), entry.expires_at))
                .collect()
        });
        entries
            .into_iter()
            .rev()
            .try_for_each(|(key, value, expires_at)| target.insert(key, value, expires_at))
    }
}

impl<K, V, L> PartialEq for LruCache<K, V, L>
where
    K: Hash + Eq + Clone,
    V: Clone + PartialEq,
    L: LockMode,
{
    /// Equal when both hold the same pairs in the same recency order.
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.shared, &other.shared) {
            return true;
        }
        self.len() == other.len() && self.items() == other.items()
    }
}

impl<K, V, L> fmt::Debug for LruCache<K, V, L>
where
    K: Hash + Eq + Clone + fmt::Debug,
    V: Clone + fmt::Debug,
    L: LockMode,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.items()).finish()
    }
}
