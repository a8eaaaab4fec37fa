//! Ordered Cache Core
//!
//! HashMap from key to ring slot plus the recency ring. All methods take
//! `&mut self`; locking is the facade's job.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::cache::{CacheEntry, CacheStats, RecencyRing};

/// Outcome of an insert: the new entry's stamp and every entry it displaced.
#[derive(Debug)]
pub struct Insertion<K, V> {
    pub stamp: u64,
    /// Previous entry under the same key, if any
    pub replaced: Option<CacheEntry<K, V>>,
    /// Entries evicted from the tail, least recently used first
    pub evicted: Vec<CacheEntry<K, V>>,
}

// == Ordered Core ==
/// Capacity-bounded map with O(1) recency tracking and LRU eviction.
#[derive(Debug)]
pub struct OrderedCore<K, V> {
    /// Key to ring slot
    map: HashMap<K, usize>,
    /// Entries in recency order
    ring: RecencyRing<K, V>,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries kept once an insert completes
    capacity: usize,
    next_stamp: u64,
}

impl<K, V> OrderedCore<K, V>
where
    K: Hash + Eq + Clone,
{
    // == Constructor ==
    /// Creates an empty core. `capacity` is validated by the facade.
    pub fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity.saturating_add(1).min(4096)),
            ring: RecencyRing::with_capacity(capacity.min(4096)),
            stats: CacheStats::new(),
            capacity,
            next_stamp: 1,
        }
    }

    // == Get ==
    /// Returns the value and marks the entry most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.map.get(key) {
            Some(&slot) => {
                self.stats.record_hit();
                self.ring.move_to_front(slot);
                self.ring.get(slot).map(|entry| &entry.value)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Returns the value without touching recency or stats.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entry(key).map(|entry| &entry.value)
    }

    pub fn entry<Q>(&self, key: &Q) -> Option<&CacheEntry<K, V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get(key).and_then(|&slot| self.ring.get(slot))
    }

    // == Insert ==
    /// Inserts a fresh entry at the ring head.
    ///
    /// An existing entry under the same key is removed first, never updated
    /// in place, so the new entry gets a new stamp and deadline. Afterwards
    /// the tail is evicted while the core holds more than `capacity` entries.
    pub fn insert(&mut self, key: K, value: V, expires_at: Option<Instant>) -> Insertion<K, V> {
        let replaced = self.remove(&key);

        let stamp = self.next_stamp;
        self.next_stamp += 1;

        let slot = self
            .ring
            .push_front(CacheEntry::new(key.clone(), value, expires_at, stamp));
        self.map.insert(key, slot);

        let mut evicted = Vec::new();
        while self.map.len() > self.capacity {
            match self.pop_lru() {
                Some(entry) => {
                    self.stats.record_eviction();
                    evicted.push(entry);
                }
                None => break,
            }
        }

        self.stats.set_total_entries(self.map.len());
        Insertion {
            stamp,
            replaced,
            evicted,
        }
    }

    // == Remove ==
    /// Unlinks the entry under `key`.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<CacheEntry<K, V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.map.remove(key)?;
        let entry = self.ring.remove(slot);
        self.stats.set_total_entries(self.map.len());
        entry
    }

    /// Removes the entry only if it is still the insert identified by `stamp`
    /// and its deadline has passed.
    ///
    /// A key that was deleted, or deleted and reinserted, does not match and
    /// is left untouched.
    pub fn remove_expired(&mut self, key: &K, stamp: u64) -> Option<CacheEntry<K, V>> {
        let entry = self.entry(key)?;
        if entry.stamp != stamp || !entry.is_expired() {
            return None;
        }
        let entry = self.remove(key)?;
        self.stats.record_expiration();
        Some(entry)
    }

    fn pop_lru(&mut self) -> Option<CacheEntry<K, V>> {
        let slot = self.ring.back()?;
        let entry = self.ring.remove(slot)?;
        self.map.remove(&entry.key);
        Some(entry)
    }

    // == Clear ==
    /// Removes every entry, least recently used first.
    pub fn drain(&mut self) -> Vec<CacheEntry<K, V>> {
        let mut drained = Vec::with_capacity(self.map.len());
        while let Some(entry) = self.pop_lru() {
            drained.push(entry);
        }
        self.ring.clear();
        self.stats.set_total_entries(0);
        drained
    }

    // == Contains ==
    /// Checks for a key without touching recency or stats.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    pub fn ttl_remaining<Q>(&self, key: &Q) -> Option<Duration>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entry(key).and_then(|entry| entry.ttl_remaining())
    }

    /// Entries from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry<K, V>> {
        self.ring.iter()
    }

    // == Length ==
    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns the configured maximum entry count.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // == Stats ==
    /// Returns a snapshot of the counters with the current entry count.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.map.len());
        stats
    }

    /// Forward ring traversal length, None if links are inconsistent with the map.
    pub fn traverse_len(&self) -> Option<usize> {
        self.ring
            .traverse_len()
            .filter(|&count| count == self.map.len())
    }
}
