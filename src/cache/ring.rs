//! Recency Ring Module
//!
//! Circular doubly linked list of cache entries, stored in an index arena.
//!
//! ```text
//!   slots[0] = root (no entry)
//!
//!   root ─► [MRU] ◄──► [..] ◄──► [LRU] ─┐
//!    ▲                                   │
//!    └───────────────────────────────────┘
//! ```
//!
//! Links are slot indices, so the ring owns every entry and no reference
//! cycles exist. Freed slots go on a free list and are reused by later
//! inserts.

use crate::cache::CacheEntry;

/// Slot index of the sentinel root.
const ROOT: usize = 0;

#[derive(Debug)]
struct Slot<K, V> {
    prev: usize,
    next: usize,
    entry: Option<CacheEntry<K, V>>,
}

impl<K, V> Slot<K, V> {
    fn detached(index: usize) -> Self {
        Self {
            prev: index,
            next: index,
            entry: None,
        }
    }
}

// == Recency Ring ==
/// Tracks access order for LRU eviction.
///
/// - `root.next` = Most recently used
/// - `root.prev` = Least recently used
#[derive(Debug)]
pub struct RecencyRing<K, V> {
    slots: Vec<Slot<K, V>>,
    free: Vec<usize>,
    len: usize,
}

impl<K, V> RecencyRing<K, V> {
    // == Constructor ==
    /// Creates a ring holding only the sentinel root.
    pub fn new() -> Self {
        Self {
            slots: vec![Slot::detached(ROOT)],
            free: Vec::new(),
            len: 0,
        }
    }

    /// Creates a ring with room for `capacity` entries before reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity + 2);
        slots.push(Slot::detached(ROOT));
        Self {
            slots,
            free: Vec::new(),
            len: 0,
        }
    }

    // == Push Front ==
    /// Links a new entry at the head and returns its slot index.
    pub fn push_front(&mut self, entry: CacheEntry<K, V>) -> usize {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::detached(self.slots.len()));
                self.slots.len() - 1
            }
        };
        self.slots[index].entry = Some(entry);
        self.link_front(index);
        self.len += 1;
        index
    }

    // == Move To Front ==
    /// Marks a slot as most recently used.
    pub fn move_to_front(&mut self, index: usize) {
        if index == ROOT || self.slots[ROOT].next == index || !self.is_occupied(index) {
            return;
        }
        self.unlink(index);
        self.link_front(index);
    }

    // == Remove ==
    /// Unlinks a slot, returning its entry. The slot is recycled.
    pub fn remove(&mut self, index: usize) -> Option<CacheEntry<K, V>> {
        if index == ROOT {
            return None;
        }
        let entry = self.slots.get_mut(index)?.entry.take()?;
        self.unlink(index);
        self.free.push(index);
        self.len -= 1;
        Some(entry)
    }

    // == Back ==
    /// Returns the slot of the least recently used entry.
    pub fn back(&self) -> Option<usize> {
        (self.len > 0).then(|| self.slots[ROOT].prev)
    }

    /// Returns the slot of the most recently used entry.
    pub fn front(&self) -> Option<usize> {
        (self.len > 0).then(|| self.slots[ROOT].next)
    }

    pub fn get(&self, index: usize) -> Option<&CacheEntry<K, V>> {
        self.slots.get(index).and_then(|slot| slot.entry.as_ref())
    }

    /// Iterates entries from most to least recently used.
    pub fn iter(&self) -> RingIter<'_, K, V> {
        RingIter {
            ring: self,
            cursor: self.slots[ROOT].next,
        }
    }

    /// Drops every entry and releases the arena.
    pub fn clear(&mut self) {
        self.slots.truncate(1);
        self.slots[ROOT] = Slot::detached(ROOT);
        self.free.clear();
        self.len = 0;
    }

    // == Length ==
    /// Returns the number of linked entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Walks the ring forward from the root and counts the entries,
    /// checking each backward link on the way.
    ///
    /// Returns None if the ring is corrupt.
    pub fn traverse_len(&self) -> Option<usize> {
        let mut count = 0;
        let mut prev = ROOT;
        let mut cursor = self.slots[ROOT].next;
        while cursor != ROOT {
            let slot = self.slots.get(cursor)?;
            if slot.prev != prev || slot.entry.is_none() || count > self.len {
                return None;
            }
            count += 1;
            prev = cursor;
            cursor = slot.next;
        }
        (self.slots[ROOT].prev == prev).then_some(count)
    }

    fn is_occupied(&self, index: usize) -> bool {
        self.slots
            .get(index)
            .map(|slot| slot.entry.is_some())
            .unwrap_or(false)
    }

    fn link_front(&mut self, index: usize) {
        let first = self.slots[ROOT].next;
        self.slots[index].prev = ROOT;
        self.slots[index].next = first;
        self.slots[first].prev = index;
        self.slots[ROOT].next = index;
    }

    fn unlink(&mut self, index: usize) {
        let (prev, next) = (self.slots[index].prev, self.slots[index].next);
        self.slots[prev].next = next;
        self.slots[next].prev = prev;
        self.slots[index].prev = index;
        self.slots[index].next = index;
    }
}

impl<K, V> Default for RecencyRing<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Front-to-back iterator over ring entries.
pub struct RingIter<'a, K, V> {
    ring: &'a RecencyRing<K, V>,
    cursor: usize,
}

impl<'a, K, V> Iterator for RingIter<'a, K, V> {
    type Item = &'a CacheEntry<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == ROOT {
            return None;
        }
        let slot = &self.ring.slots[self.cursor];
        self.cursor = slot.next;
        slot.entry.as_ref()
    }
}
