//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{Duration, Instant};

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
///
/// Entries with and without a TTL share this one type; expiration is decided
/// by the presence of `expires_at`.
#[derive(Debug, Clone)]
pub struct CacheEntry<K, V> {
    /// The entry key
    pub key: K,
    /// The stored value
    pub value: V,
    /// Absolute expiration instant, None = no expiration
    pub expires_at: Option<Instant>,
    /// Insertion stamp, unique per insert for the lifetime of a cache
    pub stamp: u64,
}

impl<K, V> CacheEntry<K, V> {
    // == Constructor ==
    /// Creates a new cache entry with an optional absolute deadline.
    pub fn new(key: K, value: V, expires_at: Option<Instant>, stamp: u64) -> Self {
        Self {
            key,
            value,
            expires_at,
            stamp,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current instant reaches its deadline.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub(crate) fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns the remaining TTL, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(Duration::ZERO)` if the deadline has passed
    /// - `Some(remaining)` if the entry has a TTL and hasn't expired
    /// - `None` if the entry never expires
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

/// Computes the absolute deadline for a relative TTL starting now.
///
/// Returns None when the deadline is not representable as an `Instant`;
/// such an entry never expires.
pub(crate) fn deadline_after(ttl: Duration) -> Option<Instant> {
    Instant::now().checked_add(ttl)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_entry_creation_no_ttl() {
        let entry = CacheEntry::new("key", "test_value", None, 1);

        assert_eq!(entry.value, "test_value");
        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired());
        assert!(entry.ttl_remaining().is_none());
    }

    #[test]
    fn test_entry_expiration() {
        let entry = CacheEntry::new(
            "key",
            "test_value",
            deadline_after(Duration::from_millis(50)),
            1,
        );

        assert!(!entry.is_expired());

        sleep(Duration::from_millis(80));

        assert!(entry.is_expired());
        assert_eq!(entry.ttl_remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_ttl_remaining() {
        let entry = CacheEntry::new(
            "key",
            "test_value",
            deadline_after(Duration::from_secs(10)),
            1,
        );

        let remaining = entry.ttl_remaining().unwrap();
        assert!(remaining <= Duration::from_secs(10));
        assert!(remaining >= Duration::from_secs(9));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = Instant::now();
        let entry = CacheEntry::new("key", "test", Some(now), 1);

        assert!(entry.is_expired_at(now), "Entry should be expired at boundary");
    }

    #[test]
    fn test_deadline_after_overflow() {
        assert!(deadline_after(Duration::MAX).is_none());
        assert!(deadline_after(Duration::from_secs(1)).is_some());
    }
}
