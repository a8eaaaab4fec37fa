//! Cache Module
//!
//! Provides the in-memory LRU cache with TTL expiration.

mod entry;
mod lock;
mod ordered;
mod ring;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use lock::{Concurrent, Local, LockMode};
pub use ordered::{Insertion, OrderedCore};
pub use ring::{RecencyRing, RingIter};
pub use stats::CacheStats;
pub use store::{LocalLruCache, LruCache};
