//! ttl_lru - A bounded, thread-safe LRU cache with TTL expiration
//!
//! Entries are evicted least-recently-used first once the cache grows past
//! its capacity. Entries inserted with a TTL are removed by a background
//! worker that sleeps until the nearest deadline. The `memoize` module
//! builds function memoization on top of the cache.

pub mod cache;
pub mod config;
pub mod error;
pub mod memoize;
pub mod tasks;

pub use cache::{CacheStats, Concurrent, Local, LocalLruCache, LruCache};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use memoize::{derive_key, LazyCache, MemoStore, Memoizer};
