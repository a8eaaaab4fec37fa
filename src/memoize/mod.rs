//! Memoization Module
//!
//! Wraps a cache so that results of a named function are stored under a key
//! derived from the function name and its arguments.
//!
//! ```
//! use std::time::Duration;
//! use ttl_lru::Memoizer;
//!
//! let square = Memoizer::lru("square", 128, Some(Duration::from_secs(600))).unwrap();
//! assert_eq!(square.call(&(4,), |(x,)| x * x).unwrap(), 16);
//! // Served from the cache
//! assert_eq!(square.call(&(4,), |_| unreachable!()).unwrap(), 16);
//! ```

mod key;
mod lazy;

pub use key::derive_key;
pub use lazy::LazyCache;

use std::time::Duration;

use serde::Serialize;

use crate::cache::{LockMode, LruCache};
use crate::config::CacheConfig;
use crate::error::Result;

/// Default capacity of memoization caches.
pub const DEFAULT_MEMO_CAPACITY: usize = 128;

/// Default lifetime of memoized results.
pub const DEFAULT_MEMO_TTL: Duration = Duration::from_secs(10 * 60);

/// Storage backing a [`Memoizer`].
pub trait MemoStore<V> {
    fn lookup(&self, key: &str) -> Option<V>;

    fn store(&self, key: String, value: V) -> Result<()>;
}

impl<V, L> MemoStore<V> for LruCache<String, V, L>
where
    V: Clone,
    L: LockMode,
{
    fn lookup(&self, key: &str) -> Option<V> {
        self.get(key).ok()
    }

    fn store(&self, key: String, value: V) -> Result<()> {
        self.set(key, value)
    }
}

impl<V> MemoStore<V> for LazyCache<String, V>
where
    V: Clone,
{
    fn lookup(&self, key: &str) -> Option<V> {
        self.get(key)
    }

    fn store(&self, key: String, value: V) -> Result<()> {
        self.insert(key, value);
        Ok(())
    }
}

// == Memoizer ==
/// Memoizes calls to one named function.
#[derive(Debug)]
pub struct Memoizer<S> {
    name: String,
    store: S,
}

impl<V> Memoizer<LruCache<String, V>>
where
    V: Clone + Send + 'static,
{
    /// Memoizer backed by a thread-safe LRU cache, optionally expiring results.
    pub fn lru(name: impl Into<String>, capacity: usize, ttl: Option<Duration>) -> Result<Self> {
        let mut config = CacheConfig::new(capacity);
        config.default_ttl = ttl;
        Ok(Self::new(name, LruCache::from_config(&config)?))
    }
}

impl<V> Memoizer<LazyCache<String, V>>
where
    V: Clone,
{
    /// Memoizer backed by the lazily expiring fallback cache.
    pub fn lazy(name: impl Into<String>, maxsize: usize, ttl: Duration) -> Self {
        Self::new(name, LazyCache::new(maxsize, ttl))
    }
}

impl<S> Memoizer<S> {
    pub fn new(name: impl Into<String>, store: S) -> Self {
        Self {
            name: name.into(),
            store,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // == Call ==
    /// Returns the stored result for `args`, or computes and stores it.
    pub fn call<A, V, F>(&self, args: &A, f: F) -> Result<V>
    where
        S: MemoStore<V>,
        A: Serialize + ?Sized,
        V: Clone,
        F: FnOnce(&A) -> V,
    {
        let key = derive_key(&self.name, args)?;
        if let Some(hit) = self.store.lookup(&key) {
            return Ok(hit);
        }
        let value = f(args);
        self.store.store(key, value.clone())?;
        Ok(value)
    }

    /// Like [`call`](Self::call) for fallible functions. Only `Ok` results are
    /// stored; the function's own error is returned in the inner `Result`.
    pub fn try_call<A, V, E, F>(&self, args: &A, f: F) -> Result<std::result::Result<V, E>>
    where
        S: MemoStore<V>,
        A: Serialize + ?Sized,
        V: Clone,
        F: FnOnce(&A) -> std::result::Result<V, E>,
    {
        let key = derive_key(&self.name, args)?;
        if let Some(hit) = self.store.lookup(&key) {
            return Ok(Ok(hit));
        }
        match f(args) {
            Ok(value) => {
                self.store.store(key, value.clone())?;
                Ok(Ok(value))
            }
            Err(err) => Ok(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LocalLruCache;
    use std::cell::Cell;
    use std::thread::sleep;

    #[test]
    fn test_lru_memoizer_hits_cache() {
        let calls = Cell::new(0);
        let memo = Memoizer::lru("double", 2, Some(DEFAULT_MEMO_TTL)).unwrap();
        let double = |x: &u32| {
            calls.set(calls.get() + 1);
            x * 2
        };

        assert_eq!(memo.call(&3, double).unwrap(), 6);
        assert_eq!(memo.call(&3, double).unwrap(), 6);
        assert_eq!(calls.get(), 1);

        assert_eq!(memo.call(&5, double).unwrap(), 10);
        assert_eq!(calls.get(), 2);
        assert_eq!(memo.store().len(), 2);
    }

    #[test]
    fn test_lru_memoizer_evicts() {
        let calls = Cell::new(0);
        let memo = Memoizer::lru("id", 2, None).unwrap();
        let id = |x: &u32| {
            calls.set(calls.get() + 1);
            *x
        };

        memo.call(&3, id).unwrap();
        memo.call(&5, id).unwrap();
        memo.call(&3, id).unwrap();
        // 4 replaces 5, the least recently used
        memo.call(&4, id).unwrap();
        assert_eq!(calls.get(), 3);

        memo.call(&5, id).unwrap();
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn test_lru_memoizer_expires() {
        let calls = Cell::new(0);
        let memo = Memoizer::lru("id", 10, Some(Duration::from_millis(100))).unwrap();
        let id = |x: &u32| {
            calls.set(calls.get() + 1);
            *x
        };

        memo.call(&3, id).unwrap();
        sleep(Duration::from_millis(300));
        memo.call(&3, id).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_try_call_caches_only_ok() {
        let calls = Cell::new(0);
        let memo = Memoizer::lru("div", 10, None).unwrap();
        let divide = |(a, b): &(i32, i32)| {
            calls.set(calls.get() + 1);
            if *b == 0 {
                Err("division by zero")
            } else {
                Ok(a / b)
            }
        };

        assert_eq!(memo.try_call(&(1, 0), divide).unwrap(), Err("division by zero"));
        assert_eq!(memo.try_call(&(1, 0), divide).unwrap(), Err("division by zero"));
        assert_eq!(calls.get(), 2);

        assert_eq!(memo.try_call(&(6, 3), divide).unwrap(), Ok(2));
        assert_eq!(memo.try_call(&(6, 3), divide).unwrap(), Ok(2));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_lazy_memoizer() {
        let calls = Cell::new(0);
        let memo = Memoizer::lazy("id", DEFAULT_MEMO_CAPACITY, Duration::from_millis(100));
        let id = |x: &u32| {
            calls.set(calls.get() + 1);
            *x
        };

        memo.call(&3, id).unwrap();
        memo.call(&3, id).unwrap();
        assert_eq!(calls.get(), 1);

        sleep(Duration::from_millis(200));
        memo.call(&3, id).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_memoizer_over_local_cache() {
        let store: LocalLruCache<String, usize> = LruCache::new_local(4).unwrap();
        let memo = Memoizer::new("len", store);
        assert_eq!(memo.name(), "len");
        assert_eq!(memo.call("hello", |s: &str| s.len()).unwrap(), 5);
        assert_eq!(memo.store().len(), 1);
    }
}
