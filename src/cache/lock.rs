//! Lock Modes
//!
//! The facade stores its core in `L::Cell<_>` and enters it through
//! `L::with`. `Concurrent` uses a reentrant mutex so composite operations
//! can call other locking operations on the same thread. `Local` is a plain
//! `RefCell`; the cache is then `!Sync` and locking costs nothing.

use std::cell::RefCell;

use parking_lot::ReentrantMutex;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Concurrent {}
    impl Sealed for super::Local {}
}

/// Synchronization strategy of an [`LruCache`](crate::LruCache).
pub trait LockMode: sealed::Sealed + 'static {
    type Cell<T>;

    fn new_cell<T>(value: T) -> Self::Cell<T>;

    /// Runs `f` with the lock held. Reentrant on the owning thread.
    fn with<T, R>(cell: &Self::Cell<T>, f: impl FnOnce(&RefCell<T>) -> R) -> R;
}

/// Thread-safe mode backed by `parking_lot::ReentrantMutex`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Concurrent;

/// Single-threaded mode with a no-op lock.
#[derive(Debug, Clone, Copy, Default)]
pub struct Local;

impl LockMode for Concurrent {
    type Cell<T> = ReentrantMutex<RefCell<T>>;

    fn new_cell<T>(value: T) -> Self::Cell<T> {
        ReentrantMutex::new(RefCell::new(value))
    }

    fn with<T, R>(cell: &Self::Cell<T>, f: impl FnOnce(&RefCell<T>) -> R) -> R {
        let guard = cell.lock();
        f(&guard)
    }
}

impl LockMode for Local {
    type Cell<T> = RefCell<T>;

    fn new_cell<T>(value: T) -> Self::Cell<T> {
        RefCell::new(value)
    }

    fn with<T, R>(cell: &Self::Cell<T>, f: impl FnOnce(&RefCell<T>) -> R) -> R {
        f(cell)
    }
}
