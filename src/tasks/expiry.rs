//! TTL Expiration Worker
//!
//! Background thread that deletes TTL-bearing entries once their deadline
//! passes. It keeps a min-queue of `(deadline, stamp, key)` and sleeps on a
//! condition variable until the earliest deadline, so it never polls.
//!
//! Inserting a nearer deadline or deleting the awaited entry signals the
//! condvar; the worker then adopts the nearer item or drops its target.
//! The worker releases its own lock before calling back into the cache.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use std::io;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::error::{CacheError, Result};

/// Receiver of expiration callbacks.
///
/// `expire` must treat a missing key or a mismatched stamp as a no-op.
pub trait ExpiryTarget<K>: Send + Sync {
    fn expire(&self, key: &K, stamp: u64);
}

struct WakeItem<K> {
    deadline: Instant,
    stamp: u64,
    key: K,
}

impl<K> PartialEq for WakeItem<K> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.stamp == other.stamp
    }
}

impl<K> Eq for WakeItem<K> {}

impl<K> PartialOrd for WakeItem<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for WakeItem<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.deadline, self.stamp).cmp(&(other.deadline, other.stamp))
    }
}

struct WakeState<K> {
    queue: BinaryHeap<Reverse<WakeItem<K>>>,
    /// Stamps deleted while still queued; skipped when popped
    cancelled: HashSet<u64>,
    /// Stamp the worker is currently waiting on or expiring
    current: Option<u64>,
    stopped: bool,
}

impl<K> WakeState<K> {
    fn pop_live(&mut self) -> Option<WakeItem<K>> {
        while let Some(Reverse(item)) = self.queue.pop() {
            if !self.cancelled.remove(&item.stamp) {
                return Some(item);
            }
        }
        None
    }

    /// Pops the queue head if it is due before `deadline`.
    fn pop_nearer(&mut self, deadline: Instant) -> Option<WakeItem<K>> {
        loop {
            let (stamp, head_deadline) = {
                let Reverse(head) = self.queue.peek()?;
                (head.stamp, head.deadline)
            };
            if self.cancelled.remove(&stamp) {
                self.queue.pop();
                continue;
            }
            if head_deadline < deadline {
                return self.queue.pop().map(|Reverse(item)| item);
            }
            return None;
        }
    }

    /// Marks a queued stamp as deleted, compacting the queue once cancelled
    /// items outnumber live ones.
    fn cancel(&mut self, stamp: u64) {
        self.cancelled.insert(stamp);
        let live = self.queue.len().saturating_sub(self.cancelled.len());
        if self.cancelled.len() > live {
            self.compact();
        }
    }

    /// Drops every cancelled item from the queue.
    fn compact(&mut self) {
        let cancelled = std::mem::take(&mut self.cancelled);
        let before = self.queue.len();
        self.queue
            .retain(|Reverse(item)| !cancelled.contains(&item.stamp));
        debug!(
            "Compacted wake queue from {} to {} items",
            before,
            self.queue.len()
        );
    }

    fn is_waiting_on(&self, stamp: u64) -> bool {
        !self.stopped && self.current == Some(stamp)
    }
}

struct Wake<K> {
    state: Mutex<WakeState<K>>,
    signal: Condvar,
}

// == Expiry Scheduler ==
/// Owns the wake queue and the worker thread of one cache.
///
/// The worker is spawned on the first `notify_inserted`. It stops when the
/// scheduler is dropped, when `shutdown` is called, or when the target can
/// no longer be upgraded.
pub struct ExpiryScheduler<K> {
    wake: Arc<Wake<K>>,
    worker_name: String,
    worker: Mutex<Option<JoinHandle<()>>>,
    spawn: Box<SpawnWorker>,
}

type SpawnWorker = dyn Fn(String) -> io::Result<JoinHandle<()>> + Send + Sync;

impl<K> ExpiryScheduler<K>
where
    K: Send + 'static,
{
    // == Constructor ==
    /// Creates a scheduler for `target`. No thread is started yet.
    pub fn new(target: Weak<dyn ExpiryTarget<K>>, worker_name: impl Into<String>) -> Self {
        let wake = Arc::new(Wake {
            state: Mutex::new(WakeState {
                queue: BinaryHeap::new(),
                cancelled: HashSet::new(),
                current: None,
                stopped: false,
            }),
            signal: Condvar::new(),
        });

        let spawn = {
            let wake = Arc::clone(&wake);
            move |name: String| {
                let wake = Arc::clone(&wake);
                let target = target.clone();
                thread::Builder::new()
                    .name(name)
                    .spawn(move || run(wake, target))
            }
        };

        Self {
            wake,
            worker_name: worker_name.into(),
            worker: Mutex::new(None),
            spawn: Box::new(spawn),
        }
    }
}

impl<K> ExpiryScheduler<K> {
    /// Starts the worker thread unless it is already running or was stopped.
    pub fn ensure_worker(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() || self.wake.state.lock().stopped {
            return Ok(());
        }

        let handle = (self.spawn)(self.worker_name.clone())
            .map_err(|err| {
                error!("Failed to spawn expiration worker: {}", err);
                CacheError::WorkerSpawn(err)
            })?;

        info!("Started expiration worker '{}'", self.worker_name);
        *worker = Some(handle);
        Ok(())
    }

    // == Notify Inserted ==
    /// Queues a freshly linked TTL-bearing entry and wakes the worker.
    pub fn notify_inserted(&self, key: K, stamp: u64, deadline: Instant) -> Result<()> {
        self.ensure_worker()?;

        let mut state = self.wake.state.lock();
        if state.stopped {
            warn!(
                "Expiration worker is stopped; entry {} will not expire",
                stamp
            );
            return Ok(());
        }
        state.queue.push(Reverse(WakeItem {
            deadline,
            stamp,
            key,
        }));
        drop(state);

        self.wake.signal.notify_one();
        Ok(())
    }

    // == On Delete ==
    /// Tells the worker a TTL-bearing entry is gone.
    ///
    /// If the worker is waiting on it, the wait is abandoned; otherwise the
    /// queued item is skipped when it surfaces.
    pub fn on_delete(&self, stamp: u64) {
        let mut state = self.wake.state.lock();
        if state.stopped {
            return;
        }
        if state.current == Some(stamp) {
            state.current = None;
            drop(state);
            self.wake.signal.notify_one();
        } else {
            state.cancel(stamp);
        }
    }

    // == Shutdown ==
    /// Stops the worker and waits for it to exit.
    ///
    /// Safe to call repeatedly, and from the worker thread itself, in which
    /// case the join is skipped.
    pub fn shutdown(&self) {
        {
            let mut state = self.wake.state.lock();
            if !state.stopped {
                state.stopped = true;
                state.queue.clear();
                state.cancelled.clear();
                state.current = None;
            }
        }
        self.wake.signal.notify_all();

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                error!("Expiration worker '{}' panicked", self.worker_name);
            }
        }
    }

    /// Returns true while the worker thread is alive.
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn is_stopped(&self) -> bool {
        self.wake.state.lock().stopped
    }

    /// Number of queued wake items, excluding the current wait target.
    pub fn pending(&self) -> usize {
        self.wake.state.lock().queue.len()
    }
}

impl<K> Drop for ExpiryScheduler<K> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<K>(wake: Arc<Wake<K>>, target: Weak<dyn ExpiryTarget<K>>) {
    let mut state = wake.state.lock();

    while !state.stopped {
        let Some(mut candidate) = state.pop_live() else {
            wake.signal.wait(&mut state);
            continue;
        };
        state.current = Some(candidate.stamp);

        while state.is_waiting_on(candidate.stamp) && Instant::now() < candidate.deadline {
            wake.signal.wait_until(&mut state, candidate.deadline);

            if !state.is_waiting_on(candidate.stamp) {
                break;
            }
            if let Some(nearer) = state.pop_nearer(candidate.deadline) {
                let previous = std::mem::replace(&mut candidate, nearer);
                state.queue.push(Reverse(previous));
                state.current = Some(candidate.stamp);
            }
        }

        if !state.is_waiting_on(candidate.stamp) {
            debug!("Dropped wait target {}", candidate.stamp);
            state.current = None;
            continue;
        }

        let Some(cache) = target.upgrade() else {
            break;
        };
        let WakeItem { key, stamp, .. } = candidate;
        MutexGuard::unlocked(&mut state, move || {
            debug!("Expiring entry {}", stamp);
            cache.expire(&key, stamp);
        });
        state.current = None;
    }

    drop(state);
    info!("Expiration worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        expired: Mutex<Vec<u32>>,
    }

    impl ExpiryTarget<u32> for Recorder {
        fn expire(&self, key: &u32, _stamp: u64) {
            self.expired.lock().push(*key);
        }
    }

    fn scheduler() -> (Arc<dyn ExpiryTarget<u32>>, Arc<Recorder>, ExpiryScheduler<u32>) {
        let recorder = Arc::new(Recorder::default());
        let target: Arc<dyn ExpiryTarget<u32>> = recorder.clone();
        let scheduler = ExpiryScheduler::new(Arc::downgrade(&target), "test-expiry");
        (target, recorder, scheduler)
    }

    fn after(ms: u64) -> Instant {
        Instant::now() + Duration::from_millis(ms)
    }

    #[test]
    fn test_worker_starts_lazily() {
        let (_target, _recorder, scheduler) = scheduler();
        assert!(!scheduler.is_running());

        scheduler.notify_inserted(1, 1, after(10_000)).unwrap();
        assert!(scheduler.is_running());
    }

    #[test]
    fn test_expires_in_deadline_order() {
        let (_target, recorder, scheduler) = scheduler();
        scheduler.notify_inserted(3, 1, after(150)).unwrap();
        scheduler.notify_inserted(1, 2, after(50)).unwrap();
        scheduler.notify_inserted(2, 3, after(100)).unwrap();

        sleep(Duration::from_millis(400));
        assert_eq!(*recorder.expired.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_nearer_deadline_is_adopted() {
        let (_target, recorder, scheduler) = scheduler();
        scheduler.notify_inserted(1, 1, after(5_000)).unwrap();
        sleep(Duration::from_millis(30));
        scheduler.notify_inserted(2, 2, after(50)).unwrap();

        sleep(Duration::from_millis(250));
        assert_eq!(*recorder.expired.lock(), vec![2]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_delete_of_current_target_abandons_wait() {
        let (_target, recorder, scheduler) = scheduler();
        scheduler.notify_inserted(1, 1, after(150)).unwrap();
        sleep(Duration::from_millis(30));
        scheduler.on_delete(1);
        scheduler.notify_inserted(2, 2, after(200)).unwrap();

        sleep(Duration::from_millis(400));
        assert_eq!(*recorder.expired.lock(), vec![2]);
    }

    #[test]
    fn test_delete_of_queued_item_is_skipped() {
        let (_target, recorder, scheduler) = scheduler();
        scheduler.notify_inserted(1, 1, after(50)).unwrap();
        scheduler.notify_inserted(2, 2, after(100)).unwrap();
        scheduler.on_delete(2);

        sleep(Duration::from_millis(300));
        assert_eq!(*recorder.expired.lock(), vec![1]);
    }

    #[test]
    fn test_overwrite_churn_keeps_queue_bounded() {
        let (_target, recorder, scheduler) = scheduler();
        scheduler.notify_inserted(100, 1, after(3_600_000)).unwrap();
        scheduler.notify_inserted(101, 2, after(3_601_000)).unwrap();

        // Two keys rewritten over and over, each write cancelling the last
        let mut live = [None, None];
        for i in 0..10_000u64 {
            let slot = (i % 2) as usize;
            let stamp = i + 10;
            if let Some(previous) = live[slot].replace(stamp) {
                scheduler.on_delete(previous);
            }
            scheduler.notify_inserted(slot as u32, stamp, after(7_200_000)).unwrap();
            assert!(scheduler.pending() <= 16, "queue grew to {}", scheduler.pending());
        }

        assert!(recorder.expired.lock().is_empty());
    }

    #[test]
    fn test_shutdown_stops_worker() {
        let (_target, recorder, scheduler) = scheduler();
        scheduler.notify_inserted(1, 1, after(100)).unwrap();
        scheduler.shutdown();

        assert!(!scheduler.is_running());
        assert!(scheduler.is_stopped());

        // Later inserts are accepted but never expire
        scheduler.notify_inserted(2, 2, after(10)).unwrap();
        sleep(Duration::from_millis(200));
        assert!(recorder.expired.lock().is_empty());

        scheduler.shutdown();
    }

    #[test]
    fn test_dropped_target_ends_worker() {
        let (target, recorder, scheduler) = scheduler();
        scheduler.notify_inserted(1, 1, after(30)).unwrap();
        drop(target);
        drop(recorder);

        sleep(Duration::from_millis(200));
        assert!(!scheduler.is_running());
    }
}
