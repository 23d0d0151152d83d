//! Worker pool and wait counter.
//!
//! Scheme views issue their traversal tasks to a [`WorkerPool`] and join
//! them through a [`WaitCounter`]. The pool is a thin wrapper over a
//! rayon thread pool; the counter is the engine's sole join primitive:
//! tasks increment it when scheduled and decrement it on completion, and
//! [`WaitCounter::wait`] blocks the caller until the count reaches zero,
//! then runs any one-shot completion callbacks (the views use those to
//! release the write locks of the orchestrators they iterated).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

pub use rayon::ThreadPoolBuildError;


/// Pool of worker threads executing view tasks.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    /// Starts a pool with `threads` workers (0 selects the default).
    pub fn new(threads: usize) -> Result<Self, ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
        Ok(Self { pool })
    }

    /// Runs `f` with a scope that can spawn tasks onto the pool; returns
    /// once every spawned task has completed.
    #[inline]
    pub fn scope<'scope, F, R>(&self, f: F) -> R
    where
        F: FnOnce(&rayon::Scope<'scope>) -> R + Send,
        R: Send,
    {
        self.pool.scope(f)
    }

    /// Executes `f` on a pool worker and returns its result.
    #[inline]
    pub fn install<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(f)
    }

    /// Number of worker threads in the pool.
    #[inline]
    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }
}

/// Index of the calling worker thread within its pool, or `None` when
/// called from a thread that is not a pool worker.
#[inline]
pub fn worker_index() -> Option<usize> {
    rayon::current_thread_index()
}

type DoneCallback = Box<dyn FnOnce() + Send>;

/// Counts outstanding tasks and wakes waiters when none remain.
///
/// One-shot completion callbacks registered with
/// [`on_wait_done`](WaitCounter::on_wait_done) run on the waiting thread
/// after [`wait`](WaitCounter::wait) unblocks, exactly once.
#[derive(Default)]
pub struct WaitCounter {
    pending: Mutex<usize>,
    idle: Condvar,
    completed: AtomicUsize,
    callbacks: Mutex<Vec<DoneCallback>>,
}

impl WaitCounter {
    /// Creates a counter with no outstanding tasks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `n` newly scheduled tasks.
    pub fn add(&self, n: usize) {
        *recover(self.pending.lock()) += n;
    }

    /// Records one completed task, waking waiters if it was the last.
    pub fn done(&self) {
        let mut pending = recover(self.pending.lock());
        debug_assert!(*pending > 0, "counter completed more tasks than were scheduled");
        *pending = pending.saturating_sub(1);
        self.completed.fetch_add(1, Ordering::Release);
        if *pending == 0 {
            self.idle.notify_all();
        }
    }

    /// Blocks until the count of outstanding tasks reaches zero, then
    /// drains the completion callbacks.
    pub fn wait(&self) {
        let mut pending = recover(self.pending.lock());
        while *pending > 0 {
            pending = recover(self.idle.wait(pending));
        }
        drop(pending);

        let callbacks = std::mem::take(&mut *recover(self.callbacks.lock()));
        for callback in callbacks {
            callback();
        }
    }

    /// Registers a one-shot callback to run after the next
    /// [`wait`](WaitCounter::wait) unblocks.
    pub fn on_wait_done(&self, callback: impl FnOnce() + Send + 'static) {
        recover(self.callbacks.lock()).push(Box::new(callback));
    }

    /// Total number of tasks completed through this counter.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }
}

/// Continues through lock poisoning: a task panic must not wedge the
/// primitive for every other worker.
#[inline]
pub(crate) fn recover<'a, G>(
    result: Result<MutexGuard<'a, G>, std::sync::PoisonError<MutexGuard<'a, G>>>,
) -> MutexGuard<'a, G> {
    match result {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_tracks_completion() {
        let counter = WaitCounter::new();
        counter.add(2);
        counter.done();
        counter.done();
        counter.wait();
        assert_eq!(counter.completed(), 2);
    }

    #[test]
    fn wait_runs_callbacks_once() {
        let counter = WaitCounter::new();
        let fired = std::sync::Arc::new(AtomicUsize::new(0));
        let handle = std::sync::Arc::clone(&fired);
        counter.on_wait_done(move || {
            handle.fetch_add(1, Ordering::Relaxed);
        });
        counter.wait();
        counter.wait();
        assert_eq!(fired.load(Ordering::Relaxed), 1);
    }
}
