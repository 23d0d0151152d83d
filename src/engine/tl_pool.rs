//! Thread-local object pool with sink rebalancing.
//!
//! Allocation-heavy workloads where some worker threads allocate and
//! others free end up with lopsided free lists: the freeing threads hoard
//! slots the allocating threads can never reuse. This pool keeps one node
//! (free list) per worker thread and periodically *rebalances* by moving
//! every non-sink node's free list into a designated sink node, chosen at
//! random among the registered sinks.
//!
//! ## Status protocol
//!
//! The pool tracks a coarse status:
//!
//! - `Idle` / `Working` — gets and releases use the caller's free list.
//! - `Rebalancing` — gets bypass the free list (fresh allocation) and
//!   releases park their slot on a per-node "freed while rebalancing"
//!   list, drained on the caller's next normal release.
//!
//! Rebalancing only starts from `Idle` and proceeds only while every
//! free list stays under the target of `256 / worker_count` slots; once
//! any list has reached the target the pass is skipped.
//!
//! Allocation failure propagates from the global allocator; the pool has
//! no recovery logic of its own.

use std::collections::{BTreeSet, HashMap};
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread::{self, ThreadId};

use crate::engine::random::tl_rand_index;
use crate::engine::sync::recover;


const IDLE: u8 = 0;
const WORKING: u8 = 1;
const REBALANCING: u8 = 2;

type Slot<T> = Box<MaybeUninit<T>>;

struct Node<T> {
    free_list: Mutex<Vec<Slot<T>>>,
    freed_while_rebalancing: Mutex<Vec<Slot<T>>>,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self {
            free_list: Mutex::new(Vec::new()),
            freed_while_rebalancing: Mutex::new(Vec::new()),
        }
    }
}

/// Per-thread pooled allocator for values of type `T`, bounded to
/// `MAX_WORKERS` participating threads.
pub struct ThreadLocalPool<T, const MAX_WORKERS: usize> {
    nodes: Vec<Node<T>>,
    registry: Mutex<HashMap<ThreadId, usize>>,
    registered: AtomicUsize,
    free_max_approx: AtomicUsize,
    sinks: Mutex<BTreeSet<usize>>,
    has_sink: AtomicBool,
    status: AtomicU8,
    workers: AtomicUsize,
}

impl<T, const MAX_WORKERS: usize> Default for ThreadLocalPool<T, MAX_WORKERS> {
    fn default() -> Self {
        Self {
            nodes: (0..MAX_WORKERS).map(|_| Node::default()).collect(),
            registry: Mutex::new(HashMap::new()),
            registered: AtomicUsize::new(0),
            free_max_approx: AtomicUsize::new(0),
            sinks: Mutex::new(BTreeSet::new()),
            has_sink: AtomicBool::new(false),
            status: AtomicU8::new(IDLE),
            workers: AtomicUsize::new(0),
        }
    }
}

impl<T, const MAX_WORKERS: usize> ThreadLocalPool<T, MAX_WORKERS> {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a boxed `value`, reusing a slot from the calling
    /// thread's free list when one is available.
    pub fn get(&self, value: T) -> Box<T> {
        let node_index = self.node_index();
        self.workers.fetch_add(1, Ordering::AcqRel);

        if self.enter_working() {
            let slot = recover(self.nodes[node_index].free_list.lock()).pop();
            self.leave_working(true);
            return match slot {
                Some(slot) => revive(slot, value),
                None => Box::new(value),
            };
        }

        // Rebalancing is shuffling free lists; allocate fresh.
        self.leave_working(false);
        Box::new(value)
    }

    /// Drops `object`'s value and recycles its slot onto the calling
    /// thread's free list.
    pub fn release(&self, object: Box<T>) {
        let node_index = self.node_index();
        self.workers.fetch_add(1, Ordering::AcqRel);

        let slot = retire(object);
        let node = &self.nodes[node_index];

        if self.enter_working() {
            {
                let mut free_list = recover(node.free_list.lock());
                free_list.push(slot);

                let mut parked = recover(node.freed_while_rebalancing.lock());
                free_list.append(&mut parked);
                drop(parked);

                if !self.is_sink(node_index) {
                    self.free_max_approx.fetch_max(free_list.len(), Ordering::AcqRel);
                }
            }
            self.leave_working(true);
            return;
        }

        // Mid-rebalance: park the slot; the next normal release drains it.
        recover(node.freed_while_rebalancing.lock()).push(slot);
        self.leave_working(false);
    }

    /// Flags the calling thread as a rebalance sink: other threads' free
    /// lists may be drained into its node.
    pub fn mark_sink(&self) {
        let node_index = self.node_index();
        recover(self.sinks.lock()).insert(node_index);
        self.has_sink.store(true, Ordering::Release);
    }

    /// Moves every non-sink free list into a randomly chosen sink node.
    ///
    /// Only runs from the `Idle` status, and only while every free list
    /// stays under the target of `256 / worker_count` slots; once any
    /// list has reached the target the pass is skipped. Requires at
    /// least one sink thread (asserted in debug builds).
    pub fn rebalance(&self) {
        if self.status.compare_exchange(IDLE, REBALANCING, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return;
        }

        if !self.has_sink.load(Ordering::Acquire) {
            debug_assert!(false, "rebalance requires a sink thread");
            self.status.store(IDLE, Ordering::Release);
            return;
        }

        let total = self.registered.load(Ordering::Acquire).max(1);
        if self.free_max_approx.load(Ordering::Acquire) >= (256 / total).max(1) {
            self.status.store(IDLE, Ordering::Release);
            return;
        }

        self.free_max_approx.store(0, Ordering::Release);
        log::debug!("rebalancing thread-local pool across {total} nodes");

        let sinks = recover(self.sinks.lock()).clone();
        for index in 0..total {
            if sinks.contains(&index) {
                continue;
            }

            let sink = *sinks
                .iter()
                .nth(tl_rand_index(sinks.len()))
                .expect("sink set is non-empty");
            let mut drained = std::mem::take(&mut *recover(self.nodes[index].free_list.lock()));
            recover(self.nodes[sink].free_list.lock()).append(&mut drained);
        }

        self.status.store(IDLE, Ordering::Release);
    }

    /// Number of slots currently parked on the calling thread's free
    /// list.
    pub fn free_count(&self) -> usize {
        let node_index = self.node_index();
        recover(self.nodes[node_index].free_list.lock()).len()
    }

    fn node_index(&self) -> usize {
        let id = thread::current().id();
        let mut registry = recover(self.registry.lock());
        if let Some(&index) = registry.get(&id) {
            return index;
        }

        let index = self.registered.fetch_add(1, Ordering::AcqRel);
        assert!(index < MAX_WORKERS, "thread-local pool exceeded its worker capacity");
        registry.insert(id, index);
        index
    }

    fn is_sink(&self, node_index: usize) -> bool {
        self.has_sink.load(Ordering::Acquire) && recover(self.sinks.lock()).contains(&node_index)
    }

    /// Transitions into `Working` unless a rebalance holds the pool.
    fn enter_working(&self) -> bool {
        self.status.compare_exchange(IDLE, WORKING, Ordering::AcqRel, Ordering::Acquire).is_ok()
            || self
                .status
                .compare_exchange(WORKING, WORKING, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }

    /// Leaves the working section; the last worker flips back to `Idle`.
    fn leave_working(&self, expect_working: bool) {
        if self.workers.fetch_sub(1, Ordering::AcqRel) == 1 {
            let flipped =
                self.status.compare_exchange(WORKING, IDLE, Ordering::AcqRel, Ordering::Acquire);
            if expect_working {
                debug_assert!(
                    flipped.is_ok() || self.status.load(Ordering::Acquire) == IDLE,
                    "status changed during an unexpected state"
                );
            }
        }
    }
}

/// Writes `value` into a recycled slot.
fn revive<T>(mut slot: Slot<T>, value: T) -> Box<T> {
    slot.write(value);
    unsafe { Box::from_raw(Box::into_raw(slot).cast::<T>()) }
}

/// Drops the boxed value and keeps its allocation as a slot.
fn retire<T>(object: Box<T>) -> Slot<T> {
    let raw = Box::into_raw(object);
    unsafe {
        std::ptr::drop_in_place(raw);
        Box::from_raw(raw.cast::<MaybeUninit<T>>())
    }
}
