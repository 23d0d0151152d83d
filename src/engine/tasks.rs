//! Deferred task managers with per-worker double buffering.
//!
//! A [`TaskManager`] lets callbacks running inside a view schedule work
//! that must not mutate storages mid-iteration. Each worker thread owns a
//! pair of task buffers; [`schedule`](TaskManager::schedule) appends to
//! the calling worker's live buffer, and
//! [`execute`](TaskManager::execute) swaps the pair per worker before
//! draining, so tasks scheduled *by running tasks* land in the next pass
//! instead of invalidating the buffer being drained.
//!
//! [`VariantTaskManager`] is the value-typed sibling: it buffers plain
//! task values (typically an enum) and drains them through a visitor.

use std::mem;
use std::sync::Mutex;

use crate::engine::component::Component;
use crate::engine::sync::{recover, worker_index, WorkerPool};
use crate::engine::ticket::TicketRef;


type Task = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct DualBuffer {
    front: Vec<Task>,
    back: Vec<Task>,
}

/// Double-buffered deferred task queues, one pair per worker thread.
///
/// Threads outside the worker pool share one overflow slot, so
/// scheduling is always possible.
pub struct TaskManager {
    slots: Vec<Mutex<DualBuffer>>,
}

impl TaskManager {
    /// Creates a manager sized for `pool`'s workers.
    pub fn new(pool: &WorkerPool) -> Self {
        let slots = (0..pool.worker_count() + 1).map(|_| Mutex::new(DualBuffer::default())).collect();
        Self { slots }
    }

    #[inline]
    fn slot(&self) -> &Mutex<DualBuffer> {
        let overflow = self.slots.len() - 1;
        let index = worker_index().filter(|index| *index < overflow).unwrap_or(overflow);
        &self.slots[index]
    }

    /// Appends a task to the calling worker's live buffer.
    pub fn schedule(&self, task: impl FnOnce() + Send + 'static) {
        recover(self.slot().lock()).front.push(Box::new(task));
    }

    /// Schedules a task guarded by a ticket: at execution time the task
    /// runs only if the ticket is still valid.
    ///
    /// [`execute`](TaskManager::execute) runs on the draining thread
    /// under the engine's single-writer rule, so a ticket cannot be
    /// invalidated between the validity check and the dereference.
    pub fn schedule_if<T: Component>(
        &self,
        ticket: TicketRef<T>,
        task: impl FnOnce(&mut T) + Send + 'static,
    ) {
        self.schedule(move || {
            if ticket.valid() {
                let mut ptr = ticket.get();
                task(unsafe { ptr.as_mut() });
            }
        });
    }

    /// Two-ticket form of [`schedule_if`](TaskManager::schedule_if): the
    /// task runs only if both tickets are still valid.
    pub fn schedule_if2<A: Component, B: Component>(
        &self,
        first: TicketRef<A>,
        second: TicketRef<B>,
        task: impl FnOnce(&mut A, &mut B) + Send + 'static,
    ) {
        self.schedule(move || {
            if first.valid() && second.valid() {
                let mut a = first.get();
                let mut b = second.get();
                task(unsafe { a.as_mut() }, unsafe { b.as_mut() });
            }
        });
    }

    /// Drains every worker's buffered tasks on the calling thread.
    ///
    /// Per worker, the buffer pair is swapped first and the old live
    /// buffer drained without holding the slot lock; tasks scheduled
    /// while draining land in the fresh live buffer and run on the next
    /// pass.
    pub fn execute(&self) {
        for slot in &self.slots {
            let mut pending = {
                let mut guard = recover(slot.lock());
                let buffers = &mut *guard;
                mem::swap(&mut buffers.front, &mut buffers.back);
                mem::take(&mut buffers.back)
            };

            for task in pending.drain(..) {
                task();
            }

            // Hand the (empty) allocation back for reuse.
            recover(slot.lock()).back = pending;
        }
    }
}

/// Per-worker buffers of plain task values, drained through a visitor.
pub struct VariantTaskManager<T> {
    slots: Vec<Mutex<Vec<T>>>,
}

impl<T: Send> VariantTaskManager<T> {
    /// Creates a manager sized for `pool`'s workers.
    pub fn new(pool: &WorkerPool) -> Self {
        let slots = (0..pool.worker_count() + 1).map(|_| Mutex::new(Vec::new())).collect();
        Self { slots }
    }

    #[inline]
    fn slot(&self) -> &Mutex<Vec<T>> {
        let overflow = self.slots.len() - 1;
        let index = worker_index().filter(|index| *index < overflow).unwrap_or(overflow);
        &self.slots[index]
    }

    /// Appends a task value to the calling worker's buffer.
    pub fn schedule(&self, value: T) {
        recover(self.slot().lock()).push(value);
    }

    /// Drains every worker's buffered values through `visitor` on the
    /// calling thread.
    pub fn execute(&self, mut visitor: impl FnMut(T)) {
        for slot in &self.slots {
            let mut pending = mem::take(&mut *recover(slot.lock()));
            for value in pending.drain(..) {
                visitor(value);
            }
            *recover(slot.lock()) = pending;
        }
    }
}
