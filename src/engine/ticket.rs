//! Stable handles over relocatable components.
//!
//! Storages in this engine keep their elements packed: removing an element
//! moves another one into the freed slot, and growable buffers may relocate
//! wholesale. A [`Ticket`] is the indirection that survives all of that —
//! a small shared cell holding the component's *current* address, patched
//! by the storage on every relocation and nulled when the component is
//! destroyed.
//!
//! ## Sharing model
//!
//! Tickets are handed out as [`TicketRef`] (`Arc<Ticket<T>>`). The storage
//! and the orchestrator's id index hold strong references; user code may
//! cache additional ones to survive relocations. The cell lives until the
//! last holder drops it, which is what makes a cached ticket safe to poll
//! after the component is gone: `valid()` simply reports `false`.
//!
//! ## Safety contract
//!
//! [`Ticket::get`] returns the raw component address and is meaningless on
//! an invalid ticket. The returned pointer may dangle the moment the
//! component is popped from its storage; callers that share tickets across
//! tasks must re-check [`Ticket::valid`] under the engine's single-writer
//! rule (no storage mutation concurrent with the access) before
//! dereferencing.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;


/// Shared, reference-counted handle to a ticket cell.
pub type TicketRef<T> = Arc<Ticket<T>>;

/// A relocatable-component handle: one atomic pointer cell.
///
/// ## Invariants
/// - `valid() ⇔` the stored pointer is non-null.
/// - While valid, the pointer is the component's current storage slot.
#[derive(Debug)]
pub struct Ticket<T> {
    ptr: AtomicPtr<T>,
}

impl<T> Ticket<T> {
    /// Creates a new shared ticket pointing at `ptr`.
    #[inline]
    pub fn new(ptr: NonNull<T>) -> TicketRef<T> {
        Arc::new(Self { ptr: AtomicPtr::new(ptr.as_ptr()) })
    }

    /// Returns `true` while the referenced component is alive.
    #[inline]
    pub fn valid(&self) -> bool {
        !self.ptr.load(Ordering::Acquire).is_null()
    }

    /// Returns the component's current address.
    ///
    /// Calling this on an invalid ticket is a contract violation; the
    /// result is asserted in debug builds and unspecified in release.
    #[inline]
    pub fn get(&self) -> NonNull<T> {
        let raw = self.ptr.load(Ordering::Acquire);
        debug_assert!(!raw.is_null(), "dereferencing an invalidated ticket");
        // Invalid tickets yield a dangling-but-aligned sentinel in release.
        NonNull::new(raw).unwrap_or(NonNull::dangling())
    }

    /// Returns the current address, or `None` if the ticket was invalidated.
    #[inline]
    pub fn try_get(&self) -> Option<NonNull<T>> {
        NonNull::new(self.ptr.load(Ordering::Acquire))
    }

    /// Nulls the cell. Outstanding holders observe `valid() == false`.
    #[inline]
    pub(crate) fn invalidate(&self) {
        self.ptr.store(std::ptr::null_mut(), Ordering::Release);
    }

    /// Points the cell at the component's new slot after a relocation.
    #[inline]
    pub(crate) fn repoint(&self, ptr: NonNull<T>) {
        self.ptr.store(ptr.as_ptr(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_tracks_repoint_and_invalidate() {
        let mut a = 7u32;
        let mut b = 9u32;

        let ticket = Ticket::new(NonNull::from(&mut a));
        assert!(ticket.valid());
        assert_eq!(ticket.get(), NonNull::from(&mut a));

        ticket.repoint(NonNull::from(&mut b));
        assert_eq!(ticket.get(), NonNull::from(&mut b));

        ticket.invalidate();
        assert!(!ticket.valid());
        assert!(ticket.try_get().is_none());
    }

    #[test]
    fn clones_observe_the_same_cell() {
        let mut a = 1u8;
        let ticket = Ticket::new(NonNull::from(&mut a));
        let cached = ticket.clone();
        ticket.invalidate();
        assert!(!cached.valid());
    }
}
