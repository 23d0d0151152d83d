//! Storage orchestration: stable id lookup over relocating elements.
//!
//! An [`Orchestrator`] wraps one storage and maintains the index
//! `entity id → ticket`, so components can be found by id in O(1) no
//! matter how often the packed buffer relocates them. It also mediates
//! moves of live components between orchestrators, including across
//! storage variants.
//!
//! ## Write locking
//!
//! Orchestrator state is single-writer: no mutation may run concurrently
//! with iteration. Scheme views flag the orchestrators they iterate as
//! write-locked and clear the flag through the wait counter's completion
//! callback; in debug builds every mutating operation asserts the flag is
//! clear. Release builds carry the flag but skip the asserts.

use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::engine::component::Component;
use crate::engine::storage::{ContinuousStorage, PartitionedStorage, Storage};
use crate::engine::ticket::TicketRef;
use crate::engine::types::EntityId;


/// A storage plus an `id → ticket` index.
///
/// ## Invariants
/// - Every live component of the wrapped storage is reachable through
///   exactly one index entry whose ticket resolves to the component's
///   current address.
/// - No two live components share an id.
pub struct Orchestrator<T: Component, S: Storage<T>> {
    tickets: HashMap<EntityId, TicketRef<T>>,
    storage: S,
    write_lock: Arc<AtomicBool>,
}

impl<T: Component, S: Storage<T>> Default for Orchestrator<T, S> {
    fn default() -> Self {
        Self {
            tickets: HashMap::new(),
            storage: S::default(),
            write_lock: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl<T: Component, S: Storage<T>> Orchestrator<T, S> {
    /// Creates an empty orchestrator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks a component up by id. Returns `None` for unknown ids.
    pub fn get(&self, id: EntityId) -> Option<NonNull<T>> {
        let ticket = self.tickets.get(&id)?;
        debug_assert!(ticket.valid(), "orchestrator holds an invalidated ticket");
        ticket.try_get()
    }

    /// Destroys a live component and removes it from the index.
    ///
    /// The index entry is erased first: once popped, the slot may already
    /// hold a relocated neighbor. The `destroy` hook receives default
    /// teardown arguments; pop through the storage directly to pass
    /// explicit ones.
    pub fn pop(&mut self, obj: NonNull<T>) {
        self.assert_unlocked();
        log::trace!("orchestrator pop");

        let id = unsafe { obj.as_ref() }.id();
        self.tickets.remove(&id);
        self.storage.pop(obj, T::DestroyArgs::default());
    }

    /// Destroys every live component and empties the index.
    pub fn clear(&mut self) {
        self.assert_unlocked();
        log::trace!("orchestrator clear");

        self.tickets.clear();
        self.storage.clear();
    }

    /// Moves a live component into `other`, which must use a continuous
    /// storage variant. Returns the component's new address.
    ///
    /// The component's ticket follows the value, so cached handles keep
    /// resolving after the move.
    pub fn transfer<S2>(&mut self, other: &mut Orchestrator<T, S2>, obj: NonNull<T>) -> NonNull<T>
    where
        S2: ContinuousStorage<T>,
    {
        self.transfer_impl(other, obj, false)
    }

    /// Moves a live component into the partitioned orchestrator `other`,
    /// placing it on the side selected by `predicate`.
    ///
    /// This is the required form when the source is not partitioned and
    /// therefore has no side to propagate.
    pub fn transfer_to_partition<S2>(
        &mut self,
        other: &mut Orchestrator<T, S2>,
        obj: NonNull<T>,
        predicate: bool,
    ) -> NonNull<T>
    where
        S2: PartitionedStorage<T>,
    {
        self.transfer_impl(other, obj, predicate)
    }

    /// Same-variant move used by scheme-level transfers: the partition
    /// side (if any) is propagated from the source.
    pub(crate) fn transfer_matching(
        &mut self,
        other: &mut Orchestrator<T, S>,
        obj: NonNull<T>,
    ) -> NonNull<T> {
        let side = self.storage.side_of(obj);
        self.transfer_impl(other, obj, side)
    }

    fn transfer_impl<S2: Storage<T>>(
        &mut self,
        other: &mut Orchestrator<T, S2>,
        obj: NonNull<T>,
        predicate: bool,
    ) -> NonNull<T> {
        self.assert_unlocked();
        other.assert_unlocked();
        log::trace!("orchestrator move");

        let id = unsafe { obj.as_ref() }.id();
        let ticket = self
            .tickets
            .remove(&id)
            .expect("moved component is not indexed by its orchestrator");

        let value = self.storage.extract(obj);
        let new_ptr = other.storage.adopt(predicate, value);
        other.tickets.insert(id, ticket);
        new_ptr
    }

    /// Number of live components.
    #[inline]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Returns `true` if no component is live.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Returns `true` if no further component can be pushed.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.storage.is_full()
    }

    /// Iterates the live components in storage order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.storage.iter()
    }

    /// Mutably iterates the live components in storage order.
    ///
    /// Iterators are invalidated by any mutating call; acquire them fresh
    /// after every push, pop or move.
    #[inline]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.storage.iter_mut()
    }

    /// Borrows the wrapped storage.
    #[inline]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Mutably borrows the wrapped storage.
    ///
    /// Mutations performed directly on the storage bypass the id index;
    /// callers must keep the index consistent themselves.
    #[inline]
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Pushes through the generic storage surface and records the id
    /// index entry. The typed `push`/`push_in` wrappers are the public
    /// entry points.
    pub(crate) fn spawn(&mut self, predicate: bool, id: EntityId, args: T::Args) -> NonNull<T> {
        self.assert_unlocked();
        log::trace!("orchestrator push");

        let ptr = self.storage.spawn(predicate, id, args);
        let ticket = unsafe { ptr.as_ref() }
            .base()
            .ticket()
            .cloned()
            .expect("spawn always creates a ticket");
        self.tickets.insert(id, ticket);
        ptr
    }

    /// Flags the orchestrator as iterated; mutations assert until
    /// [`unlock_writes`](Self::unlock_writes) clears the flag.
    pub(crate) fn lock_writes(&self) {
        self.write_lock.store(true, Ordering::Release);
    }

    /// Clears the write-locked flag, restoring mutation.
    pub fn unlock_writes(&self) {
        self.write_lock.store(false, Ordering::Release);
    }

    /// Shared handle to the write-lock flag, for deferred unlock through
    /// a wait counter callback.
    pub(crate) fn write_lock_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.write_lock)
    }

    #[inline]
    fn assert_unlocked(&self) {
        debug_assert!(
            !self.write_lock.load(Ordering::Acquire),
            "mutating an orchestrator while a view iterates it"
        );
    }
}

impl<T: Component, S: ContinuousStorage<T>> Orchestrator<T, S> {
    /// Pushes a new component and indexes it under `id`.
    pub fn push(&mut self, id: EntityId, args: T::Args) -> NonNull<T> {
        self.spawn(false, id, args)
    }

    /// Moves an existing component value in and indexes it under its id.
    pub fn push_value(&mut self, value: T) -> NonNull<T> {
        self.assert_unlocked();
        let id = value.id();
        let ptr = self.storage.adopt(false, value);
        let ticket = unsafe { ptr.as_ref() }
            .base()
            .ticket()
            .cloned()
            .expect("adopted component carries its ticket");
        self.tickets.insert(id, ticket);
        ptr
    }
}

impl<T: Component, S: PartitionedStorage<T>> Orchestrator<T, S> {
    /// Pushes a new component on the side selected by `predicate` and
    /// indexes it under `id`.
    pub fn push_in(&mut self, predicate: bool, id: EntityId, args: T::Args) -> NonNull<T> {
        self.spawn(predicate, id, args)
    }

    /// Moves a live component into the partitioned orchestrator `other`,
    /// propagating the component's current side.
    pub fn transfer_preserving<S2>(
        &mut self,
        other: &mut Orchestrator<T, S2>,
        obj: NonNull<T>,
    ) -> NonNull<T>
    where
        S2: PartitionedStorage<T>,
    {
        let side = self.storage.partition(obj);
        self.transfer_impl(other, obj, side)
    }

    /// Moves `obj` to the other partition side. Returns its new address.
    pub fn change_partition(&mut self, predicate: bool, obj: NonNull<T>) -> NonNull<T> {
        self.assert_unlocked();
        log::trace!("orchestrator change partition");

        self.storage.change_partition(predicate, obj)
    }

    /// Returns `true` if `obj` sits on the "true" side.
    #[inline]
    pub fn partition(&self, obj: NonNull<T>) -> bool {
        self.storage.partition(obj)
    }

    /// Number of components on the "true" side.
    #[inline]
    pub fn len_until_partition(&self) -> usize {
        self.storage.len_until_partition()
    }

    /// Number of components on the "false" side.
    #[inline]
    pub fn len_from_partition(&self) -> usize {
        self.storage.len_from_partition()
    }

    /// Iterates the "true" side in storage order.
    #[inline]
    pub fn iter_until_partition(&self) -> impl Iterator<Item = &T> {
        self.storage.until_partition().iter()
    }

    /// Iterates the "false" side in storage order.
    #[inline]
    pub fn iter_from_partition(&self) -> impl Iterator<Item = &T> {
        self.storage.from_partition().iter()
    }
}
