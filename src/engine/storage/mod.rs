//! Contiguous component storages.
//!
//! Five concrete containers share one operational surface and differ only
//! in their growth and relocation rules:
//!
//! | Type | Growth | Layout |
//! |---|---|---|
//! | [`StaticStorage`] | fixed capacity `N` | continuous |
//! | [`GrowableStorage`] | dynamic, reserve `N` | continuous |
//! | [`StaticGrowableStorage`] | fixed head + growable tail | continuous |
//! | [`PartitionedStaticStorage`] | fixed capacity `N` | partitioned |
//! | [`PartitionedGrowableStorage`] | dynamic, reserve `N` | partitioned |
//!
//! All storages keep their live elements packed. Removal therefore
//! relocates some other element into the freed slot, and growable buffers
//! may relocate every element when they regrow; each relocation is
//! followed by a ticket refresh so cached handles keep resolving.
//!
//! Partitioned storages maintain a boundary index splitting the packed
//! buffer into a "true" prefix and a "false" suffix; a slot's side is
//! determined solely by its position relative to the boundary.
//!
//! ## Element lifecycle
//!
//! On push: the slot is written, a fresh ticket is created, then the
//! component's `construct` hook runs. On pop: the `destroy` hook runs with
//! the caller's teardown arguments, the ticket is invalidated, then the
//! relocation rule is applied. Releasing
//! an element that does not belong to the storage, popping from an empty
//! storage, and pushing past a fixed capacity are contract violations and
//! are asserted, not recovered.

pub mod growable;
pub mod partitioned_growable;
pub mod partitioned_static;
pub mod static_growable;
pub mod static_storage;

pub use growable::GrowableStorage;
pub use partitioned_growable::PartitionedGrowableStorage;
pub use partitioned_static::PartitionedStaticStorage;
pub use static_growable::StaticGrowableStorage;
pub use static_storage::StaticStorage;

use std::ptr::NonNull;

use crate::engine::component::Component;
use crate::engine::types::EntityId;


/// Growth strategy of a storage variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageGrow {
    /// Capacity is fixed at construction; overflow asserts.
    Fixed,
    /// Capacity grows on demand; the buffer may relocate.
    Growable,
}

/// Element layout of a storage variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageLayout {
    /// One packed run of live elements.
    Continuous,
    /// One packed run split by a partition boundary.
    Partitioned,
}

/// Returns `true` if every layout in `layouts` is the same variant.
///
/// Used by scheme views to reject zipped traversal over mixed layouts at
/// monomorphization time.
pub const fn uniform_layout(layouts: &[StorageLayout]) -> bool {
    let mut i = 1;
    while i < layouts.len() {
        if !matches!(
            (layouts[0], layouts[i]),
            (StorageLayout::Continuous, StorageLayout::Continuous)
                | (StorageLayout::Partitioned, StorageLayout::Partitioned)
        ) {
            return false;
        }
        i += 1;
    }
    true
}

/// Common surface of every storage variant.
///
/// The `predicate` parameter of [`spawn`](Storage::spawn) and
/// [`adopt`](Storage::adopt) selects the partition side on partitioned
/// variants and is ignored by continuous ones; the typed inherent
/// `push`/`push_value` methods on each concrete storage are the intended
/// entry points for user code.
pub trait Storage<T: Component>: Default {
    /// Growth strategy of this variant.
    const GROW: StorageGrow;
    /// Element layout of this variant.
    const LAYOUT: StorageLayout;

    /// Allocates a slot, writes a default value, creates its ticket and
    /// runs the `construct` hook. Returns the new element's address.
    fn spawn(&mut self, predicate: bool, id: EntityId, args: T::Args) -> NonNull<T>;

    /// Moves an existing component value in, refreshing its ticket.
    ///
    /// The value must have been allocated through a storage (it carries
    /// its ticket with it); this is the move-between-storages path.
    fn adopt(&mut self, predicate: bool, value: T) -> NonNull<T>;

    /// Runs the `destroy` hook with `args`, invalidates the ticket and
    /// applies the relocation rule.
    fn pop(&mut self, obj: NonNull<T>, args: T::DestroyArgs);

    /// Moves the element's value out and applies the relocation rule
    /// without running any lifecycle hook. Used for cross-storage moves.
    fn extract(&mut self, obj: NonNull<T>) -> T;

    /// Destroys every live element (hooks included) and empties the
    /// storage.
    fn clear(&mut self);

    /// Number of live elements.
    fn len(&self) -> usize;

    /// Returns `true` if no element is live.
    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if no further element can be pushed.
    fn is_full(&self) -> bool;

    /// The element's partition side; always `false` on continuous
    /// variants. Lets generic move paths propagate the side without
    /// knowing the source layout.
    fn side_of(&self, obj: NonNull<T>) -> bool;

    /// The live elements as up to two packed runs, in storage order.
    fn slices(&self) -> (&[T], &[T]);

    /// Mutable view of the live elements as up to two packed runs.
    fn slices_mut(&mut self) -> (&mut [T], &mut [T]);

    /// Iterates the live elements in storage order.
    #[inline]
    fn iter(&self) -> impl Iterator<Item = &T> {
        let (head, tail) = self.slices();
        head.iter().chain(tail.iter())
    }

    /// Mutably iterates the live elements in storage order.
    #[inline]
    fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        let (head, tail) = self.slices_mut();
        head.iter_mut().chain(tail.iter_mut())
    }
}

/// Marker for the continuous-layout variants.
pub trait ContinuousStorage<T: Component>: Storage<T> {}

/// Extra surface of the partitioned variants.
pub trait PartitionedStorage<T: Component>: Storage<T> {
    /// Moves `obj` to the other partition side and returns its new
    /// address. Changing to the side the element is already on is a
    /// contract violation and asserts.
    fn change_partition(&mut self, predicate: bool, obj: NonNull<T>) -> NonNull<T>;

    /// Returns `true` if `obj` currently sits on the "true" side.
    fn partition(&self, obj: NonNull<T>) -> bool;

    /// Number of elements on the "true" side.
    fn len_until_partition(&self) -> usize;

    /// Number of elements on the "false" side.
    #[inline]
    fn len_from_partition(&self) -> usize {
        self.len() - self.len_until_partition()
    }

    /// The "true" side as a packed slice.
    fn until_partition(&self) -> &[T];

    /// The "false" side as a packed slice.
    fn from_partition(&self) -> &[T];

    /// Mutable view of the "true" side.
    fn until_partition_mut(&mut self) -> &mut [T];

    /// Mutable view of the "false" side.
    fn from_partition_mut(&mut self) -> &mut [T];
}

/// Initializes a freshly written slot: id, ticket, `construct` hook.
///
/// # Safety
/// `slot` must point at a fully written, live `T` owned by the caller's
/// storage, with no outstanding references.
#[inline]
pub(crate) unsafe fn init_slot<T: Component>(mut slot: NonNull<T>, id: EntityId, args: T::Args) {
    let obj = unsafe { slot.as_mut() };
    obj.base_mut().set_id(id);
    obj.base_mut().recreate_ticket(slot);
    obj.construct(args);
}

/// Runs the destroy hook with `args` and invalidates the ticket, leaving
/// the value in place for the caller's relocation rule.
///
/// # Safety
/// `slot` must point at a live `T` with no outstanding references.
#[inline]
pub(crate) unsafe fn teardown_slot<T: Component>(mut slot: NonNull<T>, args: T::DestroyArgs) {
    let obj = unsafe { slot.as_mut() };
    obj.destroy(args);
    obj.base_mut().invalidate_ticket();
}

/// Repoints a relocated element's ticket at its new slot.
///
/// # Safety
/// `slot` must point at a live `T` with no outstanding references.
#[inline]
pub(crate) unsafe fn refresh_slot<T: Component>(mut slot: NonNull<T>) {
    let obj = unsafe { slot.as_mut() };
    obj.base_mut().refresh_ticket(slot);
}
