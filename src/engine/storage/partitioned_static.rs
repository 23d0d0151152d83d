//! Fixed-capacity partitioned storage.

use std::mem::MaybeUninit;
use std::ptr::NonNull;

use crate::engine::component::Component;
use crate::engine::storage::{
    init_slot, refresh_slot, teardown_slot, PartitionedStorage, Storage, StorageGrow,
    StorageLayout,
};
use crate::engine::types::EntityId;


/// Fixed-capacity storage whose packed buffer is split by a partition
/// boundary.
///
/// ## Invariants
/// - Slots `[0, len)` are live; `partition_pos <= len`.
/// - Slots `[0, partition_pos)` hold the "true" side, slots
///   `[partition_pos, len)` the "false" side. A slot's side is determined
///   solely by its position.
///
/// Inserting with `predicate == true` appends, swaps the boundary element
/// to the end and claims the vacated boundary slot. Removal keeps both
/// sides packed by retracting the boundary and refilling the hole from
/// the physical tail.
pub struct PartitionedStaticStorage<T: Component, const N: usize> {
    data: Box<[MaybeUninit<T>; N]>,
    len: usize,
    partition_pos: usize,
}

impl<T: Component, const N: usize> Default for PartitionedStaticStorage<T, N> {
    fn default() -> Self {
        debug_assert!(std::mem::size_of::<T>() != 0, "zero-sized components are not supported");
        Self {
            data: Box::new(std::array::from_fn(|_| MaybeUninit::uninit())),
            len: 0,
            partition_pos: 0,
        }
    }
}

impl<T: Component, const N: usize> PartitionedStaticStorage<T, N> {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a new component on the side selected by `predicate`.
    ///
    /// ## Panics
    /// Panics if the storage is full.
    pub fn push(&mut self, predicate: bool, id: EntityId, args: T::Args) -> NonNull<T> {
        assert!(self.len < N, "write out of bounds on a fixed storage");
        let index = self.claim_slot(predicate);
        let slot = NonNull::from(self.data[index].write(T::default()));
        unsafe { init_slot(slot, id, args) };
        slot
    }

    /// Moves an existing component value onto the side selected by
    /// `predicate`. See [`Storage::adopt`].
    pub fn push_value(&mut self, predicate: bool, value: T) -> NonNull<T> {
        assert!(self.len < N, "write out of bounds on a fixed storage");
        let index = self.claim_slot(predicate);
        let slot = NonNull::from(self.data[index].write(value));
        unsafe { refresh_slot(slot) };
        slot
    }

    /// Opens an uninitialized slot on the requested side, relocating the
    /// boundary element to the end when needed. Returns the slot index.
    fn claim_slot(&mut self, predicate: bool) -> usize {
        let mut index = self.len;
        if predicate {
            if index != self.partition_pos {
                unsafe {
                    let value = self.data[self.partition_pos].as_ptr().read();
                    let moved = NonNull::from(self.data[index].write(value));
                    refresh_slot(moved);
                }
            }
            index = self.partition_pos;
            self.partition_pos += 1;
        }
        self.len += 1;
        index
    }

    #[inline]
    fn index_of(&self, obj: NonNull<T>) -> usize {
        let base = self.data.as_ptr() as usize;
        let addr = obj.as_ptr() as usize;
        debug_assert!(addr >= base, "releasing an object from another storage");
        debug_assert!((addr - base) % std::mem::size_of::<T>() == 0);
        (addr - base) / std::mem::size_of::<T>()
    }

    /// Moves the value at `from` into the (uninitialized) slot at `to` and
    /// refreshes its ticket.
    #[inline]
    unsafe fn relocate(&mut self, from: usize, to: usize) {
        unsafe {
            let value = self.data[from].as_ptr().read();
            let slot = NonNull::from(self.data[to].write(value));
            refresh_slot(slot);
        }
    }

    /// Applies the partition-aware relocation rule to the hole at `index`.
    ///
    /// The slot at `index` must already be uninitialized (value dropped or
    /// moved out by the caller).
    fn close_hole(&mut self, index: usize) {
        if index < self.partition_pos {
            // "true" side: retract the boundary into the hole, then refill
            // the vacated boundary slot from the physical tail.
            self.partition_pos -= 1;
            let boundary = self.partition_pos;
            if index != boundary {
                unsafe { self.relocate(boundary, index) };
            }
            self.len -= 1;
            let last = self.len;
            if boundary != last {
                unsafe { self.relocate(last, boundary) };
            }
        } else {
            self.len -= 1;
            let last = self.len;
            if index != last {
                unsafe { self.relocate(last, index) };
            }
        }
    }
}

impl<T: Component, const N: usize> Storage<T> for PartitionedStaticStorage<T, N> {
    const GROW: StorageGrow = StorageGrow::Fixed;
    const LAYOUT: StorageLayout = StorageLayout::Partitioned;

    #[inline]
    fn spawn(&mut self, predicate: bool, id: EntityId, args: T::Args) -> NonNull<T> {
        self.push(predicate, id, args)
    }

    #[inline]
    fn adopt(&mut self, predicate: bool, value: T) -> NonNull<T> {
        self.push_value(predicate, value)
    }

    fn pop(&mut self, obj: NonNull<T>, args: T::DestroyArgs) {
        debug_assert!(self.len > 0, "popping from an empty storage");
        let index = self.index_of(obj);
        assert!(index < self.len, "releasing an object from another storage");

        unsafe {
            teardown_slot(obj, args);
            std::ptr::drop_in_place(obj.as_ptr());
        }
        self.close_hole(index);
    }

    fn extract(&mut self, obj: NonNull<T>) -> T {
        let index = self.index_of(obj);
        assert!(index < self.len, "extracting an object from another storage");

        let value = unsafe { obj.as_ptr().read() };
        self.close_hole(index);
        value
    }

    fn clear(&mut self) {
        for index in 0..self.len {
            unsafe {
                let slot = NonNull::new_unchecked(self.data[index].as_mut_ptr());
                teardown_slot(slot, T::DestroyArgs::default());
                std::ptr::drop_in_place(slot.as_ptr());
            }
        }
        self.len = 0;
        self.partition_pos = 0;
    }

    #[inline]
    fn len(&self) -> usize {
        self.len
    }

    #[inline]
    fn is_full(&self) -> bool {
        self.len == N
    }

    #[inline]
    fn side_of(&self, obj: NonNull<T>) -> bool {
        self.partition(obj)
    }

    #[inline]
    fn slices(&self) -> (&[T], &[T]) {
        let live = unsafe { std::slice::from_raw_parts(self.data.as_ptr().cast::<T>(), self.len) };
        (live, &[])
    }

    #[inline]
    fn slices_mut(&mut self) -> (&mut [T], &mut [T]) {
        let live =
            unsafe { std::slice::from_raw_parts_mut(self.data.as_mut_ptr().cast::<T>(), self.len) };
        (live, &mut [])
    }
}

impl<T: Component, const N: usize> PartitionedStorage<T> for PartitionedStaticStorage<T, N> {
    fn change_partition(&mut self, predicate: bool, obj: NonNull<T>) -> NonNull<T> {
        assert!(predicate != self.partition(obj), "can't change to the same partition");
        let index = self.index_of(obj);

        let boundary = if predicate { self.partition_pos } else { self.partition_pos - 1 };
        if index != boundary {
            unsafe {
                std::ptr::swap_nonoverlapping(
                    self.data[index].as_mut_ptr(),
                    self.data[boundary].as_mut_ptr(),
                    1,
                );
                refresh_slot(NonNull::new_unchecked(self.data[index].as_mut_ptr()));
            }
        }
        if predicate {
            self.partition_pos += 1;
        } else {
            self.partition_pos -= 1;
        }

        let slot = unsafe { NonNull::new_unchecked(self.data[boundary].as_mut_ptr()) };
        unsafe { refresh_slot(slot) };
        slot
    }

    #[inline]
    fn partition(&self, obj: NonNull<T>) -> bool {
        self.index_of(obj) < self.partition_pos
    }

    #[inline]
    fn len_until_partition(&self) -> usize {
        self.partition_pos
    }

    #[inline]
    fn until_partition(&self) -> &[T] {
        unsafe { std::slice::from_raw_parts(self.data.as_ptr().cast::<T>(), self.partition_pos) }
    }

    #[inline]
    fn from_partition(&self) -> &[T] {
        unsafe {
            std::slice::from_raw_parts(
                self.data.as_ptr().cast::<T>().add(self.partition_pos),
                self.len - self.partition_pos,
            )
        }
    }

    #[inline]
    fn until_partition_mut(&mut self) -> &mut [T] {
        unsafe {
            std::slice::from_raw_parts_mut(self.data.as_mut_ptr().cast::<T>(), self.partition_pos)
        }
    }

    #[inline]
    fn from_partition_mut(&mut self) -> &mut [T] {
        unsafe {
            std::slice::from_raw_parts_mut(
                self.data.as_mut_ptr().cast::<T>().add(self.partition_pos),
                self.len - self.partition_pos,
            )
        }
    }
}

impl<T: Component, const N: usize> Drop for PartitionedStaticStorage<T, N> {
    fn drop(&mut self) {
        self.clear();
    }
}
