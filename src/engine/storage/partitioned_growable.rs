//! Dynamically growing partitioned storage.

use std::ptr::NonNull;

use crate::engine::component::Component;
use crate::engine::storage::{
    init_slot, refresh_slot, teardown_slot, PartitionedStorage, Storage, StorageGrow,
    StorageLayout,
};
use crate::engine::types::EntityId;


/// Growable storage whose packed buffer is split by a partition boundary.
///
/// Same partition rules as
/// [`PartitionedStaticStorage`](crate::engine::storage::PartitionedStaticStorage),
/// over a `Vec` with an initial reservation of `N` slots. Buffer regrowth
/// relocates every element; the push path refreshes all tickets before
/// handing out new slots.
pub struct PartitionedGrowableStorage<T: Component, const N: usize> {
    data: Vec<T>,
    partition_pos: usize,
}

impl<T: Component, const N: usize> Default for PartitionedGrowableStorage<T, N> {
    fn default() -> Self {
        debug_assert!(std::mem::size_of::<T>() != 0, "zero-sized components are not supported");
        Self { data: Vec::with_capacity(N), partition_pos: 0 }
    }
}

impl<T: Component, const N: usize> PartitionedGrowableStorage<T, N> {
    /// Creates an empty storage with `N` slots reserved.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a new component on the side selected by `predicate`.
    pub fn push(&mut self, predicate: bool, id: EntityId, args: T::Args) -> NonNull<T> {
        self.reserve_for_push();
        self.data.push(T::default());
        let index = self.claim_pushed_slot(predicate);
        let slot = NonNull::from(&mut self.data[index]);
        unsafe { init_slot(slot, id, args) };
        slot
    }

    /// Moves an existing component value onto the side selected by
    /// `predicate`. See [`Storage::adopt`].
    pub fn push_value(&mut self, predicate: bool, value: T) -> NonNull<T> {
        self.reserve_for_push();
        self.data.push(value);
        let index = self.claim_pushed_slot(predicate);
        let slot = NonNull::from(&mut self.data[index]);
        unsafe { refresh_slot(slot) };
        slot
    }

    /// Routes the just-appended element to the requested side, swapping
    /// the boundary element to the end when needed. Returns the final
    /// index of the appended element.
    fn claim_pushed_slot(&mut self, predicate: bool) -> usize {
        let mut index = self.data.len() - 1;
        if predicate {
            if index != self.partition_pos {
                self.data.swap(index, self.partition_pos);
                let moved = NonNull::from(&mut self.data[index]);
                unsafe { refresh_slot(moved) };
            }
            index = self.partition_pos;
            self.partition_pos += 1;
        }
        index
    }

    fn reserve_for_push(&mut self) {
        if self.data.len() == self.data.capacity() {
            self.data.reserve(1);
            for obj in self.data.iter_mut() {
                let slot = NonNull::from(&mut *obj);
                unsafe { refresh_slot(slot) };
            }
        }
    }

    #[inline]
    fn index_of(&self, obj: NonNull<T>) -> usize {
        let base = self.data.as_ptr() as usize;
        let addr = obj.as_ptr() as usize;
        debug_assert!(addr >= base, "releasing an object from another storage");
        debug_assert!((addr - base) % std::mem::size_of::<T>() == 0);
        (addr - base) / std::mem::size_of::<T>()
    }

    /// Applies the partition-aware relocation rule to the hole at `index`.
    ///
    /// The slot at `index` must already be logically dead (value dropped
    /// or moved out by the caller); the vector length is shrunk here.
    fn close_hole(&mut self, index: usize) {
        unsafe {
            let last = self.data.len() - 1;
            if index < self.partition_pos {
                self.partition_pos -= 1;
                let boundary = self.partition_pos;
                if index != boundary {
                    std::ptr::copy(
                        self.data.as_ptr().add(boundary),
                        self.data.as_mut_ptr().add(index),
                        1,
                    );
                    refresh_slot(NonNull::new_unchecked(self.data.as_mut_ptr().add(index)));
                }
                if boundary != last {
                    std::ptr::copy(
                        self.data.as_ptr().add(last),
                        self.data.as_mut_ptr().add(boundary),
                        1,
                    );
                    refresh_slot(NonNull::new_unchecked(self.data.as_mut_ptr().add(boundary)));
                }
            } else if index != last {
                std::ptr::copy(
                    self.data.as_ptr().add(last),
                    self.data.as_mut_ptr().add(index),
                    1,
                );
                refresh_slot(NonNull::new_unchecked(self.data.as_mut_ptr().add(index)));
            }
            self.data.set_len(last);
        }
    }
}

impl<T: Component, const N: usize> Storage<T> for PartitionedGrowableStorage<T, N> {
    const GROW: StorageGrow = StorageGrow::Growable;
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
        debug_assert!(!self.data.is_empty(), "popping from an empty storage");
        let index = self.index_of(obj);
        assert!(index < self.data.len(), "releasing an object from another storage");

        unsafe {
            teardown_slot(obj, args);
            std::ptr::drop_in_place(obj.as_ptr());
        }
        self.close_hole(index);
    }

    fn extract(&mut self, obj: NonNull<T>) -> T {
        let index = self.index_of(obj);
        assert!(index < self.data.len(), "extracting an object from another storage");

        let value = unsafe { obj.as_ptr().read() };
        self.close_hole(index);
        value
    }

    fn clear(&mut self) {
        for obj in self.data.iter_mut() {
            obj.destroy(T::DestroyArgs::default());
            obj.base_mut().invalidate_ticket();
        }
        self.data.clear();
        self.partition_pos = 0;
    }

    #[inline]
    fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    fn is_full(&self) -> bool {
        false
    }

    #[inline]
    fn side_of(&self, obj: NonNull<T>) -> bool {
        self.partition(obj)
    }

    #[inline]
    fn slices(&self) -> (&[T], &[T]) {
        (&self.data, &[])
    }

    #[inline]
    fn slices_mut(&mut self) -> (&mut [T], &mut [T]) {
        (&mut self.data, &mut [])
    }
}

impl<T: Component, const N: usize> PartitionedStorage<T> for PartitionedGrowableStorage<T, N> {
    fn change_partition(&mut self, predicate: bool, obj: NonNull<T>) -> NonNull<T> {
        assert!(predicate != self.partition(obj), "can't change to the same partition");
        let index = self.index_of(obj);

        let boundary = if predicate { self.partition_pos } else { self.partition_pos - 1 };
        if index != boundary {
            self.data.swap(index, boundary);
            let moved = NonNull::from(&mut self.data[index]);
            unsafe { refresh_slot(moved) };
        }
        if predicate {
            self.partition_pos += 1;
        } else {
            self.partition_pos -= 1;
        }

        let slot = NonNull::from(&mut self.data[boundary]);
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
        &self.data[..self.partition_pos]
    }

    #[inline]
    fn from_partition(&self) -> &[T] {
        &self.data[self.partition_pos..]
    }

    #[inline]
    fn until_partition_mut(&mut self) -> &mut [T] {
        &mut self.data[..self.partition_pos]
    }

    #[inline]
    fn from_partition_mut(&mut self) -> &mut [T] {
        &mut self.data[self.partition_pos..]
    }
}

impl<T: Component, const N: usize> Drop for PartitionedGrowableStorage<T, N> {
    fn drop(&mut self) {
        self.clear();
    }
}
