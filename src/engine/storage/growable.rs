//! Dynamically growing continuous storage.

use std::ptr::NonNull;

use crate::engine::component::Component;
use crate::engine::storage::{
    init_slot, refresh_slot, ContinuousStorage, Storage, StorageGrow, StorageLayout,
};
use crate::engine::types::EntityId;


/// Growable storage with an initial reservation of `N` slots.
///
/// Shares the swap-with-last relocation rule of
/// [`StaticStorage`](crate::engine::storage::StaticStorage). When the
/// backing buffer regrows, every live element relocates at once; the push
/// path refreshes all tickets before handing out the new slot, so cached
/// handles stay valid across growth.
pub struct GrowableStorage<T: Component, const N: usize> {
    data: Vec<T>,
}

impl<T: Component, const N: usize> Default for GrowableStorage<T, N> {
    fn default() -> Self {
        debug_assert!(std::mem::size_of::<T>() != 0, "zero-sized components are not supported");
        Self { data: Vec::with_capacity(N) }
    }
}

impl<T: Component, const N: usize> GrowableStorage<T, N> {
    /// Creates an empty storage with `N` slots reserved.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a new component with the given id and constructor arguments.
    pub fn push(&mut self, id: EntityId, args: T::Args) -> NonNull<T> {
        self.reserve_for_push();
        self.data.push(T::default());
        let slot = NonNull::from(self.data.last_mut().expect("push just appended"));
        unsafe { init_slot(slot, id, args) };
        slot
    }

    /// Moves an existing component value in. See [`Storage::adopt`].
    pub fn push_value(&mut self, value: T) -> NonNull<T> {
        self.reserve_for_push();
        self.data.push(value);
        let slot = NonNull::from(self.data.last_mut().expect("push just appended"));
        unsafe { refresh_slot(slot) };
        slot
    }

    /// Grows the buffer ahead of a push if it is at capacity, repointing
    /// every live ticket at the relocated elements.
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

    fn release(&mut self, obj: NonNull<T>) {
        let index = self.index_of(obj);
        assert!(index < self.data.len(), "releasing an object from another storage");
        debug_assert!(!self.data.is_empty(), "releasing from an empty storage");

        self.data.swap_remove(index);
        if index < self.data.len() {
            let slot = NonNull::from(&mut self.data[index]);
            unsafe { refresh_slot(slot) };
        }
        debug_assert!(
            self.data.last().map_or(true, |obj| obj.base().has_ticket()),
            "release left the storage in an invalid state"
        );
    }
}

impl<T: Component, const N: usize> Storage<T> for GrowableStorage<T, N> {
    const GROW: StorageGrow = StorageGrow::Growable;
    const LAYOUT: StorageLayout = StorageLayout::Continuous;

    #[inline]
    fn spawn(&mut self, _predicate: bool, id: EntityId, args: T::Args) -> NonNull<T> {
        self.push(id, args)
    }

    #[inline]
    fn adopt(&mut self, _predicate: bool, value: T) -> NonNull<T> {
        self.push_value(value)
    }

    fn pop(&mut self, obj: NonNull<T>, args: T::DestroyArgs) {
        debug_assert!(!self.data.is_empty(), "popping from an empty storage");
        unsafe { super::teardown_slot(obj, args) };
        self.release(obj);
    }

    fn extract(&mut self, obj: NonNull<T>) -> T {
        let index = self.index_of(obj);
        assert!(index < self.data.len(), "extracting an object from another storage");

        unsafe {
            let value = std::ptr::read(self.data.as_ptr().add(index));
            let last = self.data.len() - 1;
            if index != last {
                std::ptr::copy(
                    self.data.as_ptr().add(last),
                    self.data.as_mut_ptr().add(index),
                    1,
                );
                refresh_slot(NonNull::new_unchecked(self.data.as_mut_ptr().add(index)));
            }
            self.data.set_len(last);
            value
        }
    }

    fn clear(&mut self) {
        for obj in self.data.iter_mut() {
            obj.destroy(T::DestroyArgs::default());
            obj.base_mut().invalidate_ticket();
        }
        self.data.clear();
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
    fn side_of(&self, _obj: NonNull<T>) -> bool {
        false
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

impl<T: Component, const N: usize> ContinuousStorage<T> for GrowableStorage<T, N> {}

impl<T: Component, const N: usize> Drop for GrowableStorage<T, N> {
    fn drop(&mut self) {
        self.clear();
    }
}
