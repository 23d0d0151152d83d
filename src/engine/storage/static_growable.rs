//! Fixed head with a growable overflow tail.

use std::mem::MaybeUninit;
use std::ptr::NonNull;

use crate::engine::component::Component;
use crate::engine::storage::{
    init_slot, refresh_slot, teardown_slot, ContinuousStorage, Storage, StorageGrow,
    StorageLayout,
};
use crate::engine::types::EntityId;


/// Storage whose first `N` slots never relocate; overflow spills into a
/// growable tail.
///
/// Removal preserves the head/tail separation: releasing a head element
/// compacts within the head only, releasing a tail element compacts
/// within the tail only. A head slot freed while the tail is occupied is
/// refilled by the next push.
pub struct StaticGrowableStorage<T: Component, const N: usize> {
    head: Box<[MaybeUninit<T>; N]>,
    head_len: usize,
    tail: Vec<T>,
}

impl<T: Component, const N: usize> Default for StaticGrowableStorage<T, N> {
    fn default() -> Self {
        debug_assert!(std::mem::size_of::<T>() != 0, "zero-sized components are not supported");
        Self {
            head: Box::new(std::array::from_fn(|_| MaybeUninit::uninit())),
            head_len: 0,
            tail: Vec::with_capacity(N),
        }
    }
}

impl<T: Component, const N: usize> StaticGrowableStorage<T, N> {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a new component with the given id and constructor arguments.
    pub fn push(&mut self, id: EntityId, args: T::Args) -> NonNull<T> {
        let slot = if self.head_len < N {
            let slot = NonNull::from(self.head[self.head_len].write(T::default()));
            self.head_len += 1;
            slot
        } else {
            self.reserve_tail_push();
            self.tail.push(T::default());
            NonNull::from(self.tail.last_mut().expect("push just appended"))
        };
        unsafe { init_slot(slot, id, args) };
        slot
    }

    /// Moves an existing component value in. See [`Storage::adopt`].
    pub fn push_value(&mut self, value: T) -> NonNull<T> {
        let slot = if self.head_len < N {
            let slot = NonNull::from(self.head[self.head_len].write(value));
            self.head_len += 1;
            slot
        } else {
            self.reserve_tail_push();
            self.tail.push(value);
            NonNull::from(self.tail.last_mut().expect("push just appended"))
        };
        unsafe { refresh_slot(slot) };
        slot
    }

    fn reserve_tail_push(&mut self) {
        if self.tail.len() == self.tail.capacity() {
            self.tail.reserve(1);
            for obj in self.tail.iter_mut() {
                let slot = NonNull::from(&mut *obj);
                unsafe { refresh_slot(slot) };
            }
        }
    }

    #[inline]
    fn is_static(&self, obj: NonNull<T>) -> bool {
        let base = self.head.as_ptr() as usize;
        let addr = obj.as_ptr() as usize;
        addr >= base && addr < base + N * std::mem::size_of::<T>()
    }

    #[inline]
    fn head_index_of(&self, obj: NonNull<T>) -> usize {
        let base = self.head.as_ptr() as usize;
        (obj.as_ptr() as usize - base) / std::mem::size_of::<T>()
    }

    #[inline]
    fn tail_index_of(&self, obj: NonNull<T>) -> usize {
        let base = self.tail.as_ptr() as usize;
        let addr = obj.as_ptr() as usize;
        debug_assert!(addr >= base, "releasing an object from another storage");
        (addr - base) / std::mem::size_of::<T>()
    }

    fn release(&mut self, obj: NonNull<T>) {
        if self.is_static(obj) {
            let index = self.head_index_of(obj);
            assert!(index < self.head_len, "releasing an object from another storage");

            unsafe { std::ptr::drop_in_place(obj.as_ptr()) };
            self.head_len -= 1;
            let last = self.head_len;
            if index != last {
                unsafe {
                    let value = self.head[last].as_ptr().read();
                    let slot = NonNull::from(self.head[index].write(value));
                    refresh_slot(slot);
                }
            }
        } else {
            let index = self.tail_index_of(obj);
            assert!(index < self.tail.len(), "releasing an object from another storage");

            self.tail.swap_remove(index);
            if index < self.tail.len() {
                let slot = NonNull::from(&mut self.tail[index]);
                unsafe { refresh_slot(slot) };
            }
        }
    }
}

impl<T: Component, const N: usize> Storage<T> for StaticGrowableStorage<T, N> {
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
        debug_assert!(self.len() > 0, "popping from an empty storage");
        unsafe { teardown_slot(obj, args) };
        self.release(obj);
    }

    fn extract(&mut self, obj: NonNull<T>) -> T {
        if self.is_static(obj) {
            let index = self.head_index_of(obj);
            assert!(index < self.head_len, "extracting an object from another storage");

            let value = unsafe { obj.as_ptr().read() };
            self.head_len -= 1;
            let last = self.head_len;
            if index != last {
                unsafe {
                    let moved = self.head[last].as_ptr().read();
                    let slot = NonNull::from(self.head[index].write(moved));
                    refresh_slot(slot);
                }
            }
            value
        } else {
            let index = self.tail_index_of(obj);
            assert!(index < self.tail.len(), "extracting an object from another storage");

            unsafe {
                let value = std::ptr::read(self.tail.as_ptr().add(index));
                let last = self.tail.len() - 1;
                if index != last {
                    std::ptr::copy(
                        self.tail.as_ptr().add(last),
                        self.tail.as_mut_ptr().add(index),
                        1,
                    );
                    refresh_slot(NonNull::new_unchecked(self.tail.as_mut_ptr().add(index)));
                }
                self.tail.set_len(last);
                value
            }
        }
    }

    fn clear(&mut self) {
        for index in 0..self.head_len {
            unsafe {
                let slot = NonNull::new_unchecked(self.head[index].as_mut_ptr());
                teardown_slot(slot, T::DestroyArgs::default());
                std::ptr::drop_in_place(slot.as_ptr());
            }
        }
        self.head_len = 0;

        for obj in self.tail.iter_mut() {
            obj.destroy(T::DestroyArgs::default());
            obj.base_mut().invalidate_ticket();
        }
        self.tail.clear();
    }

    #[inline]
    fn len(&self) -> usize {
        self.head_len + self.tail.len()
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
        let head =
            unsafe { std::slice::from_raw_parts(self.head.as_ptr().cast::<T>(), self.head_len) };
        (head, &self.tail)
    }

    #[inline]
    fn slices_mut(&mut self) -> (&mut [T], &mut [T]) {
        let head = unsafe {
            std::slice::from_raw_parts_mut(self.head.as_mut_ptr().cast::<T>(), self.head_len)
        };
        (head, &mut self.tail)
    }
}

impl<T: Component, const N: usize> ContinuousStorage<T> for StaticGrowableStorage<T, N> {}

impl<T: Component, const N: usize> Drop for StaticGrowableStorage<T, N> {
    fn drop(&mut self) {
        self.clear();
    }
}
