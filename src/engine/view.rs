//! Scheme views: serial and parallel traversal drivers.
//!
//! A view walks the components of a scheme and applies a callback to each
//! entity's aligned component tuple, scheduling the work on a
//! [`WorkerPool`] and joining it through a [`WaitCounter`]. Three
//! families exist, differing only in the range they traverse:
//!
//! - [`SchemeView`] — the full range of every storage,
//! - [`SchemeViewUntilPartition`] — the "true" partition side,
//! - [`SchemeViewFromPartition`] — the "false" partition side.
//!
//! Each family offers four traversals:
//!
//! - `continuous` — one task, zipped ranges in storage order,
//! - `continuous_by` — one task walking one component's range, resolving
//!   the peers by id (`search`); tolerates mixed storage layouts,
//! - `parallel` — one task per aligned tuple, unspecified order,
//! - `parallel_by` — one task per element of one component's range, each
//!   resolving peers by id.
//!
//! Views over an empty scheme return without scheduling anything.
//!
//! ## Locking
//!
//! Every view write-locks the orchestrators it touches and registers an
//! unlock callback on the counter, so mutation stays barred from range
//! acquisition until [`WaitCounter::wait`] completes. The callback runs
//! on the waiting thread.
//!
//! ## Aliasing
//!
//! Callbacks receive `&mut` component references. For the zipped
//! traversals these are carved per element out of disjoint storage
//! ranges; for the `_by` traversals they are derived from ticket lookups
//! under the single-writer rule (ids are unique, so tuples never alias).
//! Callbacks must not retain the references beyond the call.

use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::Ordering;

use crate::engine::component::Component;
use crate::engine::scheme::Scheme;
use crate::engine::select::{SchemeIndexed, StoreAt};
use crate::engine::storage::{uniform_layout, PartitionedStorage, Storage};
use crate::engine::sync::{WaitCounter, WorkerPool};
use crate::engine::types::EntityId;


/// Traversal driver over the full range of a scheme's storages.
pub struct SchemeView<L> {
    _components: PhantomData<L>,
}

/// Traversal driver restricted to the "true" partition side.
pub struct SchemeViewUntilPartition<L> {
    _components: PhantomData<L>,
}

/// Traversal driver restricted to the "false" partition side.
pub struct SchemeViewFromPartition<L> {
    _components: PhantomData<L>,
}

/// Carries raw component addresses into worker tasks. Sound because the
/// views hand each task a disjoint set of elements and the orchestrators
/// stay write-locked for the duration.
struct Parcel<P>(P);

unsafe impl<P> Send for Parcel<P> {}

/// Shared store pointer for search-based traversals.
struct SharedStore<St>(*const St);

impl<St> Clone for SharedStore<St> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<St> Copy for SharedStore<St> {}

unsafe impl<St: Sync> Send for SharedStore<St> {}
unsafe impl<St: Sync> Sync for SharedStore<St> {}

// Write-locks every orchestrator of the scheme and schedules the unlock
// for counter-wait completion.
macro_rules! lock_and_defer_unlock {
    ($counter:expr, $store:expr, $(($C:ident, $I:ident)),+) => {
        $(
            {
                let orchestrator = <St as StoreAt<$C, $I>>::orchestrator(&*$store);
                orchestrator.lock_writes();
                let lock = orchestrator.write_lock_handle();
                $counter.on_wait_done(move || lock.store(false, Ordering::Release));
            }
        )+
    };
}

// Live elements of one orchestrator as a mutable iterator, per family.
macro_rules! full_range_mut {
    ($o:expr) => {{
        let (head, tail) = $o.storage_mut().slices_mut();
        head.iter_mut().chain(tail.iter_mut())
    }};
}
macro_rules! until_range_mut {
    ($o:expr) => {
        $o.storage_mut().until_partition_mut().iter_mut()
    };
}
macro_rules! from_range_mut {
    ($o:expr) => {
        $o.storage_mut().from_partition_mut().iter_mut()
    };
}

// Ids of one orchestrator's range, per family.
macro_rules! full_ids {
    ($o:expr) => {
        $o.iter().map(|obj| obj.id()).collect::<Vec<EntityId>>()
    };
}
macro_rules! until_ids {
    ($o:expr) => {
        $o.iter_until_partition().map(|obj| obj.id()).collect::<Vec<EntityId>>()
    };
}
macro_rules! from_ids {
    ($o:expr) => {
        $o.iter_from_partition().map(|obj| obj.id()).collect::<Vec<EntityId>>()
    };
}

// Collects the zipped ranges into per-entity address tuples. Distinct
// component types occupy distinct store positions (see the select
// module), so the mutable borrows taken through `base` are disjoint.
macro_rules! collect_zip {
    ($store:expr, $range_mut:ident, ($C0:ident, $I0:ident, $idx0:tt) $(, ($C:ident, $I:ident, $idx:tt))*) => {{
        let base: *mut St = $store;
        let mut ranges = (
            $range_mut!(unsafe { <St as StoreAt<$C0, $I0>>::orchestrator_mut(&mut *base) }),
            $($range_mut!(unsafe { <St as StoreAt<$C, $I>>::orchestrator_mut(&mut *base) }),)*
        );
        let mut items = Vec::new();
        loop {
            let item = (
                match ranges.$idx0.next() {
                    Some(obj) => NonNull::from(obj),
                    None => break,
                },
                $(match ranges.$idx.next() {
                    Some(obj) => NonNull::from(obj),
                    None => break,
                },)*
            );
            items.push(item);
        }
        items
    }};
}

// The four traversals of the full-range family, per arity. The zipped
// traversals reject mixed storage layouts at monomorphization time.
macro_rules! impl_full_view_ops {
    ( ($C0:ident, $I0:ident, $idx0:tt) $(, ($C:ident, $I:ident, $idx:tt))* ) => {
        impl<$C0: Component $(, $C: Component)*> SchemeView<($C0, $($C,)*)> {
            /// Schedules one task that walks the zipped component ranges
            /// in storage order and applies `callback` to every aligned
            /// tuple.
            pub fn continuous<St, F, $I0 $(, $I)*>(
                counter: &WaitCounter,
                pool: &WorkerPool,
                store: &mut St,
                callback: F,
            ) where
                St: StoreAt<$C0, $I0> $(+ StoreAt<$C, $I>)*,
                F: FnMut(&mut $C0 $(, &mut $C)*) + Send,
            {
                const {
                    assert!(
                        uniform_layout(&[
                            <<St as StoreAt<$C0, $I0>>::Storage as Storage<$C0>>::LAYOUT,
                            $(<<St as StoreAt<$C, $I>>::Storage as Storage<$C>>::LAYOUT,)*
                        ]),
                        "use continuous_by when the scheme contains mixed layouts"
                    );
                }

                if <St as StoreAt<$C0, $I0>>::orchestrator(&*store).len() == 0 {
                    return;
                }

                lock_and_defer_unlock!(counter, store, ($C0, $I0) $(, ($C, $I))*);
                let items = collect_zip!(store, full_range_mut, ($C0, $I0, $idx0) $(, ($C, $I, $idx))*);

                counter.add(1);
                let items = Parcel(items);
                pool.scope(move |scope| {
                    scope.spawn(move |_| {
                        let items = items;
                        let mut callback = callback;
                        for item in items.0 {
                            callback(
                                unsafe { &mut *item.$idx0.as_ptr() }
                                $(, unsafe { &mut *item.$idx.as_ptr() })*
                            );
                        }
                        counter.done();
                    });
                });
            }

            /// Schedules one task that walks `By`'s range and resolves
            /// the peer tuple of each element by id. Tolerates mixed
            /// storage layouts.
            pub fn continuous_by<By, St, F, JBy, KBy, $I0 $(, $I)*>(
                counter: &WaitCounter,
                pool: &WorkerPool,
                store: &mut St,
                callback: F,
            ) where
                By: Component,
                Scheme<($C0, $($C,)*)>: SchemeIndexed<By, JBy>,
                St: StoreAt<By, KBy> + StoreAt<$C0, $I0> $(+ StoreAt<$C, $I>)* + Sync,
                F: FnMut(&mut $C0 $(, &mut $C)*) + Send,
            {
                if <St as StoreAt<$C0, $I0>>::orchestrator(&*store).len() == 0 {
                    return;
                }

                let ids = full_ids!(<St as StoreAt<By, KBy>>::orchestrator(&*store));
                lock_and_defer_unlock!(counter, store, ($C0, $I0) $(, ($C, $I))*);

                counter.add(1);
                let shared = SharedStore(&*store as *const St);
                pool.scope(move |scope| {
                    scope.spawn(move |_| {
                        let shared = shared;
                        let mut callback = callback;
                        let scheme = Scheme::<($C0, $($C,)*)>::new();
                        let store_ref = unsafe { &*shared.0 };
                        for id in ids {
                            if let Some(entity) = scheme.search(store_ref, id) {
                                callback(
                                    unsafe { &mut *entity.parts.$idx0.as_ptr() }
                                    $(, unsafe { &mut *entity.parts.$idx.as_ptr() })*
                                );
                            }
                        }
                        counter.done();
                    });
                });
            }

            /// Schedules one task per aligned tuple; processing order is
            /// unspecified.
            pub fn parallel<St, F, $I0 $(, $I)*>(
                counter: &WaitCounter,
                pool: &WorkerPool,
                store: &mut St,
                callback: F,
            ) where
                St: StoreAt<$C0, $I0> $(+ StoreAt<$C, $I>)*,
                F: Fn(&mut $C0 $(, &mut $C)*) + Send + Sync,
            {
                const {
                    assert!(
                        uniform_layout(&[
                            <<St as StoreAt<$C0, $I0>>::Storage as Storage<$C0>>::LAYOUT,
                            $(<<St as StoreAt<$C, $I>>::Storage as Storage<$C>>::LAYOUT,)*
                        ]),
                        "use parallel_by when the scheme contains mixed layouts"
                    );
                }

                if <St as StoreAt<$C0, $I0>>::orchestrator(&*store).len() == 0 {
                    return;
                }

                lock_and_defer_unlock!(counter, store, ($C0, $I0) $(, ($C, $I))*);
                let items = collect_zip!(store, full_range_mut, ($C0, $I0, $idx0) $(, ($C, $I, $idx))*);

                let callback_ref = &callback;
                let items = Parcel(items);
                pool.scope(move |scope| {
                    let items = items;
                    for item in items.0 {
                        counter.add(1);
                        let item = Parcel(item);
                        scope.spawn(move |_| {
                            let item = item;
                            let item = item.0;
                            callback_ref(
                                unsafe { &mut *item.$idx0.as_ptr() }
                                $(, unsafe { &mut *item.$idx.as_ptr() })*
                            );
                            counter.done();
                        });
                    }
                });
            }

            /// Schedules one task per element of `By`'s range, each
            /// resolving the peer tuple by id; processing order is
            /// unspecified. Tolerates mixed storage layouts.
            pub fn parallel_by<By, St, F, JBy, KBy, $I0 $(, $I)*>(
                counter: &WaitCounter,
                pool: &WorkerPool,
                store: &mut St,
                callback: F,
            ) where
                By: Component,
                Scheme<($C0, $($C,)*)>: SchemeIndexed<By, JBy>,
                St: StoreAt<By, KBy> + StoreAt<$C0, $I0> $(+ StoreAt<$C, $I>)* + Sync,
                F: Fn(&mut $C0 $(, &mut $C)*) + Send + Sync,
            {
                if <St as StoreAt<$C0, $I0>>::orchestrator(&*store).len() == 0 {
                    return;
                }

                let ids = full_ids!(<St as StoreAt<By, KBy>>::orchestrator(&*store));
                lock_and_defer_unlock!(counter, store, ($C0, $I0) $(, ($C, $I))*);

                let callback_ref = &callback;
                let shared = SharedStore(&*store as *const St);
                pool.scope(move |scope| {
                    for id in ids {
                        counter.add(1);
                        scope.spawn(move |_| {
                            let shared = shared;
                            let scheme = Scheme::<($C0, $($C,)*)>::new();
                            let store_ref = unsafe { &*shared.0 };
                            if let Some(entity) = scheme.search(store_ref, id) {
                                callback_ref(
                                    unsafe { &mut *entity.parts.$idx0.as_ptr() }
                                    $(, unsafe { &mut *entity.parts.$idx.as_ptr() })*
                                );
                            }
                            counter.done();
                        });
                    }
                });
            }
        }
    };
}

impl_full_view_ops!((A0, IA0, 0));
impl_full_view_ops!((A0, IA0, 0), (A1, IA1, 1));
impl_full_view_ops!((A0, IA0, 0), (A1, IA1, 1), (A2, IA2, 2));
impl_full_view_ops!((A0, IA0, 0), (A1, IA1, 1), (A2, IA2, 2), (A3, IA3, 3));

// The four traversals of a partition-restricted family, per arity. The
// zipped traversals require every storage to be partitioned; the `_by`
// traversals require it of the leading component and of `By`.
macro_rules! impl_partition_view_ops {
    ( $Family:ident, $lenfn:ident, $range_mut:ident, $ids:ident ;
      ($C0:ident, $I0:ident, $idx0:tt) $(, ($C:ident, $I:ident, $idx:tt))* ) => {
        impl<$C0: Component $(, $C: Component)*> $Family<($C0, $($C,)*)> {
            /// Schedules one task that walks this side's zipped component
            /// ranges in storage order and applies `callback` to every
            /// aligned tuple.
            pub fn continuous<St, F, $I0 $(, $I)*>(
                counter: &WaitCounter,
                pool: &WorkerPool,
                store: &mut St,
                callback: F,
            ) where
                St: StoreAt<$C0, $I0> $(+ StoreAt<$C, $I>)*,
                <St as StoreAt<$C0, $I0>>::Storage: PartitionedStorage<$C0>,
                $(<St as StoreAt<$C, $I>>::Storage: PartitionedStorage<$C>,)*
                F: FnMut(&mut $C0 $(, &mut $C)*) + Send,
            {
                if <St as StoreAt<$C0, $I0>>::orchestrator(&*store).$lenfn() == 0 {
                    return;
                }

                lock_and_defer_unlock!(counter, store, ($C0, $I0) $(, ($C, $I))*);
                let items = collect_zip!(store, $range_mut, ($C0, $I0, $idx0) $(, ($C, $I, $idx))*);

                counter.add(1);
                let items = Parcel(items);
                pool.scope(move |scope| {
                    scope.spawn(move |_| {
                        let items = items;
                        let mut callback = callback;
                        for item in items.0 {
                            callback(
                                unsafe { &mut *item.$idx0.as_ptr() }
                                $(, unsafe { &mut *item.$idx.as_ptr() })*
                            );
                        }
                        counter.done();
                    });
                });
            }

            /// Schedules one task that walks `By`'s range on this side
            /// and resolves the peer tuple of each element by id.
            pub fn continuous_by<By, St, F, JBy, KBy, $I0 $(, $I)*>(
                counter: &WaitCounter,
                pool: &WorkerPool,
                store: &mut St,
                callback: F,
            ) where
                By: Component,
                Scheme<($C0, $($C,)*)>: SchemeIndexed<By, JBy>,
                St: StoreAt<By, KBy> + StoreAt<$C0, $I0> $(+ StoreAt<$C, $I>)* + Sync,
                <St as StoreAt<By, KBy>>::Storage: PartitionedStorage<By>,
                <St as StoreAt<$C0, $I0>>::Storage: PartitionedStorage<$C0>,
                F: FnMut(&mut $C0 $(, &mut $C)*) + Send,
            {
                if <St as StoreAt<$C0, $I0>>::orchestrator(&*store).$lenfn() == 0 {
                    return;
                }

                let ids = $ids!(<St as StoreAt<By, KBy>>::orchestrator(&*store));
                lock_and_defer_unlock!(counter, store, ($C0, $I0) $(, ($C, $I))*);

                counter.add(1);
                let shared = SharedStore(&*store as *const St);
                pool.scope(move |scope| {
                    scope.spawn(move |_| {
                        let shared = shared;
                        let mut callback = callback;
                        let scheme = Scheme::<($C0, $($C,)*)>::new();
                        let store_ref = unsafe { &*shared.0 };
                        for id in ids {
                            if let Some(entity) = scheme.search(store_ref, id) {
                                callback(
                                    unsafe { &mut *entity.parts.$idx0.as_ptr() }
                                    $(, unsafe { &mut *entity.parts.$idx.as_ptr() })*
                                );
                            }
                        }
                        counter.done();
                    });
                });
            }

            /// Schedules one task per aligned tuple on this side;
            /// processing order is unspecified.
            pub fn parallel<St, F, $I0 $(, $I)*>(
                counter: &WaitCounter,
                pool: &WorkerPool,
                store: &mut St,
                callback: F,
            ) where
                St: StoreAt<$C0, $I0> $(+ StoreAt<$C, $I>)*,
                <St as StoreAt<$C0, $I0>>::Storage: PartitionedStorage<$C0>,
                $(<St as StoreAt<$C, $I>>::Storage: PartitionedStorage<$C>,)*
                F: Fn(&mut $C0 $(, &mut $C)*) + Send + Sync,
            {
                if <St as StoreAt<$C0, $I0>>::orchestrator(&*store).$lenfn() == 0 {
                    return;
                }

                lock_and_defer_unlock!(counter, store, ($C0, $I0) $(, ($C, $I))*);
                let items = collect_zip!(store, $range_mut, ($C0, $I0, $idx0) $(, ($C, $I, $idx))*);

                let callback_ref = &callback;
                let items = Parcel(items);
                pool.scope(move |scope| {
                    let items = items;
                    for item in items.0 {
                        counter.add(1);
                        let item = Parcel(item);
                        scope.spawn(move |_| {
                            let item = item;
                            let item = item.0;
                            callback_ref(
                                unsafe { &mut *item.$idx0.as_ptr() }
                                $(, unsafe { &mut *item.$idx.as_ptr() })*
                            );
                            counter.done();
                        });
                    }
                });
            }

            /// Schedules one task per element of `By`'s range on this
            /// side, each resolving the peer tuple by id; processing
            /// order is unspecified.
            pub fn parallel_by<By, St, F, JBy, KBy, $I0 $(, $I)*>(
                counter: &WaitCounter,
                pool: &WorkerPool,
                store: &mut St,
                callback: F,
            ) where
                By: Component,
                Scheme<($C0, $($C,)*)>: SchemeIndexed<By, JBy>,
                St: StoreAt<By, KBy> + StoreAt<$C0, $I0> $(+ StoreAt<$C, $I>)* + Sync,
                <St as StoreAt<By, KBy>>::Storage: PartitionedStorage<By>,
                <St as StoreAt<$C0, $I0>>::Storage: PartitionedStorage<$C0>,
                F: Fn(&mut $C0 $(, &mut $C)*) + Send + Sync,
            {
                if <St as StoreAt<$C0, $I0>>::orchestrator(&*store).$lenfn() == 0 {
                    return;
                }

                let ids = $ids!(<St as StoreAt<By, KBy>>::orchestrator(&*store));
                lock_and_defer_unlock!(counter, store, ($C0, $I0) $(, ($C, $I))*);

                let callback_ref = &callback;
                let shared = SharedStore(&*store as *const St);
                pool.scope(move |scope| {
                    for id in ids {
                        counter.add(1);
                        scope.spawn(move |_| {
                            let shared = shared;
                            let scheme = Scheme::<($C0, $($C,)*)>::new();
                            let store_ref = unsafe { &*shared.0 };
                            if let Some(entity) = scheme.search(store_ref, id) {
                                callback_ref(
                                    unsafe { &mut *entity.parts.$idx0.as_ptr() }
                                    $(, unsafe { &mut *entity.parts.$idx.as_ptr() })*
                                );
                            }
                            counter.done();
                        });
                    }
                });
            }
        }
    };
}

impl_partition_view_ops!(SchemeViewUntilPartition, len_until_partition, until_range_mut, until_ids; (A0, IA0, 0));
impl_partition_view_ops!(SchemeViewUntilPartition, len_until_partition, until_range_mut, until_ids; (A0, IA0, 0), (A1, IA1, 1));
impl_partition_view_ops!(SchemeViewUntilPartition, len_until_partition, until_range_mut, until_ids; (A0, IA0, 0), (A1, IA1, 1), (A2, IA2, 2));
impl_partition_view_ops!(SchemeViewUntilPartition, len_until_partition, until_range_mut, until_ids; (A0, IA0, 0), (A1, IA1, 1), (A2, IA2, 2), (A3, IA3, 3));
impl_partition_view_ops!(SchemeViewFromPartition, len_from_partition, from_range_mut, from_ids; (A0, IA0, 0));
impl_partition_view_ops!(SchemeViewFromPartition, len_from_partition, from_range_mut, from_ids; (A0, IA0, 0), (A1, IA1, 1));
impl_partition_view_ops!(SchemeViewFromPartition, len_from_partition, from_range_mut, from_ids; (A0, IA0, 0), (A1, IA1, 1), (A2, IA2, 2));
impl_partition_view_ops!(SchemeViewFromPartition, len_from_partition, from_range_mut, from_ids; (A0, IA0, 0), (A1, IA1, 1), (A2, IA2, 2), (A3, IA3, 3));
