//! Schemes: composing orchestrators into entities.
//!
//! A [`SchemeStore`] owns one orchestrator per registered component type,
//! held in a tuple. A [`Scheme`] is a *selector* over a subset of those
//! component types: it carries no data at all, only the type list. Every
//! scheme operation takes the store by reference, so moving a store never
//! invalidates a scheme and there is no rebinding step — the selector
//! cannot dangle.
//!
//! ## Entities
//!
//! An entity is one component per scheme type, all sharing an id.
//! [`Scheme::create`] pushes all peers, builds the shared
//! [`ComponentsMap`] directory and fires the `scheme_created` hooks;
//! [`Scheme::destroy`] fires `entity_destroy` on every peer while all are
//! still live, then pops each one. Scheme sizes stay aligned across
//! orchestrators only if entities are always created and destroyed
//! through the scheme.
//!
//! ## Duplicate component types
//!
//! A scheme list or store registering the same component type twice does
//! not compile: the type-indexed access of [`StoreAt`] /
//! [`SchemeIndexed`] becomes ambiguous. This is the structural-dedup
//! guarantee, enforced at the type level.

use std::any::TypeId;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::engine::component::Component;
use crate::engine::components_map::ComponentsMap;
use crate::engine::orchestrator::Orchestrator;
use crate::engine::select::{Covers, Index0, Index1, Index2, Index3, SchemeIndexed, StoreAt};
use crate::engine::storage::{PartitionedStorage, Storage};
use crate::engine::ticket::TicketRef;
use crate::engine::types::EntityId;


/// Owns one orchestrator per registered component type.
///
/// `O` is a tuple of [`Orchestrator`] types, one per component; stores of
/// one to four components are supported. Constructed empty.
pub struct SchemeStore<O> {
    orchestrators: O,
}

impl<O: Default> Default for SchemeStore<O> {
    fn default() -> Self {
        log::trace!("constructed store");
        Self { orchestrators: O::default() }
    }
}

impl<O: Default> SchemeStore<O> {
    /// Creates a store with empty orchestrators.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<O> SchemeStore<O> {
    /// Borrows the orchestrator registered for component `C`.
    ///
    /// The index parameter is inferred; call as `store.get::<C, _>()`.
    #[inline]
    pub fn get<C, I>(&self) -> &Orchestrator<C, <Self as StoreAt<C, I>>::Storage>
    where
        C: Component,
        Self: StoreAt<C, I>,
    {
        <Self as StoreAt<C, I>>::orchestrator(self)
    }

    /// Mutably borrows the orchestrator registered for component `C`.
    #[inline]
    pub fn get_mut<C, I>(&mut self) -> &mut Orchestrator<C, <Self as StoreAt<C, I>>::Storage>
    where
        C: Component,
        Self: StoreAt<C, I>,
    {
        <Self as StoreAt<C, I>>::orchestrator_mut(self)
    }
}

/// Constructor arguments for one component of a scheme operation,
/// together with the partition side for partitioned targets.
///
/// Built with [`Scheme::args`] (continuous targets, side defaults to
/// `false` and is ignored) or [`Scheme::args_in`] (partitioned targets).
pub struct SchemeArgs<T: Component> {
    pub(crate) args: T::Args,
    pub(crate) predicate: bool,
}

/// A typed selection of component types inside a scheme store.
///
/// Zero-sized: schemes are freely copyable and never hold store state.
pub struct Scheme<L> {
    _components: PhantomData<L>,
}

impl<L> Clone for Scheme<L> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<L> Copy for Scheme<L> {}

impl<L> Default for Scheme<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L> Scheme<L> {
    /// Creates the selector for component list `L`.
    pub const fn new() -> Self {
        Self { _components: PhantomData }
    }

    /// Packs constructor arguments for a component behind a continuous
    /// storage.
    pub fn args<T, I>(&self, args: T::Args) -> SchemeArgs<T>
    where
        T: Component,
        Self: SchemeIndexed<T, I>,
    {
        SchemeArgs { args, predicate: false }
    }

    /// Packs constructor arguments plus the partition side for a
    /// component behind a partitioned storage.
    pub fn args_in<T, I>(&self, predicate: bool, args: T::Args) -> SchemeArgs<T>
    where
        T: Component,
        Self: SchemeIndexed<T, I>,
    {
        SchemeArgs { args, predicate }
    }

    /// Compile-time membership check: fails to compile unless `T` is one
    /// of the scheme's components.
    pub fn require<T, I>(&self)
    where
        T: Component,
        Self: SchemeIndexed<T, I>,
    {
    }

    /// Pushes a single component of the scheme, without peers.
    ///
    /// The component is indexed under `id` and receives the
    /// `scheme_information` hook; no peer directory is attached.
    pub fn alloc<T, IT, St, ISt>(
        &self,
        store: &mut St,
        id: EntityId,
        args: SchemeArgs<T>,
    ) -> NonNull<T>
    where
        T: Component,
        Self: SchemeIndexed<T, IT>,
        St: StoreAt<T, ISt>,
    {
        let mut ptr =
            <St as StoreAt<T, ISt>>::orchestrator_mut(store).spawn(args.predicate, id, args.args);
        unsafe { ptr.as_mut().scheme_information() };
        ptr
    }

    /// Produces the scheme selecting the union of `self` and `other`.
    ///
    /// The union list is named explicitly at the call site; the `Covers`
    /// bounds verify at compile time that it contains every component of
    /// both inputs.
    pub fn overlap<L2, LU, IA, IB>(self, _other: Scheme<L2>) -> Scheme<LU>
    where
        Scheme<LU>: Covers<L, IA> + Covers<L2, IB>,
    {
        Scheme::new()
    }
}

/// The components of one entity, as returned by [`Scheme::create`] and
/// [`Scheme::search`]: a tuple of component addresses sharing an id.
#[derive(Debug)]
pub struct EntityRef<P> {
    pub(crate) parts: P,
}

impl<P: Copy> Clone for EntityRef<P> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<P: Copy> Copy for EntityRef<P> {}

/// Position-indexed access to one component of an [`EntityRef`].
pub trait EntityAt<T: Component, I> {
    /// Returns the address of the entity's `T` component.
    fn part(&self) -> NonNull<T>;
}

impl<P> EntityRef<P> {
    /// Returns the address of the entity's `T` component.
    #[inline]
    pub fn get<T, I>(&self) -> NonNull<T>
    where
        T: Component,
        Self: EntityAt<T, I>,
    {
        self.part()
    }
}

// Per-position store access. One implementation per (arity, position);
// a store whose tuple repeats a component type leaves the index parameter
// ambiguous, which is exactly the rejection we want.
macro_rules! impl_store_at {
    ([$($C:ident $S:ident),+], $TC:ident, $TS:ident, $I:ty, $idx:tt) => {
        impl<$($C: Component, $S: Storage<$C>),+> StoreAt<$TC, $I>
            for SchemeStore<($(Orchestrator<$C, $S>,)+)>
        {
            type Storage = $TS;

            #[inline]
            fn orchestrator(&self) -> &Orchestrator<$TC, $TS> {
                &self.orchestrators.$idx
            }

            #[inline]
            fn orchestrator_mut(&mut self) -> &mut Orchestrator<$TC, $TS> {
                &mut self.orchestrators.$idx
            }
        }
    };
}

impl_store_at!([A0 S0], A0, S0, Index0, 0);
impl_store_at!([A0 S0, A1 S1], A0, S0, Index0, 0);
impl_store_at!([A0 S0, A1 S1], A1, S1, Index1, 1);
impl_store_at!([A0 S0, A1 S1, A2 S2], A0, S0, Index0, 0);
impl_store_at!([A0 S0, A1 S1, A2 S2], A1, S1, Index1, 1);
impl_store_at!([A0 S0, A1 S1, A2 S2], A2, S2, Index2, 2);
impl_store_at!([A0 S0, A1 S1, A2 S2, A3 S3], A0, S0, Index0, 0);
impl_store_at!([A0 S0, A1 S1, A2 S2, A3 S3], A1, S1, Index1, 1);
impl_store_at!([A0 S0, A1 S1, A2 S2, A3 S3], A2, S2, Index2, 2);
impl_store_at!([A0 S0, A1 S1, A2 S2, A3 S3], A3, S3, Index3, 3);

// The all-components scheme of a store.
macro_rules! impl_store_scheme {
    ($(($C:ident, $S:ident)),+) => {
        impl<$($C: Component, $S: Storage<$C>),+> SchemeStore<($(Orchestrator<$C, $S>,)+)> {
            /// Returns the scheme selecting every component registered in
            /// this store.
            pub fn scheme(&self) -> Scheme<($($C,)+)> {
                Scheme::new()
            }
        }
    };
}

impl_store_scheme!((A0, S0));
impl_store_scheme!((A0, S0), (A1, S1));
impl_store_scheme!((A0, S0), (A1, S1), (A2, S2));
impl_store_scheme!((A0, S0), (A1, S1), (A2, S2), (A3, S3));

// Scheme membership markers.
macro_rules! impl_scheme_indexed {
    ([$($C:ident),+], $T:ident, $I:ty) => {
        impl<$($C: Component),+> SchemeIndexed<$T, $I> for Scheme<($($C,)+)> {}
    };
}

impl_scheme_indexed!([A0], A0, Index0);
impl_scheme_indexed!([A0, A1], A0, Index0);
impl_scheme_indexed!([A0, A1], A1, Index1);
impl_scheme_indexed!([A0, A1, A2], A0, Index0);
impl_scheme_indexed!([A0, A1, A2], A1, Index1);
impl_scheme_indexed!([A0, A1, A2], A2, Index2);
impl_scheme_indexed!([A0, A1, A2, A3], A0, Index0);
impl_scheme_indexed!([A0, A1, A2, A3], A1, Index1);
impl_scheme_indexed!([A0, A1, A2, A3], A2, Index2);
impl_scheme_indexed!([A0, A1, A2, A3], A3, Index3);

// Entity tuple position access.
macro_rules! impl_entity_at {
    ([$($C:ident),+], $T:ident, $I:ty, $idx:tt) => {
        impl<$($C: Component),+> EntityAt<$T, $I> for EntityRef<($(NonNull<$C>,)+)> {
            #[inline]
            fn part(&self) -> NonNull<$T> {
                self.parts.$idx
            }
        }
    };
}

impl_entity_at!([A0], A0, Index0, 0);
impl_entity_at!([A0, A1], A0, Index0, 0);
impl_entity_at!([A0, A1], A1, Index1, 1);
impl_entity_at!([A0, A1, A2], A0, Index0, 0);
impl_entity_at!([A0, A1, A2], A1, Index1, 1);
impl_entity_at!([A0, A1, A2], A2, Index2, 2);
impl_entity_at!([A0, A1, A2, A3], A0, Index0, 0);
impl_entity_at!([A0, A1, A2, A3], A1, Index1, 1);
impl_entity_at!([A0, A1, A2, A3], A2, Index2, 2);
impl_entity_at!([A0, A1, A2, A3], A3, Index3, 3);

// Coverage witnesses for overlap.
macro_rules! impl_covers {
    ( ($C0:ident, $I0:ident) $(, ($C:ident, $I:ident))* ) => {
        impl<LU, $C0: Component $(, $C: Component)*, $I0 $(, $I)*>
            Covers<($C0, $($C,)*), ($I0, $($I,)*)> for Scheme<LU>
        where
            Scheme<LU>: SchemeIndexed<$C0, $I0> $(+ SchemeIndexed<$C, $I>)*,
        {
        }
    };
}

impl_covers!((B0, J0));
impl_covers!((B0, J0), (B1, J1));
impl_covers!((B0, J0), (B1, J1), (B2, J2));
impl_covers!((B0, J0), (B1, J1), (B2, J2), (B3, J3));

// The per-arity entity lifecycle operations.
macro_rules! impl_scheme_ops {
    ( ($C0:ident, $I0:ident, $idx0:tt) $(, ($C:ident, $I:ident, $idx:tt))* ) => {
        impl<$C0: Component $(, $C: Component)*> Scheme<($C0, $($C,)*)> {
            /// Creates one entity: pushes every peer under `id`, attaches
            /// the shared peer directory and fires the `scheme_created`
            /// hooks.
            pub fn create<St, $I0 $(, $I)*>(
                &self,
                store: &mut St,
                id: EntityId,
                args: (SchemeArgs<$C0>, $(SchemeArgs<$C>,)*),
            ) -> EntityRef<(NonNull<$C0>, $(NonNull<$C>,)*)>
            where
                St: StoreAt<$C0, $I0> $(+ StoreAt<$C, $I>)*,
            {
                log::trace!("scheme create");

                let parts = (
                    {
                        let scheme_args = args.$idx0;
                        let mut ptr = <St as StoreAt<$C0, $I0>>::orchestrator_mut(store)
                            .spawn(scheme_args.predicate, id, scheme_args.args);
                        unsafe { ptr.as_mut().scheme_information() };
                        ptr
                    },
                    $({
                        let scheme_args = args.$idx;
                        let mut ptr = <St as StoreAt<$C, $I>>::orchestrator_mut(store)
                            .spawn(scheme_args.predicate, id, scheme_args.args);
                        unsafe { ptr.as_mut().scheme_information() };
                        ptr
                    },)*
                );

                let mut peers = ComponentsMap::new();
                peers.push::<$C0>(
                    unsafe { parts.$idx0.as_ref() }
                        .base()
                        .ticket()
                        .cloned()
                        .expect("freshly spawned component has a ticket"),
                );
                $(
                    peers.push::<$C>(
                        unsafe { parts.$idx.as_ref() }
                            .base()
                            .ticket()
                            .cloned()
                            .expect("freshly spawned component has a ticket"),
                    );
                )*
                let peers = Arc::new(peers);

                unsafe {
                    let mut ptr = parts.$idx0;
                    ptr.as_mut().base_mut().attach_peers(Arc::clone(&peers));
                    $(
                        let mut ptr = parts.$idx;
                        ptr.as_mut().base_mut().attach_peers(Arc::clone(&peers));
                    )*
                }

                unsafe {
                    let mut ptr = parts.$idx0;
                    ptr.as_mut().scheme_created();
                    $(
                        let mut ptr = parts.$idx;
                        ptr.as_mut().scheme_created();
                    )*
                }

                EntityRef { parts }
            }

            /// Destroys an entity: fires `entity_destroy` on every peer
            /// while all are still live, then pops each one.
            pub fn destroy<St, $I0 $(, $I)*>(
                &self,
                store: &mut St,
                entity: EntityRef<(NonNull<$C0>, $(NonNull<$C>,)*)>,
            )
            where
                St: StoreAt<$C0, $I0> $(+ StoreAt<$C, $I>)*,
            {
                log::trace!("scheme destroy");

                let mut peers = ComponentsMap::new();
                if let Some(ticket) = unsafe { entity.parts.$idx0.as_ref() }.base().ticket() {
                    peers.push::<$C0>(ticket.clone());
                }
                $(
                    if let Some(ticket) = unsafe { entity.parts.$idx.as_ref() }.base().ticket() {
                        peers.push::<$C>(ticket.clone());
                    }
                )*

                unsafe {
                    let mut ptr = entity.parts.$idx0;
                    ptr.as_mut().entity_destroy(&peers);
                    $(
                        let mut ptr = entity.parts.$idx;
                        ptr.as_mut().entity_destroy(&peers);
                    )*
                }

                <St as StoreAt<$C0, $I0>>::orchestrator_mut(store).pop(entity.parts.$idx0);
                $(
                    <St as StoreAt<$C, $I>>::orchestrator_mut(store).pop(entity.parts.$idx);
                )*
            }

            /// Destroys the entity a single component belongs to,
            /// resolving the remaining peers through the component's
            /// stored directory.
            ///
            /// ## Panics
            /// Panics if the component was not created through
            /// [`create`](Self::create) or a peer is missing from its
            /// directory.
            pub fn destroy_one<T, IT, St, $I0 $(, $I)*>(&self, store: &mut St, obj: NonNull<T>)
            where
                T: Component,
                Self: SchemeIndexed<T, IT>,
                St: StoreAt<$C0, $I0> $(+ StoreAt<$C, $I>)*,
            {
                let entity = {
                    let peers = unsafe { obj.as_ref() }
                        .base()
                        .peers()
                        .expect("component was not created through a scheme");
                    EntityRef {
                        parts: (
                            peers
                                .get::<$C0>()
                                .expect("peer component missing from the entity directory"),
                            $(
                                peers
                                    .get::<$C>()
                                    .expect("peer component missing from the entity directory"),
                            )*
                        ),
                    }
                };
                self.destroy(store, entity);
            }

            /// Moves an entity into another store of the same shape,
            /// peer by peer, then fires `scheme_information` on every
            /// moved component. Returns the new entity tuple.
            pub fn transfer<St, $I0 $(, $I)*>(
                &self,
                from: &mut St,
                to: &mut St,
                entity: EntityRef<(NonNull<$C0>, $(NonNull<$C>,)*)>,
            ) -> EntityRef<(NonNull<$C0>, $(NonNull<$C>,)*)>
            where
                St: StoreAt<$C0, $I0> $(+ StoreAt<$C, $I>)*,
            {
                log::trace!("scheme move");

                let parts = (
                    <St as StoreAt<$C0, $I0>>::orchestrator_mut(from)
                        .transfer_matching(
                            <St as StoreAt<$C0, $I0>>::orchestrator_mut(to),
                            entity.parts.$idx0,
                        ),
                    $(
                        <St as StoreAt<$C, $I>>::orchestrator_mut(from)
                            .transfer_matching(
                                <St as StoreAt<$C, $I>>::orchestrator_mut(to),
                                entity.parts.$idx,
                            ),
                    )*
                );

                unsafe {
                    let mut ptr = parts.$idx0;
                    ptr.as_mut().scheme_information();
                    $(
                        let mut ptr = parts.$idx;
                        ptr.as_mut().scheme_information();
                    )*
                }

                EntityRef { parts }
            }

            /// Moves every peer of an entity to the other partition side.
            /// Only available when every orchestrator of the scheme is
            /// partitioned.
            pub fn change_partition<St, $I0 $(, $I)*>(
                &self,
                store: &mut St,
                predicate: bool,
                entity: EntityRef<(NonNull<$C0>, $(NonNull<$C>,)*)>,
            ) -> EntityRef<(NonNull<$C0>, $(NonNull<$C>,)*)>
            where
                St: StoreAt<$C0, $I0> $(+ StoreAt<$C, $I>)*,
                <St as StoreAt<$C0, $I0>>::Storage: PartitionedStorage<$C0>,
                $(<St as StoreAt<$C, $I>>::Storage: PartitionedStorage<$C>,)*
            {
                EntityRef {
                    parts: (
                        <St as StoreAt<$C0, $I0>>::orchestrator_mut(store)
                            .change_partition(predicate, entity.parts.$idx0),
                        $(
                            <St as StoreAt<$C, $I>>::orchestrator_mut(store)
                                .change_partition(predicate, entity.parts.$idx),
                        )*
                    ),
                }
            }

            /// Builds the entity tuple for `id`, or `None` if any
            /// orchestrator does not know the id.
            pub fn search<St, $I0 $(, $I)*>(
                &self,
                store: &St,
                id: EntityId,
            ) -> Option<EntityRef<(NonNull<$C0>, $(NonNull<$C>,)*)>>
            where
                St: StoreAt<$C0, $I0> $(+ StoreAt<$C, $I>)*,
            {
                Some(EntityRef {
                    parts: (
                        <St as StoreAt<$C0, $I0>>::orchestrator(store).get(id)?,
                        $(<St as StoreAt<$C, $I>>::orchestrator(store).get(id)?,)*
                    ),
                })
            }

            /// Number of entities, delegated to the first orchestrator.
            ///
            /// Meaningful only while entities are created and destroyed
            /// exclusively through the scheme, which keeps all
            /// orchestrator sizes aligned.
            pub fn len<St, $I0 $(, $I)*>(&self, store: &St) -> usize
            where
                St: StoreAt<$C0, $I0> $(+ StoreAt<$C, $I>)*,
            {
                <St as StoreAt<$C0, $I0>>::orchestrator(store).len()
            }

            /// Number of entities on the "true" side, delegated to the
            /// first orchestrator.
            pub fn len_until_partition<St, $I0 $(, $I)*>(&self, store: &St) -> usize
            where
                St: StoreAt<$C0, $I0> $(+ StoreAt<$C, $I>)*,
                <St as StoreAt<$C0, $I0>>::Storage: PartitionedStorage<$C0>,
            {
                <St as StoreAt<$C0, $I0>>::orchestrator(store).len_until_partition()
            }

            /// Number of entities on the "false" side, delegated to the
            /// first orchestrator.
            pub fn len_from_partition<St, $I0 $(, $I)*>(&self, store: &St) -> usize
            where
                St: StoreAt<$C0, $I0> $(+ StoreAt<$C, $I>)*,
                <St as StoreAt<$C0, $I0>>::Storage: PartitionedStorage<$C0>,
            {
                <St as StoreAt<$C0, $I0>>::orchestrator(store).len_from_partition()
            }

            /// Clears every orchestrator of the scheme.
            pub fn clear<St, $I0 $(, $I)*>(&self, store: &mut St)
            where
                St: StoreAt<$C0, $I0> $(+ StoreAt<$C, $I>)*,
            {
                <St as StoreAt<$C0, $I0>>::orchestrator_mut(store).clear();
                $(
                    <St as StoreAt<$C, $I>>::orchestrator_mut(store).clear();
                )*
            }

            /// Runtime membership test over the scheme's component list.
            pub fn has<Q: 'static>(&self) -> bool {
                TypeId::of::<Q>() == TypeId::of::<$C0>()
                    $(|| TypeId::of::<Q>() == TypeId::of::<$C>())*
            }
        }

        impl<$C0: Component $(, $C: Component)*> EntityRef<(NonNull<$C0>, $(NonNull<$C>,)*)> {
            /// The shared id of the entity's components.
            #[inline]
            pub fn id(&self) -> EntityId {
                unsafe { self.parts.$idx0.as_ref() }.id()
            }

            /// Clones every peer's ticket, for caching across
            /// relocations.
            pub fn tickets(&self) -> (TicketRef<$C0>, $(TicketRef<$C>,)*) {
                (
                    unsafe { self.parts.$idx0.as_ref() }
                        .base()
                        .ticket()
                        .cloned()
                        .expect("live component has a ticket"),
                    $(
                        unsafe { self.parts.$idx.as_ref() }
                            .base()
                            .ticket()
                            .cloned()
                            .expect("live component has a ticket"),
                    )*
                )
            }
        }
    };
}

impl_scheme_ops!((A0, IA0, 0));
impl_scheme_ops!((A0, IA0, 0), (A1, IA1, 1));
impl_scheme_ops!((A0, IA0, 0), (A1, IA1, 1), (A2, IA2, 2));
impl_scheme_ops!((A0, IA0, 0), (A1, IA1, 1), (A2, IA2, 2), (A3, IA3, 3));
