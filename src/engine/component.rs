//! Component base state and the lifecycle hook trait.
//!
//! Every component stored by this engine embeds a [`ComponentBase`]: the
//! entity identifier, the component's own [`TicketRef`], and the shared
//! per-entity peer directory attached when the entity is created through a
//! scheme. The [`Component`] trait exposes that base to the engine and
//! declares the optional lifecycle hooks.
//!
//! ## Hook dispatch
//!
//! The hooks are default-no-op trait methods. A component that cares about
//! a lifecycle event overrides the corresponding method; one that does not
//! pays nothing — the empty default inlines away under monomorphization.
//! This is the capability-trait rendition of compile-time hook detection:
//! presence is declared by overriding rather than probed by introspection.
//!
//! ## Relocation and tickets
//!
//! Rust moves are untyped copies, so a component cannot patch its own
//! ticket while being moved. Relocation only ever happens inside storages,
//! and every storage calls [`ComponentBase::refresh_ticket`] immediately
//! after moving an element, which keeps all cached [`TicketRef`]s resolving
//! to the component's current slot.

use std::ptr::NonNull;
use std::sync::Arc;

use crate::engine::components_map::ComponentsMap;
use crate::engine::ticket::{Ticket, TicketRef};
use crate::engine::types::EntityId;


/// Engine-owned state embedded in every component.
///
/// ## Invariants
/// - A component currently allocated through a storage holds `Some` ticket
///   whose cell points at the component's slot.
/// - A default-constructed (never allocated) component holds no ticket;
///   this stands in for the shared "invalid sentinel" and costs nothing.
#[derive(Debug)]
pub struct ComponentBase<T> {
    id: EntityId,
    ticket: Option<TicketRef<T>>,
    peers: Option<Arc<ComponentsMap>>,
}

// Manual impl: a derived one would demand `T: Default`, and user
// components embed `ComponentBase<Self>`.
impl<T> Default for ComponentBase<T> {
    fn default() -> Self {
        Self { id: 0, ticket: None, peers: None }
    }
}

impl<T> ComponentBase<T> {
    /// Returns the identifier of the entity this component belongs to.
    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Returns `true` if the component currently owns a ticket.
    #[inline]
    pub fn has_ticket(&self) -> bool {
        self.ticket.is_some()
    }

    /// Returns the component's ticket, if it was allocated through a storage.
    #[inline]
    pub fn ticket(&self) -> Option<&TicketRef<T>> {
        self.ticket.as_ref()
    }

    /// Returns the shared peer directory, if the entity was created through
    /// a scheme.
    #[inline]
    pub fn peers(&self) -> Option<&Arc<ComponentsMap>> {
        self.peers.as_ref()
    }

    #[inline]
    pub(crate) fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    /// Allocates a fresh ticket pointing at `this`.
    ///
    /// Called by storages when a slot is (re)initialized for a new
    /// component. Any previously held ticket is dropped, not invalidated:
    /// a slot being recreated was either never allocated or already
    /// invalidated by the pop path.
    #[inline]
    pub(crate) fn recreate_ticket(&mut self, this: NonNull<T>) {
        self.ticket = Some(Ticket::new(this));
    }

    /// Repoints the held ticket at `this` after the component moved slots.
    #[inline]
    pub(crate) fn refresh_ticket(&mut self, this: NonNull<T>) {
        debug_assert!(self.ticket.is_some(), "refreshing a component without a ticket");
        if let Some(ticket) = &self.ticket {
            ticket.repoint(this);
        }
    }

    /// Nulls the ticket cell and drops the component's own reference.
    ///
    /// Cached [`TicketRef`]s stay allocated and report `valid() == false`.
    #[inline]
    pub(crate) fn invalidate_ticket(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            ticket.invalidate();
        }
    }

    #[inline]
    pub(crate) fn attach_peers(&mut self, peers: Arc<ComponentsMap>) {
        self.peers = Some(peers);
    }
}

/// A user-defined component storable in the engine's pools.
///
/// Implementors embed a [`ComponentBase`] and surface it through
/// [`base`](Component::base) / [`base_mut`](Component::base_mut). All other
/// methods are optional lifecycle hooks with no-op defaults.
///
/// Components must be `Default` (storages default-construct slots before
/// running [`construct`](Component::construct)) and must not be
/// zero-sized.
///
/// ## Example
///
/// ```
/// use hive::engine::component::{Component, ComponentBase};
///
/// #[derive(Default)]
/// struct Client {
///     base: ComponentBase<Client>,
///     score: u32,
/// }
///
/// impl Component for Client {
///     type Args = u32;
///     type DestroyArgs = ();
///
///     fn base(&self) -> &ComponentBase<Self> { &self.base }
///     fn base_mut(&mut self) -> &mut ComponentBase<Self> { &mut self.base }
///
///     fn construct(&mut self, score: u32) {
///         self.score = score;
///     }
/// }
/// ```
pub trait Component: Default + Send + Sync + Sized + 'static {
    /// Arguments forwarded from `push`/`create` to
    /// [`construct`](Component::construct). Use `()` when none are needed.
    type Args;

    /// Arguments forwarded from a storage-level `pop` to
    /// [`destroy`](Component::destroy). Paths that carry no teardown data
    /// (orchestrator pops, scheme destroys, `clear`) pass the `Default`
    /// value. Use `()` when none are needed.
    type DestroyArgs: Default;

    /// Borrows the embedded engine state.
    fn base(&self) -> &ComponentBase<Self>;

    /// Mutably borrows the embedded engine state.
    fn base_mut(&mut self) -> &mut ComponentBase<Self>;

    /// Returns the identifier of the entity this component belongs to.
    #[inline]
    fn id(&self) -> EntityId {
        self.base().id()
    }

    /// Post-placement initialization, run after the slot is written and the
    /// ticket exists.
    #[inline]
    fn construct(&mut self, _args: Self::Args) {}

    /// Pre-release teardown, run before the ticket is invalidated.
    /// Receives the arguments the caller passed to the storage's `pop`.
    #[inline]
    fn destroy(&mut self, _args: Self::DestroyArgs) {}

    /// Entity-wide teardown, run on every peer — while all peers are still
    /// live — as part of a scheme-level destroy. `peers` resolves every
    /// component of the dying entity.
    #[inline]
    fn entity_destroy(&mut self, _peers: &ComponentsMap) {}

    /// Run once all peers of the entity exist and the shared peer
    /// directory has been attached to this component.
    #[inline]
    fn scheme_created(&mut self) {}

    /// Run whenever the component is (re)bound to a scheme: on allocation
    /// through a scheme and after every scheme-level move.
    #[inline]
    fn scheme_information(&mut self) {}
}
