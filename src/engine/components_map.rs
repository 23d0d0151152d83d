//! Per-entity component directory.
//!
//! When an entity is created through a scheme, every peer component gets a
//! shared [`ComponentsMap`]: a dictionary from a component's
//! [`type_hash`] to a thunk resolving the peer's *current* address through
//! its captured ticket. Components reach their siblings by type without
//! knowing the scheme that created them.
//!
//! ## Ownership
//!
//! The map holds strong ticket references, and every peer holds a strong
//! reference to the map. This is not an ownership cycle: tickets own only
//! a pointer cell, never the component — components are owned by their
//! storages. The map must never be given ownership of component values.

use std::collections::HashMap;
use std::ptr::NonNull;

use crate::engine::component::Component;
use crate::engine::ticket::TicketRef;
use crate::engine::types::type_hash;


type PeerThunk = Box<dyn Fn() -> *mut u8 + Send + Sync>;

/// Dictionary from component type hash to a current-pointer thunk.
///
/// ## Invariants
/// - Holds one entry per component of the entity's scheme at creation
///   time; later [`push`](ComponentsMap::push) calls may add more.
/// - Lookups for unknown types, or for peers whose ticket has been
///   invalidated, return `None`.
#[derive(Default)]
pub struct ComponentsMap {
    components: HashMap<u32, PeerThunk>,
}

impl ComponentsMap {
    /// Creates an empty directory.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a peer of type `T` through its ticket.
    pub fn push<T: Component>(&mut self, ticket: TicketRef<T>) {
        self.components.insert(
            type_hash::<T>(),
            Box::new(move || match ticket.try_get() {
                Some(ptr) => ptr.as_ptr().cast(),
                None => std::ptr::null_mut(),
            }),
        );
    }

    /// Resolves the current address of the peer of type `T`.
    ///
    /// Returns `None` for unknown types and for peers that have been
    /// destroyed since registration.
    pub fn get<T: Component>(&self) -> Option<NonNull<T>> {
        let thunk = self.components.get(&type_hash::<T>())?;
        NonNull::new(thunk().cast::<T>())
    }

    /// Returns the number of registered peers.
    #[inline]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if no peers are registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl std::fmt::Debug for ComponentsMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentsMap")
            .field("components", &self.components.len())
            .finish()
    }
}
