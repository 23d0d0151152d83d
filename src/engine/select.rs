//! Type-indexed access into heterogeneous orchestrator tuples.
//!
//! Scheme stores hold one orchestrator per component type in a plain
//! tuple. To address "the orchestrator for component `C`" generically,
//! every position of a store tuple implements [`StoreAt`] under a unique
//! marker index type. Because a trait bound `StoreAt<C, I>` with an
//! inferred `I` only resolves when exactly one position holds `C`, a
//! store (or a scheme list) mentioning the same component type twice
//! fails to compile with an ambiguity error — the engine's guarantee that
//! a scheme never aliases one orchestrator twice is enforced entirely at
//! the type level.

use crate::engine::component::Component;
use crate::engine::orchestrator::Orchestrator;
use crate::engine::storage::Storage;


/// Marker for tuple position 0.
#[derive(Debug, Clone, Copy)]
pub struct Index0;
/// Marker for tuple position 1.
#[derive(Debug, Clone, Copy)]
pub struct Index1;
/// Marker for tuple position 2.
#[derive(Debug, Clone, Copy)]
pub struct Index2;
/// Marker for tuple position 3.
#[derive(Debug, Clone, Copy)]
pub struct Index3;

/// Access to the orchestrator for component `C` at store position `I`.
///
/// Implemented by scheme stores for every component they register. User
/// code leaves `I` to inference; it exists so that two positions holding
/// distinct component types produce non-overlapping implementations.
pub trait StoreAt<C: Component, I> {
    /// Storage variant registered for `C`.
    type Storage: Storage<C>;

    /// Borrows the orchestrator for `C`.
    fn orchestrator(&self) -> &Orchestrator<C, Self::Storage>;

    /// Mutably borrows the orchestrator for `C`.
    fn orchestrator_mut(&mut self) -> &mut Orchestrator<C, Self::Storage>;
}

/// Membership marker: component `T` appears in scheme list `L` at
/// position `I`.
///
/// Like [`StoreAt`], the index parameter makes implementations for
/// distinct positions coherent; an ambiguous `I` at a use site means the
/// list mentions `T` twice.
pub trait SchemeIndexed<T, I> {}

/// Coverage witness used by scheme overlap: every component of list `L`
/// is a member of `Self`. `Is` carries the inferred position indices.
pub trait Covers<L, Is> {}
