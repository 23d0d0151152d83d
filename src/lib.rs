//! # hive
//!
//! Data-oriented entity/component pools with stable handles, partitioned
//! storages and parallel scheme views.
//!
//! ## Design goals
//! - Packed component storage: live elements stay contiguous, removal is
//!   swap-on-remove.
//! - Stable addressing through tickets: handles survive relocation and
//!   null out on destruction.
//! - Typed composition: a scheme binds one orchestrator per component
//!   type and manages whole entities across them.
//! - Safe concurrent iteration: views schedule serial or per-element
//!   work onto a rayon-backed worker pool and join it through a wait
//!   counter.
//!
//! ## A taste
//!
//! ```
//! use hive::prelude::*;
//!
//! #[derive(Default)]
//! struct Client {
//!     base: ComponentBase<Client>,
//!     score: u32,
//! }
//!
//! impl Component for Client {
//!     type Args = u32;
//!     type DestroyArgs = ();
//!     fn base(&self) -> &ComponentBase<Self> { &self.base }
//!     fn base_mut(&mut self) -> &mut ComponentBase<Self> { &mut self.base }
//!     fn construct(&mut self, score: u32) { self.score = score; }
//! }
//!
//! let mut orchestrator: Orchestrator<Client, GrowableStorage<Client, 64>> =
//!     Orchestrator::new();
//! let generator = IdGenerator::new();
//!
//! let id = generator.next();
//! orchestrator.push(id, 10);
//! assert!(orchestrator.get(id).is_some());
//! ```

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod engine;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use engine::component::{Component, ComponentBase};
pub use engine::components_map::ComponentsMap;
pub use engine::orchestrator::Orchestrator;
pub use engine::scheme::{EntityAt, EntityRef, Scheme, SchemeArgs, SchemeStore};
pub use engine::select::{Covers, SchemeIndexed, StoreAt};
pub use engine::storage::{
    ContinuousStorage, GrowableStorage, PartitionedGrowableStorage, PartitionedStaticStorage,
    PartitionedStorage, StaticGrowableStorage, StaticStorage, Storage, StorageGrow, StorageLayout,
};
pub use engine::sync::{worker_index, WaitCounter, WorkerPool};
pub use engine::tasks::{TaskManager, VariantTaskManager};
pub use engine::ticket::{Ticket, TicketRef};
pub use engine::tl_pool::ThreadLocalPool;
pub use engine::types::{type_hash, EntityId, IdGenerator};
pub use engine::view::{SchemeView, SchemeViewFromPartition, SchemeViewUntilPartition};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used engine types.
///
/// Import with:
/// ```rust
/// use hive::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Component, ComponentBase, ComponentsMap, EntityId, EntityRef, GrowableStorage,
        IdGenerator, Orchestrator, PartitionedGrowableStorage, PartitionedStaticStorage,
        PartitionedStorage, Scheme, SchemeStore, SchemeView, SchemeViewFromPartition,
        SchemeViewUntilPartition, StaticGrowableStorage, StaticStorage, Storage, StorageLayout,
        TaskManager, WaitCounter, WorkerPool,
    };
}
