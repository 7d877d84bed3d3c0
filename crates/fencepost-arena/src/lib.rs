//! Fence-synchronized sub-allocation of a growable GPU buffer.
//!
//! Many small, variable-length records (mesh chunks, instance data) share
//! one large device buffer. The GPU may still be reading a region after
//! the CPU has released it, so reuse is gated on the completion fences of
//! the work that used the buffer.
//!
//! # Architecture
//!
//! ```text
//! SubBufferAllocator
//! ├── Backing (current BufferId + size in elements)
//! ├── FreeList (offset-ordered, eagerly coalesced)
//! ├── allocations: IndexMap<offset, len>
//! ├── PendingReleases (region + fence snapshot, per release)
//! ├── FenceSet × 2 (active readers, uploads)
//! ├── ResizeState (Idle → Requested → Copying)
//! └── RetiredBuffer[] (replaced buffers awaiting their readers)
//! ```
//!
//! # Region lifecycle
//!
//! acquire → allocated → release → pending (while fences outstanding) →
//! free (merged with neighbours) → reused.
//!
//! Growth copies `[0, old size)` into a larger buffer through a command
//! batch, then appends the new tail to the free-list. Offsets handed out
//! before a grow remain valid after it.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod allocator;
pub mod config;
pub mod error;
mod fence_set;
pub mod region;
mod resize;
pub mod stats;

// Public re-exports for the primary API surface.
pub use allocator::SubBufferAllocator;
pub use config::SubBufferConfig;
pub use error::{ArenaError, Unavailable};
pub use region::{FreeList, Region};
pub use stats::AllocatorStats;
