//! Fencepost: fence-synchronized sub-allocation of growable GPU buffers.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all fencepost sub-crates. For most users, adding `fencepost` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use fencepost::prelude::*;
//! use fencepost_test_utils::MockDevice;
//!
//! let device = Arc::new(MockDevice::new());
//! let ctx = ExecutionContext::new(device.clone(), ContextConfig::default()).unwrap();
//! let mut vertices =
//!     SubBufferAllocator::new(Arc::clone(&ctx), SubBufferConfig::new(16, 1024, 4)).unwrap();
//!
//! // Upload a chunk into a fresh region.
//! let region = vertices.acquire_region(100).unwrap();
//! let mut upload = ctx.acquire_batch().unwrap();
//! upload.write_buffer(vertices.buffer().unwrap(), region.byte_offset(16), vec![0u8; 1600]);
//! vertices.mark_uploaded_by_batch(&upload);
//! let uploaded = upload.submit().unwrap();
//!
//! // Draw with it, then release it while the draw is in flight.
//! let draw = ctx.acquire_batch().unwrap();
//! vertices.mark_used_by_batch(&draw);
//! let drawn = draw.submit().unwrap();
//! vertices.release_region(region.offset).unwrap();
//! assert_eq!(vertices.stats().pending_releases, 1);
//!
//! // Once the GPU finishes, the region is reusable.
//! device.complete_all();
//! wait(&[uploaded, drawn], WaitMode::All, None).unwrap();
//! vertices.tick();
//! assert_eq!(vertices.stats().pending_releases, 0);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `fencepost-core` | IDs, batch commands, errors, device traits |
//! | [`sync`] | `fencepost-sync` | Fences, command batches, execution context |
//! | [`arena`] | `fencepost-arena` | The sub-buffer allocator |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`fencepost-core`).
///
/// Implement [`types::GpuDevice`] and [`types::CompletionToken`] to plug in
/// a graphics backend.
pub use fencepost_core as types;

/// Fences and command batches (`fencepost-sync`).
pub use fencepost_sync as sync;

/// The fence-synchronized sub-buffer allocator (`fencepost-arena`).
pub use fencepost_arena as arena;

/// Common imports for typical fencepost usage.
///
/// ```rust
/// use fencepost::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use fencepost_core::{BatchId, BufferId, CompletionToken, GpuDevice};

    // Errors
    pub use fencepost_core::{BatchError, DeviceError, FenceError};
    pub use fencepost_arena::{ArenaError, Unavailable};

    // Fences and batches
    pub use fencepost_sync::{
        wait, CommandBatch, ContextConfig, ExecutionContext, Fence, FenceStatus, WaitMode,
    };

    // Allocator
    pub use fencepost_arena::{AllocatorStats, Region, SubBufferAllocator, SubBufferConfig};
}
