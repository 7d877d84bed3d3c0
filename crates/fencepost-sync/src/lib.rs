//! Completion fences and command batches for asynchronous GPU work.
//!
//! A [`Fence`] represents the eventual completion of one batch of GPU
//! work. Fences are reference counted: cloning a fence adds a holder,
//! dropping one removes it, and the last drop fires every registered
//! destruction callback exactly once.
//!
//! # Architecture
//!
//! ```text
//! ExecutionContext (one per device, shared via Arc)
//! ├── Arc<dyn GpuDevice>           native buffers + batch execution
//! ├── FenceDomain                   live-fence accounting, wait interval
//! └── RwLock<IndexMap<BatchId, Fence>>
//!     └── one entry per batch still recording
//!
//! CommandBatch ──submit──▶ Fence (pending → submitted → done)
//!              ──cancel──▶ Fence (pending → cancelled)
//! ```
//!
//! The registry is the only shared mutable structure. Lookups take the
//! read lock; acquiring, submitting and cancelling a batch take the write
//! lock.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod batch;
pub mod config;
pub mod context;
pub mod fence;
pub mod wait;

pub use batch::CommandBatch;
pub use config::{ConfigError, ContextConfig};
pub use context::ExecutionContext;
pub use fence::{Fence, FenceStatus};
pub use wait::{wait, WaitMode};
