//! Core types and traits for the fencepost workspace.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the fence layer and the sub-buffer allocator:
//! strongly-typed ids, recorded batch commands, error types, and the
//! [`GpuDevice`] / [`CompletionToken`] traits that stand in for a native
//! graphics backend.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod command;
pub mod error;
pub mod id;
pub mod traits;

pub use command::BatchCommand;
pub use error::{BatchError, DeviceError, FenceError};
pub use id::{BatchId, BufferId, NativeBatch};
pub use traits::{CompletionToken, GpuDevice};
