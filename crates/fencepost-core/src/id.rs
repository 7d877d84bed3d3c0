//! Strongly-typed identifiers for batches and device buffers.

use std::fmt;

/// Identifies a command batch within one execution context.
///
/// Assigned sequentially by the context when a batch is acquired and
/// used as the key of the context's batch→fence registry. Ids are never
/// reused within a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(pub u64);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for BatchId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Device-side handle of a GPU buffer.
///
/// Produced by [`GpuDevice::create_buffer`](crate::GpuDevice::create_buffer)
/// and only meaningful to the device that created it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer#{}", self.0)
    }
}

impl From<u64> for BufferId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Device-side handle of an open (recording) command batch.
///
/// Returned by [`GpuDevice::open_batch`](crate::GpuDevice::open_batch) and
/// consumed by exactly one `submit` or `cancel` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeBatch(pub u64);

impl fmt::Display for NativeBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "native#{}", self.0)
    }
}
