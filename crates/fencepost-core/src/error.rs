//! Error types shared by the fence layer and the device boundary.
//!
//! Organized by subsystem: device (native resource creation and
//! submission), fence (completion tracking), and batch (the two combined
//! when a command batch is acquired or submitted).

use std::error::Error;
use std::fmt;

/// Failures reported by a [`GpuDevice`](crate::GpuDevice).
///
/// All variants are recoverable: callers log them and retry on a later
/// tick. None of them leave shared state half-modified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceError {
    /// The device could not allocate a buffer of the requested size.
    BufferCreationFailed {
        /// Requested size in bytes.
        size_bytes: u64,
        /// Device-provided diagnostic.
        reason: String,
    },
    /// No command batch could be opened.
    BatchUnavailable {
        /// Device-provided diagnostic.
        reason: String,
    },
    /// The batch was rejected by the execution engine.
    SubmitFailed {
        /// Device-provided diagnostic.
        reason: String,
    },
    /// The batch could not be cancelled cleanly.
    CancelFailed {
        /// Device-provided diagnostic.
        reason: String,
    },
    /// The device is gone; every later call will fail the same way.
    DeviceLost,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferCreationFailed { size_bytes, reason } => {
                write!(f, "failed to create {size_bytes}-byte buffer: {reason}")
            }
            Self::BatchUnavailable { reason } => write!(f, "no command batch available: {reason}"),
            Self::SubmitFailed { reason } => write!(f, "batch submission failed: {reason}"),
            Self::CancelFailed { reason } => write!(f, "batch cancellation failed: {reason}"),
            Self::DeviceLost => write!(f, "device lost"),
        }
    }
}

impl Error for DeviceError {}

/// Failures from fence creation and waiting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FenceError {
    /// The context's completion-primitive budget is used up.
    PrimitiveExhausted {
        /// Fences alive when creation was attempted.
        live: usize,
        /// Configured `max_live_fences`.
        limit: usize,
    },
    /// `wait` was asked to wait for any of zero fences, which can never
    /// be satisfied.
    NothingToWait,
    /// The wait deadline elapsed before the condition was met.
    Timeout {
        /// How long the caller waited, in milliseconds.
        waited_ms: u64,
    },
}

impl fmt::Display for FenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrimitiveExhausted { live, limit } => {
                write!(f, "fence primitives exhausted: {live} live, limit {limit}")
            }
            Self::NothingToWait => write!(f, "wait-any called with no fences"),
            Self::Timeout { waited_ms } => write!(f, "fence wait timed out after {waited_ms} ms"),
        }
    }
}

impl Error for FenceError {}

/// Failures from acquiring, submitting, or cancelling a command batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchError {
    /// The device refused the operation.
    Device(DeviceError),
    /// The batch's fence could not be created.
    Fence(FenceError),
    /// The batch has no registry entry; it was already finished elsewhere.
    Unregistered {
        /// The batch that was looked up.
        batch: crate::id::BatchId,
    },
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(e) => write!(f, "command batch device error: {e}"),
            Self::Fence(e) => write!(f, "command batch fence error: {e}"),
            Self::Unregistered { batch } => write!(f, "batch {batch} is not registered"),
        }
    }
}

impl Error for BatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Device(e) => Some(e),
            Self::Fence(e) => Some(e),
            Self::Unregistered { .. } => None,
        }
    }
}

impl From<DeviceError> for BatchError {
    fn from(e: DeviceError) -> Self {
        Self::Device(e)
    }
}

impl From<FenceError> for BatchError {
    fn from(e: FenceError) -> Self {
        Self::Fence(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_error_display() {
        let e = DeviceError::BufferCreationFailed {
            size_bytes: 4096,
            reason: "out of memory".into(),
        };
        assert_eq!(e.to_string(), "failed to create 4096-byte buffer: out of memory");
    }

    #[test]
    fn batch_error_exposes_source() {
        let e = BatchError::from(DeviceError::DeviceLost);
        assert!(e.source().is_some());
        assert_eq!(e.to_string(), "command batch device error: device lost");
    }

    #[test]
    fn fence_error_display() {
        let e = FenceError::PrimitiveExhausted { live: 4, limit: 4 };
        assert_eq!(e.to_string(), "fence primitives exhausted: 4 live, limit 4");
        assert_eq!(
            FenceError::Timeout { waited_ms: 12 }.to_string(),
            "fence wait timed out after 12 ms"
        );
    }
}
