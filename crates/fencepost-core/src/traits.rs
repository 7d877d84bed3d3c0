//! The device boundary: buffer management and batch execution.
//!
//! Everything behind these traits is a native graphics backend and out of
//! scope for this workspace. Test code uses the mock devices in
//! `fencepost-test-utils`.

use std::time::{Duration, Instant};

use crate::command::BatchCommand;
use crate::error::DeviceError;
use crate::id::{BufferId, NativeBatch};

/// Device-side evidence that a submitted batch has finished executing.
///
/// Obtained from [`GpuDevice::submit`]. A token flips from incomplete to
/// complete exactly once and never back.
pub trait CompletionToken: Send + Sync {
    /// Whether the GPU has finished the work this token tracks.
    fn is_complete(&self) -> bool;

    /// Block the calling thread until the work completes or `timeout`
    /// elapses. Returns whether the work completed.
    ///
    /// The default implementation polls [`is_complete`](Self::is_complete)
    /// with a short sleep. Devices with a real blocking primitive should
    /// override it.
    fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_complete() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep((deadline - now).min(Duration::from_micros(200)));
        }
    }
}

/// A GPU device able to own buffers and execute recorded batches.
///
/// Shared between the fence layer and every allocator built on it, so all
/// methods take `&self`; implementations synchronize internally.
pub trait GpuDevice: Send + Sync {
    /// Create a buffer of `size_bytes` bytes.
    ///
    /// `label` is a debug name and carries no semantics.
    fn create_buffer(&self, size_bytes: u64, label: &str) -> Result<BufferId, DeviceError>;

    /// Destroy a buffer previously returned by
    /// [`create_buffer`](Self::create_buffer).
    ///
    /// Callers guarantee that no tracked GPU work still reads the buffer.
    fn release_buffer(&self, buffer: BufferId);

    /// Open a new batch for recording.
    fn open_batch(&self) -> Result<NativeBatch, DeviceError>;

    /// Hand a recorded batch to the execution engine.
    ///
    /// On success the returned token reports when the commands have
    /// executed. On failure the batch is consumed and nothing executes.
    fn submit(
        &self,
        batch: NativeBatch,
        commands: Vec<BatchCommand>,
    ) -> Result<Box<dyn CompletionToken>, DeviceError>;

    /// Abort a batch without executing any of it.
    fn cancel(&self, batch: NativeBatch) -> Result<(), DeviceError>;
}
