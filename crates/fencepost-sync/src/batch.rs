//! Command batches: recorded GPU work bound to exactly one fence.

use std::fmt;
use std::sync::Arc;

use fencepost_core::{BatchCommand, BatchError, BatchId, BufferId, NativeBatch};

use crate::context::ExecutionContext;
use crate::fence::Fence;

/// A batch of GPU commands in the recording state.
///
/// Obtained from [`ExecutionContext::acquire_batch`]. The batch ends in
/// exactly one of two ways: [`submit`](Self::submit) hands the commands to
/// the device and returns the fence, [`cancel`](Self::cancel) discards
/// them and returns the fence marked cancelled. Dropping a batch that is
/// still recording cancels it.
pub struct CommandBatch {
    ctx: Arc<ExecutionContext>,
    id: BatchId,
    native: Option<NativeBatch>,
    commands: Vec<BatchCommand>,
}

impl CommandBatch {
    pub(crate) fn new(ctx: Arc<ExecutionContext>, id: BatchId, native: NativeBatch) -> Self {
        Self {
            ctx,
            id,
            native: Some(native),
            commands: Vec::new(),
        }
    }

    /// This batch's id.
    pub fn id(&self) -> BatchId {
        self.id
    }

    /// The context this batch records for.
    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.ctx
    }

    /// A new reference to this batch's fence.
    ///
    /// Holders may track the fence before the batch is submitted; it stays
    /// pending until then.
    pub fn fence(&self) -> Option<Fence> {
        self.ctx.batch_fence(self.id)
    }

    /// Record an arbitrary command.
    pub fn record(&mut self, command: BatchCommand) -> &mut Self {
        self.commands.push(command);
        self
    }

    /// Record an upload of `data` into `dst` at byte `offset`.
    pub fn write_buffer(&mut self, dst: BufferId, offset: u64, data: impl Into<Vec<u8>>) -> &mut Self {
        self.record(BatchCommand::WriteBuffer {
            dst,
            offset,
            data: data.into(),
        })
    }

    /// Record a copy of `size` bytes between two buffers.
    pub fn copy_buffer(
        &mut self,
        src: BufferId,
        src_offset: u64,
        dst: BufferId,
        dst_offset: u64,
        size: u64,
    ) -> &mut Self {
        self.record(BatchCommand::CopyBuffer {
            src,
            src_offset,
            dst,
            dst_offset,
            size,
        })
    }

    /// Commands recorded so far.
    pub fn commands(&self) -> &[BatchCommand] {
        &self.commands
    }

    /// Number of recorded commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Hand the recorded work to the device.
    ///
    /// On success the caller receives the batch's fence, which becomes
    /// done once the device finishes. If the device rejects the batch the
    /// fence is still marked submitted but carries no completion token, so
    /// any other holder sees it as never done.
    pub fn submit(mut self) -> Result<Fence, BatchError> {
        let (native, fence) = self.finish()?;
        let commands = std::mem::take(&mut self.commands);
        let count = commands.len();

        match self.ctx.device().submit(native, commands) {
            Ok(token) => {
                fence.mark_submitted(Some(token));
                tracing::trace!(batch = %self.id, commands = count, "command batch submitted");
                Ok(fence)
            }
            Err(e) => {
                tracing::error!(batch = %self.id, error = %e, "command batch submission failed");
                fence.mark_submitted(None);
                Err(e.into())
            }
        }
    }

    /// Submit and drop the caller's fence reference.
    ///
    /// Returns whether the device accepted the batch. Other holders of the
    /// fence (for example an allocator that marked its regions used by
    /// this batch) keep tracking it.
    pub fn submit_detached(self) -> bool {
        self.submit().is_ok()
    }

    /// Abort the batch without executing any of it.
    ///
    /// The fence is marked cancelled before the device is told, so it is
    /// cancelled even when the device reports a failure.
    pub fn cancel(mut self) -> Result<Fence, BatchError> {
        let (native, fence) = self.finish()?;
        fence.mark_cancelled();
        tracing::trace!(batch = %self.id, "command batch cancelled");
        match self.ctx.device().cancel(native) {
            Ok(()) => Ok(fence),
            Err(e) => {
                tracing::warn!(batch = %self.id, error = %e, "device failed to cancel batch");
                Err(e.into())
            }
        }
    }

    /// Leave the recording state: take the native handle and the
    /// registry's fence reference.
    fn finish(&mut self) -> Result<(NativeBatch, Fence), BatchError> {
        let unregistered = BatchError::Unregistered { batch: self.id };
        let native = self.native.take().ok_or_else(|| unregistered.clone())?;
        match self.ctx.take_fence(self.id) {
            Some(fence) => Ok((native, fence)),
            None => {
                tracing::error!(batch = %self.id, "recording batch has no registered fence");
                debug_assert!(false, "recording batch has no registered fence");
                if let Err(e) = self.ctx.device().cancel(native) {
                    tracing::warn!(batch = %self.id, error = %e, "device failed to cancel batch");
                }
                Err(unregistered)
            }
        }
    }
}

impl Drop for CommandBatch {
    fn drop(&mut self) {
        if self.native.is_none() {
            return;
        }
        tracing::warn!(
            batch = %self.id,
            commands = self.commands.len(),
            "command batch dropped while recording, cancelling"
        );
        if let Ok((native, fence)) = self.finish() {
            fence.mark_cancelled();
            if let Err(e) = self.ctx.device().cancel(native) {
                tracing::warn!(batch = %self.id, error = %e, "device failed to cancel batch");
            }
        }
    }
}

impl fmt::Debug for CommandBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBatch")
            .field("id", &self.id)
            .field("native", &self.native)
            .field("commands", &self.commands.len())
            .finish_non_exhaustive()
    }
}
