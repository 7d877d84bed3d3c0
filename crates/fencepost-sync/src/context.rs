//! The execution context: device handle, fence budget and the registry
//! of batches still recording.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fencepost_core::{BatchError, BatchId, FenceError, GpuDevice};
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::batch::CommandBatch;
use crate::config::{ConfigError, ContextConfig};
use crate::fence::{Fence, FenceDomain};
use crate::wait::{self, WaitMode};

/// Owns everything shared between the batches and fences of one device.
///
/// Created once per device and shared via `Arc`. Every [`CommandBatch`]
/// keeps its context alive, and every [`Fence`] keeps the fence budget
/// alive, so fences may outlive the context itself.
///
/// The batch registry maps each recording batch to its fence. While a
/// batch records, the registry entry is the fence's only holder; submit
/// and cancel move that reference to the caller.
pub struct ExecutionContext {
    device: Arc<dyn GpuDevice>,
    config: ContextConfig,
    domain: Arc<FenceDomain>,
    recording: RwLock<IndexMap<BatchId, Fence>>,
    next_batch: AtomicU64,
}

// Compile-time assertion: ExecutionContext must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<ExecutionContext>();
};

impl ExecutionContext {
    /// Create a context for `device`, validating `config`.
    pub fn new(device: Arc<dyn GpuDevice>, config: ContextConfig) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;
        let domain = Arc::new(FenceDomain::new(
            config.max_live_fences,
            config.wait_poll_interval,
        ));
        Ok(Arc::new(Self {
            device,
            config,
            domain,
            recording: RwLock::new(IndexMap::new()),
            next_batch: AtomicU64::new(1),
        }))
    }

    /// Create a standalone pending fence with one holder.
    ///
    /// Fails with [`FenceError::PrimitiveExhausted`] once
    /// `max_live_fences` fences are alive.
    pub fn create_fence(&self) -> Result<Fence, FenceError> {
        Fence::create(&self.domain, None).inspect_err(|e| {
            tracing::error!(error = %e, "fence creation failed");
        })
    }

    /// Open a new batch for recording, with a freshly created fence
    /// registered under its id.
    pub fn acquire_batch(self: &Arc<Self>) -> Result<CommandBatch, BatchError> {
        let native = self.device.open_batch().inspect_err(|e| {
            tracing::error!(error = %e, "failed to open command batch");
        })?;
        let id = BatchId(self.next_batch.fetch_add(1, Ordering::Relaxed));

        let fence = match Fence::create(&self.domain, Some(id)) {
            Ok(fence) => fence,
            Err(e) => {
                tracing::error!(batch = %id, error = %e, "fence creation failed, discarding batch");
                if let Err(cancel) = self.device.cancel(native) {
                    tracing::warn!(batch = %id, error = %cancel, "could not discard native batch");
                }
                return Err(e.into());
            }
        };

        self.recording.write().insert(id, fence);
        tracing::trace!(batch = %id, "command batch acquired");
        Ok(CommandBatch::new(Arc::clone(self), id, native))
    }

    /// A new reference to the fence of a batch that is still recording.
    ///
    /// Returns `None` once the batch has been submitted or cancelled; the
    /// fence itself lives on with whoever took it.
    pub fn batch_fence(&self, batch: BatchId) -> Option<Fence> {
        self.recording.read().get(&batch).cloned()
    }

    /// Remove a batch's registry entry, handing its fence reference to the
    /// caller.
    pub(crate) fn take_fence(&self, batch: BatchId) -> Option<Fence> {
        self.recording.write().shift_remove(&batch)
    }

    /// Number of batches currently recording.
    pub fn recording_batches(&self) -> usize {
        self.recording.read().len()
    }

    /// Number of fences alive across this context, including fences that
    /// outlived their batch.
    pub fn live_fences(&self) -> usize {
        self.domain.live()
    }

    /// The device this context records for.
    pub fn device(&self) -> &Arc<dyn GpuDevice> {
        &self.device
    }

    /// The configuration this context was created with.
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Block until `fences` satisfy `mode`. See [`wait`](fn@crate::wait).
    pub fn wait(&self, fences: &[Fence], mode: WaitMode, timeout: Option<Duration>) -> Result<(), FenceError> {
        wait::wait(fences, mode, timeout)
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("config", &self.config)
            .field("recording_batches", &self.recording_batches())
            .field("live_fences", &self.live_fences())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fencepost_core::DeviceError;
    use fencepost_test_utils::MockDevice;

    fn context(device: &Arc<MockDevice>, max_live_fences: usize) -> Arc<ExecutionContext> {
        let config = ContextConfig {
            max_live_fences,
            ..ContextConfig::default()
        };
        ExecutionContext::new(device.clone(), config).unwrap()
    }

    #[test]
    fn invalid_config_rejected() {
        let device = Arc::new(MockDevice::new());
        let config = ContextConfig {
            max_live_fences: 0,
            ..ContextConfig::default()
        };
        assert_eq!(
            ExecutionContext::new(device, config).unwrap_err(),
            ConfigError::ZeroFenceBudget
        );
    }

    #[test]
    fn acquired_batch_is_registered_with_single_holder() {
        let device = Arc::new(MockDevice::new());
        let ctx = context(&device, 16);
        let batch = ctx.acquire_batch().unwrap();

        assert_eq!(ctx.recording_batches(), 1);
        assert_eq!(ctx.live_fences(), 1);
        {
            let fence = ctx.batch_fence(batch.id()).unwrap();
            // Registry entry plus this lookup.
            assert_eq!(fence.ref_count(), 2);
            assert_eq!(fence.batch(), Some(batch.id()));
        }
        let fence = batch.submit().unwrap();
        assert_eq!(fence.ref_count(), 1);
        assert_eq!(ctx.recording_batches(), 0);
    }

    #[test]
    fn batch_ids_are_unique() {
        let device = Arc::new(MockDevice::new());
        let ctx = context(&device, 16);
        let a = ctx.acquire_batch().unwrap();
        let b = ctx.acquire_batch().unwrap();
        assert_ne!(a.id(), b.id());
        a.cancel().unwrap();
        b.cancel().unwrap();
    }

    #[test]
    fn lookup_of_finished_batch_is_none() {
        let device = Arc::new(MockDevice::new());
        let ctx = context(&device, 16);
        let batch = ctx.acquire_batch().unwrap();
        let id = batch.id();
        let _fence = batch.cancel().unwrap();
        assert!(ctx.batch_fence(id).is_none());
    }

    #[test]
    fn fence_budget_limits_batches() {
        let device = Arc::new(MockDevice::new());
        let ctx = context(&device, 1);
        let held = ctx.create_fence().unwrap();

        let err = ctx.acquire_batch().unwrap_err();
        assert_eq!(
            err,
            BatchError::Fence(FenceError::PrimitiveExhausted { live: 1, limit: 1 })
        );
        assert_eq!(ctx.recording_batches(), 0);
        assert_eq!(device.cancelled_batches(), 1);

        drop(held);
        assert!(ctx.acquire_batch().is_ok());
    }

    #[test]
    fn open_failure_surfaces_device_error() {
        let device = Arc::new(MockDevice::new());
        let ctx = context(&device, 16);
        device.fail_next_opens(1);
        assert!(matches!(
            ctx.acquire_batch(),
            Err(BatchError::Device(DeviceError::BatchUnavailable { .. }))
        ));
        assert_eq!(ctx.live_fences(), 0);
        assert!(ctx.acquire_batch().is_ok());
    }

    #[test]
    fn fences_outlive_context() {
        let device = Arc::new(MockDevice::new());
        let ctx = context(&device, 16);
        let fence = ctx.acquire_batch().unwrap().submit().unwrap();
        drop(ctx);
        device.complete_all();
        assert!(fence.is_done());
    }
}
