//! The fence-synchronized sub-buffer allocator.

use std::sync::Arc;

use fencepost_core::{BatchError, BufferId};
use fencepost_sync::{CommandBatch, ExecutionContext, Fence};
use indexmap::IndexMap;

use crate::config::{align_up_u64, SubBufferConfig};
use crate::error::{ArenaError, Unavailable};
use crate::fence_set::{FenceSet, PendingReleases};
use crate::region::{FreeList, Region};
use crate::resize::{grow_target, Backing, GrowRequest, ResizeState, RetiredBuffer};
use crate::stats::AllocatorStats;

/// Carves variable-length regions out of one growable GPU buffer.
///
/// The allocator never hands out a region that GPU work may still read.
/// Callers report which batches use the buffer via
/// [`mark_used_by`](Self::mark_used_by); a released region is only reused
/// once every fence that was active at release time has settled.
///
/// When no free region fits a request, the allocator schedules a grow:
/// a larger buffer is created and the old contents are copied over by a
/// command batch. Offsets stay valid across grows. While the copy is in
/// flight, acquires fail with [`Unavailable::ResizeInProgress`] instead
/// of blocking.
///
/// All state is single-writer (`&mut self`). Fence completion is observed
/// by maintenance, which runs at the start of every acquire and release,
/// whenever a fence is attached, and on [`tick`](Self::tick).
///
/// Dropping the allocator releases its buffers immediately, without
/// waiting on any fence. Wait for the fences passed to the `mark_*`
/// methods, and tick until [`is_resizing`](Self::is_resizing) is false,
/// before dropping it.
#[derive(Debug)]
pub struct SubBufferAllocator {
    ctx: Arc<ExecutionContext>,
    config: SubBufferConfig,
    current: Option<Backing>,
    free: FreeList,
    /// offset → length of every live allocation.
    allocations: IndexMap<u32, u32>,
    allocated_elements: u64,
    pending: PendingReleases,
    active: FenceSet,
    uploads: FenceSet,
    resize: ResizeState,
    retired: Vec<RetiredBuffer>,
}

// Compile-time assertion: SubBufferAllocator must be Send.
const _: fn() = || {
    fn assert<T: Send>() {}
    assert::<SubBufferAllocator>();
};

impl SubBufferAllocator {
    /// Create an allocator and its initial buffer.
    ///
    /// If the device cannot create the initial buffer the failure is
    /// logged and the allocator starts empty; the first acquire retries.
    pub fn new(ctx: Arc<ExecutionContext>, config: SubBufferConfig) -> Result<Self, ArenaError> {
        config.validate()?;
        let initial = config.initial_aligned();
        let mut allocator = Self {
            ctx,
            config,
            current: None,
            free: FreeList::new(),
            allocations: IndexMap::new(),
            allocated_elements: 0,
            pending: PendingReleases::default(),
            active: FenceSet::default(),
            uploads: FenceSet::default(),
            resize: ResizeState::Idle,
            retired: Vec::new(),
        };
        if initial > 0 {
            allocator.resize = ResizeState::Requested { target: initial };
            allocator.maintain();
        }
        Ok(allocator)
    }

    // ── Allocation ──────────────────────────────────────────────

    /// Acquire a region of at least `elements` elements.
    ///
    /// The length is rounded up to the configured alignment. Fails with
    /// [`ArenaError::Unavailable`] when nothing fits right now; a grow is
    /// scheduled if the size cap allows one, otherwise the request waits
    /// on releases. Only a request longer than the cap itself fails with
    /// the permanent [`Unavailable::ExceedsMaximum`].
    pub fn acquire_region(&mut self, elements: u32) -> Result<Region, ArenaError> {
        if elements == 0 {
            tracing::error!("zero-length region requested");
            debug_assert!(false, "zero-length region requested");
            return Err(ArenaError::ZeroLengthRequest);
        }
        let max = self.config.max_aligned();
        let len = match self.config.align_up(elements) {
            Some(len) if len <= max => len,
            _ => {
                let needed = align_up_u64(u64::from(elements), self.config.effective_alignment());
                tracing::warn!(needed, max, label = %self.config.label, "request exceeds maximum buffer size");
                return Err(Unavailable::ExceedsMaximum { needed, max }.into());
            }
        };

        self.maintain();
        if self.resize.is_copying() {
            return Err(Unavailable::ResizeInProgress.into());
        }
        if let Some(region) = self.take(len) {
            return Ok(region);
        }

        self.request_grow(len)?;
        self.maintain();
        // A first buffer is created without a copy, so the grow may
        // already be complete.
        if self.resize.is_idle() {
            if let Some(region) = self.take(len) {
                return Ok(region);
            }
        }
        Err(Unavailable::GrowRequested { needed: len }.into())
    }

    /// Release the region starting at `offset`.
    ///
    /// If no tracked fence is active the region is free immediately.
    /// Otherwise it is deferred until every currently active fence is
    /// done or cancelled.
    pub fn release_region(&mut self, offset: u32) -> Result<(), ArenaError> {
        let Some(len) = self.allocations.swap_remove(&offset) else {
            tracing::error!(offset, "release of a region that is not allocated");
            debug_assert!(false, "release of a region that is not allocated: {offset}");
            return Err(ArenaError::UnknownRegion { offset });
        };
        self.allocated_elements -= u64::from(len);
        self.maintain();

        let region = Region::new(offset, len);
        if self.active.is_empty() {
            tracing::trace!(%region, "region released");
            self.free.insert(region);
        } else {
            tracing::trace!(%region, fences = self.active.len(), "region release deferred");
            self.pending.push(region, self.active.snapshot());
        }
        Ok(())
    }

    fn take(&mut self, len: u32) -> Option<Region> {
        let region = self.free.take_first_fit(len)?;
        self.allocations.insert(region.offset, region.len);
        self.allocated_elements += u64::from(region.len);
        tracing::trace!(%region, "region acquired");
        Some(region)
    }

    // ── Fence tracking ──────────────────────────────────────────

    /// Record that the work tracked by `fence` reads the buffer.
    ///
    /// Regions released while the fence is unsettled stay reserved until
    /// it settles. The fence may still be pending (its batch recording).
    pub fn mark_used_by(&mut self, fence: Fence) {
        self.active.insert(fence);
        self.maintain();
    }

    /// Record that the work tracked by `fence` uploads into the buffer.
    ///
    /// A grow never starts copying while an upload is unsettled, so the
    /// copy sees every byte written before it. Uploads recorded after a
    /// grow's copy was launched land in the old buffer and are lost; check
    /// [`is_resizing`](Self::is_resizing) before uploading.
    pub fn mark_uploaded_by(&mut self, fence: Fence) {
        self.uploads.insert(fence);
        self.maintain();
    }

    /// [`mark_used_by`](Self::mark_used_by) with the fence of a recording
    /// batch.
    pub fn mark_used_by_batch(&mut self, batch: &CommandBatch) {
        match batch.fence() {
            Some(fence) => self.mark_used_by(fence),
            None => Self::missing_batch_fence(batch),
        }
    }

    /// [`mark_uploaded_by`](Self::mark_uploaded_by) with the fence of a
    /// recording batch.
    pub fn mark_uploaded_by_batch(&mut self, batch: &CommandBatch) {
        match batch.fence() {
            Some(fence) => self.mark_uploaded_by(fence),
            None => Self::missing_batch_fence(batch),
        }
    }

    fn missing_batch_fence(batch: &CommandBatch) {
        tracing::error!(batch = %batch.id(), "batch has no registered fence");
        debug_assert!(false, "batch {} has no registered fence", batch.id());
    }

    /// Run maintenance without allocating.
    ///
    /// Call once per frame (or whenever fences may have completed) so
    /// deferred releases and grows make progress. Idempotent when nothing
    /// has completed since the last call.
    pub fn tick(&mut self) {
        self.maintain();
    }

    // ── Maintenance ─────────────────────────────────────────────

    fn maintain(&mut self) {
        self.active.prune();
        self.uploads.prune();

        if let ResizeState::Requested { target } = self.resize {
            if self.uploads.is_empty() {
                self.launch_grow(target);
            }
        }

        if self.resize.copy_settled() {
            self.finish_grow();
        }

        // Pending entries are folded back wholesale on promotion, so only
        // drain them individually while no grow is in flight.
        if self.resize.is_idle() {
            for region in self.pending.take_reclaimable() {
                tracing::trace!(%region, "deferred region reclaimed");
                self.free.insert(region);
            }
        }

        self.release_retired();
    }

    fn request_grow(&mut self, needed: u32) -> Result<(), ArenaError> {
        if !self.resize.is_idle() {
            return Ok(());
        }
        let current = self.size();
        let limit = self.config.max_aligned();
        let request = GrowRequest {
            current,
            tail: self.free.tail_len(current),
            needed,
        };
        match grow_target(
            request,
            self.config.initial_aligned(),
            self.config.growth_percent,
            self.config.effective_alignment(),
            limit,
        ) {
            Some(target) => {
                tracing::debug!(current, target, needed, label = %self.config.label, "grow requested");
                self.resize = ResizeState::Requested { target };
                Ok(())
            }
            None => {
                tracing::debug!(current, needed, max = limit, label = %self.config.label, "buffer at capacity");
                Err(Unavailable::AtCapacity { needed }.into())
            }
        }
    }

    fn launch_grow(&mut self, target: u32) {
        let device = Arc::clone(self.ctx.device());
        let current = self.size();
        let buffer = match device.create_buffer(self.config.bytes(target), &self.config.label) {
            Ok(buffer) => buffer,
            Err(e) => {
                tracing::error!(current, target, error = %e, "failed to create grown buffer, abandoning grow");
                self.resize = ResizeState::Idle;
                return;
            }
        };

        let Some(old) = self.current else {
            tracing::debug!(%buffer, size = target, label = %self.config.label, "buffer created");
            self.resize = ResizeState::Idle;
            self.promote(buffer, target);
            return;
        };

        match self.submit_copy(old, buffer) {
            Ok(fence) => {
                tracing::debug!(from = old.size, to = target, %buffer, "grow copy submitted");
                self.resize = ResizeState::Copying {
                    buffer,
                    size: target,
                    fence,
                };
            }
            Err(e) => {
                tracing::error!(current, target, error = %e, "failed to submit grow copy, abandoning grow");
                device.release_buffer(buffer);
                self.resize = ResizeState::Idle;
            }
        }
    }

    fn submit_copy(&self, old: Backing, new: BufferId) -> Result<Fence, BatchError> {
        let mut batch = self.ctx.acquire_batch()?;
        batch.copy_buffer(old.buffer, 0, new, 0, self.config.bytes(old.size));
        batch.submit()
    }

    fn finish_grow(&mut self) {
        match std::mem::replace(&mut self.resize, ResizeState::Idle) {
            ResizeState::Copying { buffer, size, fence } => {
                if fence.is_done() {
                    tracing::debug!(from = self.size(), to = size, %buffer, "grow complete");
                    self.promote(buffer, size);
                } else {
                    tracing::warn!(%buffer, "grow copy cancelled, abandoning grow");
                    self.ctx.device().release_buffer(buffer);
                }
            }
            other => self.resize = other,
        }
    }

    /// Make `buffer` current. The new tail becomes free, deferred
    /// releases are returned, and the old buffer is retired until every
    /// fence tracking it settles.
    fn promote(&mut self, buffer: BufferId, size: u32) {
        let old = self.current.replace(Backing { buffer, size });
        let old_size = old.map_or(0, |b| b.size);
        self.free.insert(Region::new(old_size, size - old_size));

        // In-flight readers of these regions read the old buffer, which
        // stays alive until they settle.
        for region in self.pending.take_all() {
            self.free.insert(region);
        }

        if let Some(old) = old {
            let mut fences = self.active.snapshot();
            fences.extend(self.uploads.snapshot());
            self.retired.push(RetiredBuffer {
                buffer: old.buffer,
                fences,
            });
        }
    }

    fn release_retired(&mut self) {
        let device = self.ctx.device();
        self.retired.retain(|retired| {
            if retired.is_releasable() {
                tracing::debug!(buffer = %retired.buffer, "retired buffer released");
                device.release_buffer(retired.buffer);
                false
            } else {
                true
            }
        });
    }

    // ── Inspection ──────────────────────────────────────────────

    /// The current backing buffer, if one exists.
    pub fn buffer(&self) -> Option<BufferId> {
        self.current.map(|b| b.buffer)
    }

    /// Current buffer size in elements.
    pub fn size(&self) -> u32 {
        self.current.map_or(0, |b| b.size)
    }

    /// The configuration this allocator was created with.
    pub fn config(&self) -> &SubBufferConfig {
        &self.config
    }

    /// The context grows are recorded on.
    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.ctx
    }

    /// The live allocation starting at `offset`.
    pub fn allocation(&self, offset: u32) -> Option<Region> {
        self.allocations
            .get(&offset)
            .map(|&len| Region::new(offset, len))
    }

    /// Every live allocation, in no particular order.
    pub fn allocations(&self) -> impl Iterator<Item = Region> + '_ {
        self.allocations
            .iter()
            .map(|(&offset, &len)| Region::new(offset, len))
    }

    /// Free-list entries in offset order.
    pub fn free_regions(&self) -> impl Iterator<Item = Region> + '_ {
        self.free.iter().copied()
    }

    /// Released regions still waiting on fences.
    pub fn pending_regions(&self) -> impl Iterator<Item = Region> + '_ {
        self.pending.regions()
    }

    /// Whether a grow is requested or its copy is in flight.
    pub fn is_resizing(&self) -> bool {
        !self.resize.is_idle()
    }

    /// Snapshot of the allocator's bookkeeping.
    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            size_elements: self.size(),
            size_bytes: self.config.bytes(self.size()),
            allocated_elements: self.allocated_elements,
            allocations: self.allocations.len(),
            pending_releases: self.pending.len(),
            pending_elements: self.pending.total_elements(),
            free_regions: self.free.len(),
            free_elements: self.free.total_elements(),
            active_fences: self.active.len(),
            upload_fences: self.uploads.len(),
            resize_in_progress: self.is_resizing(),
            retired_buffers: self.retired.len(),
        }
    }
}

impl Drop for SubBufferAllocator {
    // Tracked fences are not waited on; see the type docs.
    fn drop(&mut self) {
        let device = self.ctx.device();
        if let ResizeState::Copying { buffer, .. } = &self.resize {
            device.release_buffer(*buffer);
        }
        for retired in self.retired.drain(..) {
            device.release_buffer(retired.buffer);
        }
        if let Some(current) = self.current.take() {
            device.release_buffer(current.buffer);
        }
        tracing::debug!(label = %self.config.label, "sub-buffer allocator dropped");
    }
}
