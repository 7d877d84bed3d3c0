//! Tracked fence sets and pending releases.

use fencepost_sync::Fence;
use smallvec::SmallVec;

use crate::region::Region;

/// Fence references captured at one point in time.
pub(crate) type FenceSnapshot = SmallVec<[Fence; 4]>;

/// Whether every fence in `fences` is done or cancelled.
pub(crate) fn all_settled(fences: &[Fence]) -> bool {
    fences.iter().all(Fence::is_settled)
}

/// A set of fences the allocator holds a reference to until they settle.
#[derive(Debug, Default)]
pub(crate) struct FenceSet {
    fences: Vec<Fence>,
}

impl FenceSet {
    /// Track `fence`. Adding a fence already in the set is a no-op.
    pub(crate) fn insert(&mut self, fence: Fence) {
        if !self.fences.iter().any(|f| Fence::ptr_eq(f, &fence)) {
            self.fences.push(fence);
        }
    }

    /// Drop every settled fence, releasing the set's reference.
    pub(crate) fn prune(&mut self) -> usize {
        let before = self.fences.len();
        self.fences.retain(|f| !f.is_settled());
        before - self.fences.len()
    }

    /// New references to every fence currently tracked.
    pub(crate) fn snapshot(&self) -> FenceSnapshot {
        self.fences.iter().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.fences.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }
}

/// A released region waiting for the work that may still read it.
#[derive(Debug)]
pub(crate) struct PendingRelease {
    pub(crate) region: Region,
    pub(crate) fences: FenceSnapshot,
}

/// Released regions in release order.
#[derive(Debug, Default)]
pub(crate) struct PendingReleases {
    entries: Vec<PendingRelease>,
}

impl PendingReleases {
    pub(crate) fn push(&mut self, region: Region, fences: FenceSnapshot) {
        self.entries.push(PendingRelease { region, fences });
    }

    /// Remove and return every entry whose fences have all settled.
    pub(crate) fn take_reclaimable(&mut self) -> Vec<Region> {
        let mut reclaimed = Vec::new();
        self.entries.retain(|entry| {
            if all_settled(&entry.fences) {
                reclaimed.push(entry.region);
                false
            } else {
                true
            }
        });
        reclaimed
    }

    /// Remove every entry regardless of fence state.
    pub(crate) fn take_all(&mut self) -> Vec<Region> {
        self.entries.drain(..).map(|entry| entry.region).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn total_elements(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.region.len)).sum()
    }

    pub(crate) fn regions(&self) -> impl Iterator<Item = Region> + '_ {
        self.entries.iter().map(|e| e.region)
    }
}
