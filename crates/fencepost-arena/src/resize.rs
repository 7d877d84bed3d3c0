//! Backing-store state: the current buffer, an in-flight grow, and old
//! buffers waiting to be released.

use fencepost_core::BufferId;
use fencepost_sync::Fence;

use crate::fence_set::{all_settled, FenceSnapshot};

/// The buffer regions are carved from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Backing {
    pub(crate) buffer: BufferId,
    pub(crate) size: u32,
}

/// Grow state machine.
///
/// ```text
/// Idle ──request──▶ Requested ──launch──▶ Copying ──copy done──▶ Idle (promoted)
///                       │                    └──copy cancelled──▶ Idle (abandoned)
///                       └──creation failed──▶ Idle (abandoned)
/// ```
#[derive(Debug)]
pub(crate) enum ResizeState {
    Idle,
    /// Waiting for upload fences to drain before the copy can start.
    Requested { target: u32 },
    /// Copy of `[0, old size)` into `buffer` submitted under `fence`.
    Copying {
        buffer: BufferId,
        size: u32,
        fence: Fence,
    },
}

impl ResizeState {
    pub(crate) fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub(crate) fn is_copying(&self) -> bool {
        matches!(self, Self::Copying { .. })
    }

    /// Whether the copy has settled (done or cancelled).
    pub(crate) fn copy_settled(&self) -> bool {
        match self {
            Self::Copying { fence, .. } => fence.is_settled(),
            _ => false,
        }
    }
}

/// A replaced buffer kept alive until all work that may read it settles.
#[derive(Debug)]
pub(crate) struct RetiredBuffer {
    pub(crate) buffer: BufferId,
    pub(crate) fences: FenceSnapshot,
}

impl RetiredBuffer {
    pub(crate) fn is_releasable(&self) -> bool {
        all_settled(&self.fences)
    }
}

/// Sizing inputs for a grow, all in elements.
#[derive(Clone, Copy, Debug)]
pub(crate) struct GrowRequest {
    /// Current buffer size.
    pub(crate) current: u32,
    /// Free elements ending at `current`, which the grow extends.
    pub(crate) tail: u32,
    /// Aligned length that did not fit.
    pub(crate) needed: u32,
}

/// Size of the next buffer: the configured growth factor over `current`,
/// at least `current + needed`, at least the initial size, rounded up to
/// `align` and capped at `limit`.
///
/// `limit` must be aligned. Returns `None` when even a buffer of `limit`
/// elements cannot fit the request after the free tail, i.e. when
/// `current - tail + needed` exceeds `limit`.
pub(crate) fn grow_target(
    request: GrowRequest,
    initial: u32,
    growth_percent: u32,
    align: u32,
    limit: u32,
) -> Option<u32> {
    let GrowRequest { current, tail, needed } = request;
    let minimum = u64::from(current) - u64::from(tail.min(current)) + u64::from(needed);
    if minimum > u64::from(limit) {
        return None;
    }
    let required = u64::from(current) + u64::from(needed);
    let grown = u64::from(current) * u64::from(growth_percent) / 100;
    let target = crate::config::align_up_u64(grown.max(required).max(u64::from(initial)), align)
        .min(u64::from(limit));
    u32::try_from(target).ok()
}
