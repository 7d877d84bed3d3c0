//! Point-in-time allocator statistics.

/// Snapshot of a [`SubBufferAllocator`](crate::SubBufferAllocator)'s
/// bookkeeping, for overlays and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Current buffer size in elements.
    pub size_elements: u32,
    /// Current buffer size in bytes.
    pub size_bytes: u64,
    /// Elements handed out and not yet released.
    pub allocated_elements: u64,
    /// Number of live allocations.
    pub allocations: usize,
    /// Released regions still waiting on fences.
    pub pending_releases: usize,
    /// Elements held by pending releases.
    pub pending_elements: u64,
    /// Number of free-list entries.
    pub free_regions: usize,
    /// Elements in the free-list.
    pub free_elements: u64,
    /// Unsettled fences tracking use of the buffer.
    pub active_fences: usize,
    /// Unsettled fences tracking uploads into the buffer.
    pub upload_fences: usize,
    /// Whether a grow is requested or copying.
    pub resize_in_progress: bool,
    /// Replaced buffers not yet released.
    pub retired_buffers: usize,
}

impl AllocatorStats {
    /// Fraction of the buffer currently allocated, in `[0, 1]`.
    pub fn utilization(&self) -> f64 {
        if self.size_elements == 0 {
            0.0
        } else {
            self.allocated_elements as f64 / f64::from(self.size_elements)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utilization_of_empty_buffer_is_zero() {
        assert_eq!(AllocatorStats::default().utilization(), 0.0);
    }

    #[test]
    fn utilization_is_allocated_over_size() {
        let stats = AllocatorStats {
            size_elements: 16,
            allocated_elements: 4,
            ..AllocatorStats::default()
        };
        assert!((stats.utilization() - 0.25).abs() < f64::EPSILON);
    }
}
