//! Regions and the coalescing free-list.

use std::fmt;

/// A contiguous extent `[offset, offset + len)` of the backing buffer, in
/// elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Region {
    /// First element.
    pub offset: u32,
    /// Number of elements.
    pub len: u32,
}

impl Region {
    /// Create a region.
    pub fn new(offset: u32, len: u32) -> Self {
        Self { offset, len }
    }

    /// One past the last element, widened so it cannot overflow.
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.len)
    }

    /// Whether the two regions share at least one element.
    pub fn overlaps(&self, other: &Region) -> bool {
        u64::from(self.offset) < other.end() && u64::from(other.offset) < self.end()
    }

    /// Byte offset of the region for elements of `element_size` bytes.
    pub fn byte_offset(&self, element_size: u32) -> u64 {
        u64::from(self.offset) * u64::from(element_size)
    }

    /// Byte length of the region for elements of `element_size` bytes.
    pub fn byte_len(&self, element_size: u32) -> u64 {
        u64::from(self.len) * u64::from(element_size)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.offset, self.end())
    }
}

/// Offset-ordered set of non-overlapping free regions.
///
/// Insertion merges eagerly with both neighbours, so no two entries are
/// ever adjacent. Allocation is first fit from the lowest offset.
#[derive(Clone, Debug, Default)]
pub struct FreeList {
    regions: Vec<Region>,
}

impl FreeList {
    /// Create an empty free-list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `region` to the list, merging with adjacent entries.
    ///
    /// Zero-length regions are ignored. The region must not overlap any
    /// entry already present.
    pub fn insert(&mut self, region: Region) {
        if region.len == 0 {
            return;
        }
        let idx = self.regions.partition_point(|r| r.offset < region.offset);
        debug_assert!(
            idx == 0 || !self.regions[idx - 1].overlaps(&region),
            "free region {region} overlaps its predecessor"
        );
        debug_assert!(
            idx == self.regions.len() || !self.regions[idx].overlaps(&region),
            "free region {region} overlaps its successor"
        );

        let merges_prev = idx > 0 && self.regions[idx - 1].end() == u64::from(region.offset);
        let merges_next = idx < self.regions.len() && region.end() == u64::from(self.regions[idx].offset);

        match (merges_prev, merges_next) {
            (true, true) => {
                let next = self.regions.remove(idx);
                self.regions[idx - 1].len += region.len + next.len;
            }
            (true, false) => self.regions[idx - 1].len += region.len,
            (false, true) => {
                let next = &mut self.regions[idx];
                next.offset = region.offset;
                next.len += region.len;
            }
            (false, false) => self.regions.insert(idx, region),
        }
    }

    /// Carve `len` elements from the lowest-offset region large enough,
    /// returning the carved region.
    pub fn take_first_fit(&mut self, len: u32) -> Option<Region> {
        let idx = self.regions.iter().position(|r| r.len >= len)?;
        let head = &mut self.regions[idx];
        let taken = Region::new(head.offset, len);
        head.offset += len;
        head.len -= len;
        if head.len == 0 {
            self.regions.remove(idx);
        }
        Some(taken)
    }

    /// Number of free regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether there are no free regions.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Total free elements.
    pub fn total_elements(&self) -> u64 {
        self.regions.iter().map(|r| u64::from(r.len)).sum()
    }

    /// Length of the largest free region.
    pub fn largest(&self) -> u32 {
        self.regions.iter().map(|r| r.len).max().unwrap_or(0)
    }

    /// Length of the free region ending exactly at `end`, or zero.
    ///
    /// With `end` set to the buffer size this is the tail a grow extends.
    pub fn tail_len(&self, end: u32) -> u32 {
        match self.regions.last() {
            Some(last) if last.end() == u64::from(end) => last.len,
            _ => 0,
        }
    }

    /// Iterate free regions in offset order.
    pub fn iter(&self) -> impl Iterator<Item = &Region> + '_ {
        self.regions.iter()
    }

    /// Whether entries are sorted, disjoint, and no two touch.
    pub fn is_coalesced(&self) -> bool {
        self.regions
            .windows(2)
            .all(|w| w[0].end() < u64::from(w[1].offset))
    }
}
