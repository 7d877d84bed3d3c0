//! Allocator configuration parameters.

use crate::error::ArenaError;

/// Configuration for a [`SubBufferAllocator`](crate::SubBufferAllocator).
///
/// All sizes are in elements of `element_size` bytes. Validated at
/// construction; all values are immutable after creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubBufferConfig {
    /// Size of one element in bytes. Must be non-zero.
    pub element_size: u32,

    /// Elements allocated up front, rounded up to `alignment`.
    ///
    /// Zero defers creating the buffer until the first acquire.
    pub initial_elements: u32,

    /// Granularity of every region length and of the buffer size.
    ///
    /// Default: 4. Zero is treated as 1.
    pub alignment: u32,

    /// Upper bound on the buffer size. A single request longer than this
    /// fails with `Unavailable::ExceedsMaximum`; once the buffer stops
    /// growing at this size, requests that do not fit fail with
    /// `Unavailable::AtCapacity` until regions are released.
    ///
    /// Default: `u32::MAX`.
    pub max_elements: u32,

    /// Minimum growth factor applied on each grow, in percent of the
    /// current size.
    ///
    /// Default: 125. Must be at least 100.
    pub growth_percent: u32,

    /// Debug name passed to the device for every buffer.
    pub label: String,
}

impl SubBufferConfig {
    /// Default region alignment in elements.
    pub const DEFAULT_ALIGNMENT: u32 = 4;

    /// Default size cap.
    pub const DEFAULT_MAX_ELEMENTS: u32 = u32::MAX;

    /// Default growth factor: 5/4 of the current size.
    pub const DEFAULT_GROWTH_PERCENT: u32 = 125;

    /// Default buffer label.
    pub const DEFAULT_LABEL: &'static str = "sub-buffer";

    /// Create a config with default growth, cap and label.
    pub fn new(element_size: u32, initial_elements: u32, alignment: u32) -> Self {
        Self {
            element_size,
            initial_elements,
            alignment,
            max_elements: Self::DEFAULT_MAX_ELEMENTS,
            growth_percent: Self::DEFAULT_GROWTH_PERCENT,
            label: Self::DEFAULT_LABEL.to_owned(),
        }
    }

    /// Alignment with zero normalised to one.
    pub fn effective_alignment(&self) -> u32 {
        self.alignment.max(1)
    }

    /// Round `elements` up to the alignment. `None` on `u32` overflow.
    pub fn align_up(&self, elements: u32) -> Option<u32> {
        u32::try_from(align_up_u64(u64::from(elements), self.effective_alignment())).ok()
    }

    /// Largest aligned buffer size not exceeding `max_elements`.
    pub fn max_aligned(&self) -> u32 {
        let align = self.effective_alignment();
        self.max_elements / align * align
    }

    /// Initial size rounded to alignment and clamped to the cap.
    pub fn initial_aligned(&self) -> u32 {
        self.align_up(self.initial_elements)
            .map_or(self.max_aligned(), |n| n.min(self.max_aligned()))
    }

    /// Byte size of `elements` elements.
    pub fn bytes(&self, elements: u32) -> u64 {
        u64::from(elements) * u64::from(self.element_size)
    }

    /// Check structural invariants, reporting the first violation.
    pub fn validate(&self) -> Result<(), ArenaError> {
        let invalid = |reason: &str| {
            Err(ArenaError::InvalidConfig {
                reason: reason.to_owned(),
            })
        };
        if self.element_size == 0 {
            return invalid("element_size must be non-zero");
        }
        if self.growth_percent < 100 {
            return invalid("growth_percent must be at least 100");
        }
        if self.max_aligned() == 0 {
            return invalid("max_elements must hold at least one aligned region");
        }
        match self.align_up(self.initial_elements) {
            Some(initial) if initial <= self.max_aligned() => Ok(()),
            _ => invalid("initial_elements exceeds max_elements"),
        }
    }
}

pub(crate) fn align_up_u64(value: u64, align: u32) -> u64 {
    let align = u64::from(align.max(1));
    value.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_defaults() {
        let config = SubBufferConfig::new(4, 16, 4);
        assert_eq!(config.max_elements, u32::MAX);
        assert_eq!(config.growth_percent, 125);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_alignment_treated_as_one() {
        let config = SubBufferConfig::new(4, 7, 0);
        assert_eq!(config.effective_alignment(), 1);
        assert_eq!(config.align_up(7), Some(7));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn align_up_rounds_to_multiple() {
        let config = SubBufferConfig::new(4, 0, 4);
        assert_eq!(config.align_up(5), Some(8));
        assert_eq!(config.align_up(8), Some(8));
        assert_eq!(config.align_up(0), Some(0));
        assert_eq!(config.align_up(u32::MAX), None);
    }

    #[test]
    fn max_aligned_rounds_down() {
        let config = SubBufferConfig {
            max_elements: 30,
            ..SubBufferConfig::new(4, 0, 8)
        };
        assert_eq!(config.max_aligned(), 24);
    }

    #[test]
    fn invalid_configs_rejected() {
        let base = SubBufferConfig::new(4, 16, 4);
        let cases = [
            SubBufferConfig { element_size: 0, ..base.clone() },
            SubBufferConfig { growth_percent: 99, ..base.clone() },
            SubBufferConfig { max_elements: 3, ..base.clone() },
            SubBufferConfig { max_elements: 8, ..base.clone() },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(ArenaError::InvalidConfig { .. })),
                "{config:?} should be rejected"
            );
        }
    }

    #[test]
    fn bytes_multiplies_element_size() {
        let config = SubBufferConfig::new(12, 0, 1);
        assert_eq!(config.bytes(10), 120);
        assert_eq!(config.bytes(u32::MAX), u64::from(u32::MAX) * 12);
    }
}
