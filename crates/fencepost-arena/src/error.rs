//! Allocator error types.

use std::error::Error;
use std::fmt;

/// Why a region request cannot be satisfied right now.
///
/// Every variant except [`ExceedsMaximum`](Unavailable::ExceedsMaximum)
/// is transient: keep calling [`tick`](crate::SubBufferAllocator::tick)
/// (or retrying the acquire) and the request will eventually succeed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Unavailable {
    /// A grow copy is in flight; allocation resumes once it completes.
    ResizeInProgress,
    /// No free region was large enough. A grow has been requested (or was
    /// already pending) and will be launched by maintenance.
    GrowRequested {
        /// Aligned element count that did not fit.
        needed: u32,
    },
    /// The buffer is at `max_elements` (or cannot grow far enough) and
    /// no free region fits. Releasing regions makes room.
    AtCapacity {
        /// Aligned element count that did not fit.
        needed: u32,
    },
    /// The request is larger than the biggest buffer `max_elements`
    /// allows, so it can never be satisfied.
    ExceedsMaximum {
        /// Aligned length of the request in elements.
        needed: u64,
        /// Largest permitted buffer size in elements.
        max: u32,
    },
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResizeInProgress => write!(f, "resize in progress"),
            Self::GrowRequested { needed } => {
                write!(f, "no free region of {needed} elements, grow requested")
            }
            Self::AtCapacity { needed } => {
                write!(f, "no free region of {needed} elements and the buffer is at capacity")
            }
            Self::ExceedsMaximum { needed, max } => {
                write!(f, "request of {needed} elements exceeds maximum of {max}")
            }
        }
    }
}

/// Errors that can occur during allocator operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// `acquire_region(0)` was called.
    ZeroLengthRequest,
    /// `release_region` was called with an offset that is not currently
    /// allocated (never acquired, or already released).
    UnknownRegion {
        /// The offending element offset.
        offset: u32,
    },
    /// The request cannot be satisfied now; see [`Unavailable`].
    Unavailable {
        /// Why the request failed.
        reason: Unavailable,
    },
    /// The allocator configuration failed validation.
    InvalidConfig {
        /// Human-readable description of the violated constraint.
        reason: String,
    },
}

impl ArenaError {
    /// Whether retrying after maintenance can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unavailable {
                reason: Unavailable::ResizeInProgress
                    | Unavailable::GrowRequested { .. }
                    | Unavailable::AtCapacity { .. }
            }
        )
    }
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroLengthRequest => write!(f, "zero-length region requested"),
            Self::UnknownRegion { offset } => {
                write!(f, "no allocated region at offset {offset}")
            }
            Self::Unavailable { reason } => write!(f, "region unavailable: {reason}"),
            Self::InvalidConfig { reason } => write!(f, "invalid allocator config: {reason}"),
        }
    }
}

impl Error for ArenaError {}

impl From<Unavailable> for ArenaError {
    fn from(reason: Unavailable) -> Self {
        Self::Unavailable { reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_reason() {
        let e = ArenaError::from(Unavailable::GrowRequested { needed: 12 });
        assert_eq!(
            e.to_string(),
            "region unavailable: no free region of 12 elements, grow requested"
        );
    }

    #[test]
    fn transient_classification() {
        assert!(ArenaError::from(Unavailable::ResizeInProgress).is_transient());
        assert!(ArenaError::from(Unavailable::GrowRequested { needed: 4 }).is_transient());
        assert!(ArenaError::from(Unavailable::AtCapacity { needed: 4 }).is_transient());
        assert!(!ArenaError::from(Unavailable::ExceedsMaximum { needed: 10, max: 8 }).is_transient());
        assert!(!ArenaError::ZeroLengthRequest.is_transient());
    }
}
