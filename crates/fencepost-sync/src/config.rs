//! Execution context configuration and validation errors.

use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Configuration for an [`ExecutionContext`](crate::ExecutionContext).
///
/// Validated at construction; all values are immutable after creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextConfig {
    /// Maximum number of fences alive at once.
    ///
    /// Each fence owns one native completion primitive. Creation beyond
    /// this limit fails with `FenceError::PrimitiveExhausted`, the same
    /// way a native semaphore pool would. Default: 65_536. Must be >= 1.
    pub max_live_fences: usize,

    /// Sleep granularity of [`wait`](fn@crate::wait) while no completion
    /// token is available to block on.
    ///
    /// Default: 1 ms. Must be non-zero.
    pub wait_poll_interval: Duration,
}

impl ContextConfig {
    /// Default fence budget.
    pub const DEFAULT_MAX_LIVE_FENCES: usize = 65_536;

    /// Default wait polling interval.
    pub const DEFAULT_WAIT_POLL_INTERVAL: Duration = Duration::from_millis(1);

    /// Check structural invariants, reporting the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_live_fences == 0 {
            return Err(ConfigError::ZeroFenceBudget);
        }
        if self.wait_poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_live_fences: Self::DEFAULT_MAX_LIVE_FENCES,
            wait_poll_interval: Self::DEFAULT_WAIT_POLL_INTERVAL,
        }
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected by [`ContextConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `max_live_fences` is zero.
    ZeroFenceBudget,
    /// `wait_poll_interval` is zero.
    ZeroPollInterval,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroFenceBudget => write!(f, "max_live_fences must be at least 1"),
            Self::ZeroPollInterval => write!(f, "wait_poll_interval must be non-zero"),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(ContextConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_fence_budget_rejected() {
        let config = ContextConfig {
            max_live_fences: 0,
            ..ContextConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroFenceBudget));
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let config = ContextConfig {
            wait_poll_interval: Duration::ZERO,
            ..ContextConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroPollInterval));
    }
}
