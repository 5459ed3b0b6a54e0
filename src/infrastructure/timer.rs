use crate::types::{
    DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY, RealtimeError, Result,
};
use std::time::Duration;

/// Reconnection budget with capped exponential backoff.
///
/// The delay before the retry that follows the `n`-th consecutive failure is
/// `min(base_delay * 2^(n-1), max_delay)`. Once `max_attempts` consecutive
/// failures have happened the client stops retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Delay to wait after `failures` consecutive failures (1-based).
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1);
        let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Whether `failures` consecutive failures use up the budget
    pub fn is_exhausted(&self, failures: u32) -> bool {
        failures >= self.max_attempts
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(RealtimeError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.base_delay.is_zero() {
            return Err(RealtimeError::InvalidConfig(
                "base reconnect delay must be > 0".to_string(),
            ));
        }
        if self.max_delay < self.base_delay {
            return Err(RealtimeError::InvalidConfig(
                "max reconnect delay must be >= base reconnect delay".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            Duration::from_millis(DEFAULT_BASE_DELAY),
            Duration::from_millis(DEFAULT_MAX_DELAY),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy::new(5, Duration::from_millis(500), Duration::from_millis(8000))
    }

    #[test]
    fn test_delay_doubles_until_cap() {
        let p = policy();
        let delays: Vec<u128> = (1..=7).map(|n| p.delay_for(n).as_millis()).collect();
        assert_eq!(delays, vec![500, 1000, 2000, 4000, 8000, 8000, 8000]);
    }

    #[test]
    fn test_delay_does_not_overflow() {
        let p = policy();
        assert_eq!(p.delay_for(64), Duration::from_millis(8000));
        assert_eq!(p.delay_for(u32::MAX), Duration::from_millis(8000));
    }

    #[test]
    fn test_exhaustion_boundary() {
        let p = policy();
        assert!(!p.is_exhausted(4));
        assert!(p.is_exhausted(5));
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let p = ReconnectPolicy::new(3, Duration::from_secs(2), Duration::from_secs(1));
        assert!(p.validate().is_err());
        assert!(ReconnectPolicy::default().validate().is_ok());
        let zero = ReconnectPolicy::new(0, Duration::from_secs(1), Duration::from_secs(1));
        assert!(zero.validate().is_err());
    }
}
