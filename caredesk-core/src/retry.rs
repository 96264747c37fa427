//! Exponential backoff for transient gateway failures

use std::time::Duration;

use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            max_retries: 3,
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`, capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay to wait before the next attempt, or `None` when the error is
    /// terminal or retries are exhausted.
    pub fn next_delay(&self, retries_so_far: u32, error: &GatewayError) -> Option<Duration> {
        if !error.is_retryable() || retries_so_far >= self.max_retries {
            return None;
        }
        Some(self.delay(retries_so_far))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_and_cap() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (0..6).map(|n| policy.delay(n).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 8, 8]);
        assert_eq!(policy.delay(40), Duration::from_secs(8));
    }

    #[test]
    fn three_retries_for_rate_limits() {
        let policy = RetryPolicy::default();
        let err = GatewayError::rate_limited("slow down");
        let delays: Vec<_> = (0..5).map_while(|n| policy.next_delay(n, &err)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    #[test]
    fn other_errors_are_terminal() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.next_delay(0, &GatewayError::other("boom")), None);
        assert_eq!(
            policy.next_delay(0, &GatewayError::not_found("city", "c9")),
            None
        );
        assert!(policy.next_delay(0, &GatewayError::network("refused")).is_some());
    }
}
