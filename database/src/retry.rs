use std::time::Duration;

use serde::Deserialize;

/// Reconnect pacing for the relational backend.
///
/// The wait after the n-th consecutive failure is
/// `min(max_wait, n * scaling_factor * min_wait)`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    pub min_wait_ms: u64,
    pub max_wait_ms: u64,
    pub scaling_factor: f64,
    pub valid_timeout_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            min_wait_ms: 500,
            max_wait_ms: 5 * 60 * 1000,
            scaling_factor: 40.0,
            valid_timeout_ms: 3000,
        }
    }
}

impl BackoffPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = attempt as f64 * self.scaling_factor * self.min_wait_ms as f64;
        let capped = scaled.min(self.max_wait_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    pub fn valid_timeout(&self) -> Duration {
        Duration::from_millis(self.valid_timeout_ms)
    }

    /// Whether the n-th consecutive failure is reported at visible severity:
    /// the first one, then every eleventh after it.
    pub fn is_loud_failure(attempt: u32) -> bool {
        attempt > 0 && (attempt - 1) % 11 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_scales_with_attempts() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::ZERO);
        assert_eq!(policy.delay_for(1), Duration::from_secs(20));
        assert_eq!(policy.delay_for(3), Duration::from_secs(60));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(15), Duration::from_secs(300));
        assert_eq!(policy.delay_for(1_000), Duration::from_secs(300));
    }

    #[test]
    fn test_loud_failures_are_sampled() {
        let loud: Vec<u32> = (1..=30).filter(|n| BackoffPolicy::is_loud_failure(*n)).collect();
        assert_eq!(loud, vec![1, 12, 23]);
        assert!(!BackoffPolicy::is_loud_failure(0));
    }
}
