//! Retry Policy
//!
//! Delays for re-sending a reading after a transient failure. The delay for
//! retry `n` is `initial_delay * multiplier^(n-1)`, capped at `max_delay`,
//! then spread by the jitter fraction.

use std::time::Duration;

use rand::Rng;

/// How a failed send is retried.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any single delay, before jitter.
    pub max_delay: Duration,
    /// Growth factor between consecutive retries.
    pub multiplier: f64,
    /// Fraction of the delay added or removed at random. 0 disables jitter.
    pub jitter_factor: f64,
    /// Retries allowed per reading. 0 means keep retrying.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 5,
        }
    }
}

impl RetryConfig {
    /// Un-jittered delay before retry number `retry` (1-based).
    #[must_use]
    pub fn base_delay(&self, retry: u32) -> Duration {
        let cap = self.max_delay.as_secs_f64();
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);

        if secs.is_nan() || secs < 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(secs.min(cap))
        }
    }
}

/// Retry budget for a single reading.
///
/// ```rust
/// use telemetry_hub::infrastructure::simulator::{RetryConfig, RetryPolicy};
///
/// let mut policy = RetryPolicy::new(RetryConfig { max_attempts: 1, ..RetryConfig::default() });
/// assert!(policy.next_delay().is_some());
/// assert!(policy.next_delay().is_none());
/// assert_eq!(policy.attempt_count(), 1);
/// ```
#[derive(Debug)]
pub struct RetryPolicy {
    config: RetryConfig,
    retries: u32,
}

impl RetryPolicy {
    /// Start a fresh budget.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config, retries: 0 }
    }

    /// Claim the next retry and return how long to wait first, or `None`
    /// once the budget is spent.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        let limit = self.config.max_attempts;
        if limit != 0 && self.retries >= limit {
            return None;
        }
        self.retries = self.retries.saturating_add(1);

        let base = self.config.base_delay(self.retries);
        Some(jittered(base, self.config.jitter_factor))
    }

    /// Retries claimed so far.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.retries
    }
}

fn jittered(base: Duration, fraction: f64) -> Duration {
    if fraction.is_nan() || fraction <= 0.0 || base.is_zero() {
        return base;
    }
    let fraction = fraction.min(1.0);
    let scale = rand::rng().random_range(1.0 - fraction..=1.0 + fraction);
    base.mul_f64(scale).max(Duration::from_millis(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steady(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            multiplier: 2.0,
            jitter_factor: 0.0,
            max_attempts,
        }
    }

    #[test]
    fn base_delay_grows_then_caps() {
        let config = steady(0);
        let millis: Vec<u128> = (1..=5).map(|n| config.base_delay(n).as_millis()).collect();
        assert_eq!(millis, vec![100, 200, 400, 500, 500]);
    }

    #[test]
    fn base_delay_survives_huge_retry_numbers() {
        assert_eq!(steady(0).base_delay(u32::MAX), Duration::from_millis(500));
    }

    #[test]
    fn budget_is_enforced() {
        let mut policy = RetryPolicy::new(steady(2));

        assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(200)));
        assert_eq!(policy.next_delay(), None);
        assert_eq!(policy.attempt_count(), 2);
    }

    #[test]
    fn zero_budget_never_runs_out() {
        let mut policy = RetryPolicy::new(steady(0));
        for _ in 0..50 {
            assert!(policy.next_delay().is_some());
        }
        assert_eq!(policy.attempt_count(), 50);
    }

    #[test]
    fn jitter_stays_in_bounds() {
        let config = RetryConfig {
            initial_delay: Duration::from_millis(1000),
            jitter_factor: 0.1,
            ..RetryConfig::default()
        };
        for _ in 0..100 {
            let millis = RetryPolicy::new(config.clone())
                .next_delay()
                .unwrap()
                .as_millis();
            assert!((900..=1100).contains(&millis), "delay {millis}ms out of range");
        }
    }
}
