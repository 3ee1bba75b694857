//! ---
//! rg_section: "07-resilience-fault-tolerance"
//! rg_subsection: "module"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "Retry budgets and cancellable waits."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Policy parameters controlling how many consecutive failures are retried and how long to wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive failures tolerated before giving up. Zero disables retries.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for every further consecutive failure.
    pub base_delay: Duration,
    /// Upper bound on a single backoff delay (jitter excluded).
    pub max_delay: Duration,
    /// Maximum jitter added to each delay to avoid synchronised retries.
    pub jitter: Duration,
}

impl RetryPolicy {
    /// Construct a policy; `max_delay` defaults to 20x the base delay.
    pub fn new(max_retries: u32, base_delay: Duration, jitter: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: base_delay.saturating_mul(20),
            jitter,
        }
    }

    /// Policy that fails on the first error.
    pub fn no_retries() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    /// Override the backoff ceiling.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay.max(self.base_delay);
        self
    }

    /// Delay for the provided retry (1-indexed) with exponential growth.
    pub fn backoff_delay(&self, retry: u32, rng: &mut StdRng) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let base = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay);
        if self.jitter.is_zero() {
            base
        } else {
            let jitter_ms = rng.gen_range(0..=self.jitter.as_millis().max(1)) as u64;
            base + Duration::from_millis(jitter_ms)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500), Duration::from_millis(250))
            .with_max_delay(Duration::from_secs(10))
    }
}

/// Tracks consecutive failures against a [`RetryPolicy`].
#[derive(Debug)]
pub struct RetryBudget {
    policy: RetryPolicy,
    consecutive_failures: u32,
    rng: StdRng,
}

impl RetryBudget {
    /// Create a budget with an entropy-seeded jitter source.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            consecutive_failures: 0,
            rng: StdRng::from_entropy(),
        }
    }

    /// Seed the internal RNG for deterministic testing.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Record a failure. Returns the delay to wait before retrying, or `None`
    /// once the budget is exhausted.
    pub fn record_failure(&mut self) -> Option<Duration> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures > self.policy.max_retries {
            return None;
        }
        Some(
            self.policy
                .backoff_delay(self.consecutive_failures, &mut self.rng),
        )
    }

    /// A success resets the consecutive failure count.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Number of failures since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::ZERO)
            .with_max_delay(Duration::from_millis(300));
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(policy.backoff_delay(1, &mut rng), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(2, &mut rng), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(3, &mut rng), Duration::from_millis(300));
        assert_eq!(policy.backoff_delay(12, &mut rng), Duration::from_millis(300));
    }

    #[test]
    fn jitter_stays_within_bound() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(5));
        let mut rng = StdRng::seed_from_u64(1234);
        for retry in 1..=3 {
            let delay = policy.backoff_delay(retry, &mut rng);
            let floor = Duration::from_millis(10 * 2u64.pow(retry - 1));
            assert!(delay >= floor);
            assert!(delay <= floor + Duration::from_millis(5));
        }
    }

    #[test]
    fn budget_exhausts_after_max_retries() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1), Duration::ZERO);
        let mut budget = RetryBudget::new(policy).with_seed(42);
        assert!(budget.record_failure().is_some());
        assert!(budget.record_failure().is_some());
        assert!(budget.record_failure().is_none());
        assert_eq!(budget.consecutive_failures(), 3);
    }

    #[test]
    fn success_resets_consecutive_failures() {
        let policy = RetryPolicy::new(1, Duration::from_millis(1), Duration::ZERO);
        let mut budget = RetryBudget::new(policy).with_seed(42);
        assert!(budget.record_failure().is_some());
        budget.record_success();
        assert_eq!(budget.consecutive_failures(), 0);
        assert!(budget.record_failure().is_some());
    }

    #[test]
    fn zero_budget_fails_immediately() {
        let mut budget = RetryBudget::new(RetryPolicy::no_retries());
        assert!(budget.record_failure().is_none());
    }
}
