// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exponential backoff for transiently failed sends.

use std::time::Duration;

use rand::Rng;

use prospect_config::model::QueueConfig;

/// Retry budget and backoff curve.
///
/// The delay before retry `n` (1-based) is `base * multiplier^(n-1)`,
/// optionally spread upward by `jitter_factor`, and never above `max_delay`.
/// With the defaults that is 30s, 2m, 8m.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_secs(config.base_retry_delay_secs),
            multiplier: config.backoff_multiplier,
            max_delay: Duration::from_secs(config.max_retry_delay_secs),
            jitter_factor: config.jitter_factor,
        }
    }

    /// A policy that retries immediately. Used where tests need re-claims
    /// without waiting.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
            jitter_factor: 0.0,
        }
    }

    /// Whether an entry that has now failed `attempts` times gets another try.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.multiplier.powi(exponent);
        let delay = if factor.is_finite() {
            self.base_delay.mul_f64(factor.min(u32::MAX as f64))
        } else {
            self.max_delay
        };

        let jittered = if self.jitter_factor > 0.0 {
            let jitter = rand::thread_rng().gen_range(0.0..=self.jitter_factor);
            delay.mul_f64(1.0 + jitter)
        } else {
            delay
        };

        jittered.min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_curve_is_30s_2m_8m() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for(1), Duration::from_secs(30));
        assert_eq!(policy.delay_for(2), Duration::from_secs(120));
        assert_eq!(policy.delay_for(3), Duration::from_secs(480));
    }

    #[test]
    fn two_minute_base_gives_2m_8m_32m() {
        let policy = RetryPolicy::from_config(&QueueConfig {
            base_retry_delay_secs: 120,
            ..QueueConfig::default()
        });
        assert_eq!(policy.delay_for(1), Duration::from_secs(120));
        assert_eq!(policy.delay_for(2), Duration::from_secs(480));
        assert_eq!(policy.delay_for(3), Duration::from_secs(1920));
    }

    #[test]
    fn delay_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(10), Duration::from_secs(3600));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(3600));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            jitter_factor: 0.5,
            ..RetryPolicy::default()
        };
        for _ in 0..100 {
            let d = policy.delay_for(1);
            assert!(d >= Duration::from_secs(30));
            assert!(d <= Duration::from_secs(45));
        }
    }

    #[test]
    fn retry_budget() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn immediate_policy_has_no_delay() {
        let policy = RetryPolicy::immediate(5);
        assert_eq!(policy.delay_for(4), Duration::ZERO);
        assert!(policy.should_retry(4));
    }
}
