// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-campaign token buckets.
//!
//! A bucket holds at most one second worth of tokens and refills
//! continuously at the campaign's rate. The dispatcher takes tokens before it
//! claims entries and returns whatever the claim did not use.

use dashmap::DashMap;
use tokio::time::Instant;

/// A token bucket with fractional refill.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    rate_per_sec: u32,
    capacity: f64,
    available: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A full bucket refilling at `rate_per_sec` (minimum 1).
    pub fn new(rate_per_sec: u32) -> Self {
        let rate_per_sec = rate_per_sec.max(1);
        let capacity = f64::from(rate_per_sec);
        Self {
            rate_per_sec,
            capacity,
            available: capacity,
            last_refill: Instant::now(),
        }
    }

    pub fn rate_per_sec(&self) -> u32 {
        self.rate_per_sec
    }

    /// Whole tokens available right now.
    pub fn available(&mut self) -> u32 {
        self.refill();
        self.available.floor() as u32
    }

    /// Take up to `wanted` whole tokens and return how many were granted.
    pub fn take(&mut self, wanted: u32) -> u32 {
        self.refill();
        let granted = (self.available.floor() as u32).min(wanted);
        self.available -= f64::from(granted);
        granted
    }

    /// Return unused tokens.
    pub fn give_back(&mut self, tokens: u32) {
        self.available = (self.available + f64::from(tokens)).min(self.capacity);
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.available =
                (self.available + elapsed * f64::from(self.rate_per_sec)).min(self.capacity);
            self.last_refill = now;
        }
    }
}

/// Token buckets keyed by campaign id.
///
/// A bucket is rebuilt when the campaign's rate changes.
#[derive(Debug, Default)]
pub struct RateLimiters {
    buckets: DashMap<String, TokenBucket>,
}

impl RateLimiters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take up to `wanted` tokens for `campaign_id` at `rate_per_sec`.
    pub fn take(&self, campaign_id: &str, rate_per_sec: u32, wanted: u32) -> u32 {
        let mut bucket = self
            .buckets
            .entry(campaign_id.to_string())
            .or_insert_with(|| TokenBucket::new(rate_per_sec));
        if bucket.rate_per_sec() != rate_per_sec.max(1) {
            *bucket = TokenBucket::new(rate_per_sec);
        }
        bucket.take(wanted)
    }

    pub fn give_back(&self, campaign_id: &str, tokens: u32) {
        if tokens == 0 {
            return;
        }
        if let Some(mut bucket) = self.buckets.get_mut(campaign_id) {
            bucket.give_back(tokens);
        }
    }

    /// Drop buckets of campaigns for which `keep` is false.
    pub fn retain(&self, keep: impl Fn(&str) -> bool) {
        self.buckets.retain(|id, _| keep(id));
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn starts_full_and_refills_over_time() {
        let mut bucket = TokenBucket::new(10);
        assert_eq!(bucket.take(25), 10);
        assert_eq!(bucket.take(1), 0);

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(bucket.available(), 5);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(bucket.available(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn unused_tokens_come_back() {
        let mut bucket = TokenBucket::new(4);
        assert_eq!(bucket.take(4), 4);
        bucket.give_back(3);
        assert_eq!(bucket.take(10), 3);
        bucket.give_back(100);
        assert_eq!(bucket.available(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_rate_is_treated_as_one() {
        let mut bucket = TokenBucket::new(0);
        assert_eq!(bucket.rate_per_sec(), 1);
        assert_eq!(bucket.take(5), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn limiters_are_per_campaign() {
        let limiters = RateLimiters::new();
        assert_eq!(limiters.take("a", 2, 10), 2);
        assert_eq!(limiters.take("a", 2, 10), 0);
        assert_eq!(limiters.take("b", 3, 10), 3);

        // A rate change resets the bucket.
        assert_eq!(limiters.take("a", 5, 10), 5);

        limiters.retain(|id| id == "b");
        assert_eq!(limiters.len(), 1);
    }
}
