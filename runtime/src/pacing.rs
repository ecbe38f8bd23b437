//! Randomized pacing delays.
//!
//! Every pause in pixmirror (between pages, between downloads, between retry
//! attempts, before a stylesheet fetch) is a `DelayRange` sampled uniformly.
//! The pauses are part of the fetch contract: both phases are paced to look
//! like a person browsing.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An inclusive millisecond range to sample a delay from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange {
        min_ms: 0,
        max_ms: 0,
    };

    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// A fixed delay of exactly `ms` milliseconds.
    pub const fn fixed(ms: u64) -> Self {
        Self::new(ms, ms)
    }

    pub fn is_zero(&self) -> bool {
        self.max_ms == 0
    }

    pub fn is_valid(&self) -> bool {
        self.min_ms <= self.max_ms
    }

    /// Sample a delay from the range.
    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::thread_rng().gen_range(self.min_ms..=self.max_ms))
    }

    /// Sample a delay and multiply it by `factor` (used for growing backoff).
    pub fn sample_scaled(&self, factor: u32) -> Duration {
        self.sample().saturating_mul(factor.max(1))
    }

    /// Sleep for a sampled delay. Returns the delay slept.
    pub async fn pause(&self) -> Duration {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        delay
    }
}

impl Default for DelayRange {
    fn default() -> Self {
        Self::ZERO
    }
}

impl std::fmt::Display for DelayRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.min_ms == self.max_ms {
            write!(f, "{}ms", self.min_ms)
        } else {
            write!(f, "{}-{}ms", self.min_ms, self.max_ms)
        }
    }
}
