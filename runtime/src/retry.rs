//! Bounded retry with growing randomized backoff.
//!
//! `RetryPolicy::attempts()` hands out attempt numbers and performs the
//! pacing delay owed before each one. Callers drive the loop themselves so
//! an attempt may freely borrow the caller's state:
//!
//! ```no_run
//! # use pixmirror::retry::{RetryOutcome, RetryPolicy};
//! # async fn op() -> Result<u32, String> { Ok(1) }
//! # async fn demo(policy: RetryPolicy) -> RetryOutcome<u32, String> {
//! let mut attempts = policy.attempts();
//! let mut last = None;
//! while let Some(n) = attempts.next().await {
//!     match op().await {
//!         Ok(v) => return RetryOutcome::Succeeded { value: v, attempts: n },
//!         Err(e) => last = Some(e),
//!     }
//! }
//! RetryOutcome::exhausted(attempts.made(), last)
//! # }
//! ```
//!
//! The page controller composes two policies (the immediate retries and the
//! single deferred pass); the download controller uses one.

use crate::pacing::DelayRange;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How many times to try an operation and how long to wait around attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before retry `n` is `backoff.sample() * n`.
    pub backoff: DelayRange,
    /// Delay before the first attempt.
    pub initial_delay: DelayRange,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: DelayRange) -> Self {
        Self {
            max_attempts,
            backoff,
            initial_delay: DelayRange::ZERO,
        }
    }

    pub fn with_initial_delay(mut self, initial_delay: DelayRange) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// A single attempt with no delays.
    pub fn once() -> Self {
        Self::new(1, DelayRange::ZERO)
    }

    pub fn attempts(&self) -> Attempts<'_> {
        Attempts {
            policy: self,
            made: 0,
        }
    }

    /// Delay owed before attempt number `attempt` (1-based).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            self.initial_delay.sample()
        } else {
            self.backoff.sample_scaled(attempt - 1)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, DelayRange::ZERO)
    }
}

/// Attempt counter for one operation under a `RetryPolicy`.
pub struct Attempts<'a> {
    policy: &'a RetryPolicy,
    made: u32,
}

impl Attempts<'_> {
    /// Wait out the delay owed before the next attempt and return its
    /// 1-based number, or `None` once the budget is spent.
    pub async fn next(&mut self) -> Option<u32> {
        if self.made >= self.policy.max_attempts.max(1) {
            return None;
        }
        let attempt = self.made + 1;
        let delay = self.policy.delay_before(attempt);
        if !delay.is_zero() {
            tracing::debug!("waiting {}ms before attempt {attempt}", delay.as_millis());
            tokio::time::sleep(delay).await;
        }
        self.made = attempt;
        Some(attempt)
    }

    /// Attempts handed out so far.
    pub fn made(&self) -> u32 {
        self.made
    }

    pub fn remaining(&self) -> u32 {
        self.policy.max_attempts.max(1).saturating_sub(self.made)
    }
}

/// Result of driving an operation under a retry policy.
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    /// An attempt succeeded.
    Succeeded { value: T, attempts: u32 },
    /// Every attempt failed with a retryable error.
    Exhausted { attempts: u32, last_error: Option<E> },
    /// An attempt failed with an error that retrying cannot fix.
    Aborted { attempts: u32, error: E },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn exhausted(attempts: u32, last_error: Option<E>) -> Self {
        Self::Exhausted {
            attempts,
            last_error,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::Aborted { attempts, .. } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}
