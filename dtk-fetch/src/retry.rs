//! Exponential backoff policy for transient upstream faults
//!
//! **Backoff Strategy:**
//! - Initial delay: 5s
//! - Max delay: 60s
//! - Multiplier: 2.0 (exponential)
//! - Optional jitter: up to +10% of the computed delay
//!
//! With the default 5 attempts the sleeps between attempts are 5s, 10s, 20s, 40s.

use dtk_common::config::FetchConfig;
use rand::Rng;
use std::time::Duration;

/// Maximum jitter as a fraction of the computed delay
const JITTER_FRACTION: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(60),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_secs(config.initial_backoff_secs),
            max_backoff: Duration::from_secs(config.max_backoff_secs),
            jitter: config.jitter,
        }
    }

    /// Single attempt, no retry
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Deterministic delay after the given failed attempt (1-based), capped
    pub fn backoff_for(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// Delay actually slept: capped backoff plus jitter when enabled
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        let base = self.backoff_for(failed_attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let fraction = rand::thread_rng().gen_range(0.0..=JITTER_FRACTION);
        base + base.mul_f64(fraction)
    }
}
