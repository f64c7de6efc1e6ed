//! Reconnect backoff
//!
//! Exponential with a cap and symmetric random jitter.

use rand::Rng;
use std::time::Duration;

/// Backoff parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first retry
    pub base: Duration,
    /// Upper bound before jitter
    pub max: Duration,
    /// Jitter as a fraction of the delay (0.3 = ±30%)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1_000),
            max: Duration::from_millis(60_000),
            jitter: 0.3,
        }
    }
}

/// Backoff calculator
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay before the next attempt; advances the attempt counter
    pub fn next_delay(&mut self) -> Duration {
        let exp = self.attempt.min(31);
        let base_ms = self.config.base.as_millis() as f64;
        let capped = (base_ms * 2f64.powi(exp as i32)).min(self.config.max.as_millis() as f64);

        let jitter = self.config.jitter.clamp(0.0, 1.0);
        let factor = if jitter > 0.0 {
            rand::thread_rng().gen_range(1.0 - jitter..=1.0 + jitter)
        } else {
            1.0
        };

        self.attempt += 1;

        Duration::from_millis((capped * factor) as u64)
    }

    /// Reset on successful connection
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Attempts made since the last reset
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}
