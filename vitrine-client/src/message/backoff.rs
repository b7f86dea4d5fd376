//! Reconnect backoff

use rand::Rng;
use std::time::Duration;

use super::SyncConfig;

/// Exponential backoff with jitter: initial, ×2 per failure, capped
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    jitter: f64,
    max_attempts: u32,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            initial: config.reconnect_delay,
            max: config.max_reconnect_delay.max(config.reconnect_delay),
            jitter: config.reconnect_jitter,
            max_attempts: config.max_reconnect_attempts,
            attempt: 0,
        }
    }

    /// Consecutive failures so far
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Whether the configured attempt limit has been passed
    pub fn exhausted(&self) -> bool {
        self.max_attempts > 0 && self.attempt > self.max_attempts
    }

    /// Record a failure and return how long to wait before the next try
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        let base = if self.exhausted() {
            self.max
        } else {
            self.base_delay(self.attempt)
        };
        self.apply_jitter(base)
    }

    /// Delay before jitter for the n-th consecutive failure (1-based)
    fn base_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.initial.saturating_mul(1u32 << exp).min(self.max)
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 {
            return delay;
        }
        let factor = rand::thread_rng().gen_range(1.0 - self.jitter..=1.0 + self.jitter);
        delay.mul_f64(factor)
    }
}
