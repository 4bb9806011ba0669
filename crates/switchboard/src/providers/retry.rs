//! Bounded retry-with-backoff policy for summary generation.
//!
//! The loop itself lives in the orchestrator; this is only the policy and
//! the delay computation.

use std::time::Duration;

use rand::Rng;

use crate::config::Config;

pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
pub const DEFAULT_INITIAL_RETRY_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_MAX_RETRY_INTERVAL_MS: u64 = 15_000;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub initial_interval_ms: u64,
    pub backoff_multiplier: f64,
    pub max_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_interval_ms: DEFAULT_INITIAL_RETRY_INTERVAL_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_interval_ms: DEFAULT_MAX_RETRY_INTERVAL_MS,
        }
    }
}

impl RetryConfig {
    pub fn from_config() -> Self {
        let config = Config::global();
        Self {
            max_attempts: config
                .get_param("SWITCHBOARD_SUMMARY_MAX_ATTEMPTS")
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            initial_interval_ms: config
                .get_param("SWITCHBOARD_SUMMARY_RETRY_INTERVAL_MS")
                .unwrap_or(DEFAULT_INITIAL_RETRY_INTERVAL_MS),
            backoff_multiplier: config
                .get_param("SWITCHBOARD_SUMMARY_BACKOFF_MULTIPLIER")
                .unwrap_or(DEFAULT_BACKOFF_MULTIPLIER),
            max_interval_ms: config
                .get_param("SWITCHBOARD_SUMMARY_MAX_RETRY_INTERVAL_MS")
                .unwrap_or(DEFAULT_MAX_RETRY_INTERVAL_MS),
        }
    }

    /// Delay before the retry that follows `attempt` (1-based), with up to
    /// 10% jitter to spread concurrent retries.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let base = self.initial_interval_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = base.min(self.max_interval_ms as f64);
        let jitter = rand::thread_rng().gen_range(0.0..=0.1);
        Duration::from_millis((capped * (1.0 + jitter)) as u64)
    }
}
