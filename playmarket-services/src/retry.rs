//! Bounded retry for transient store failures
//!
//! Only [`PlaymarketError::is_transient`](playmarket_core::PlaymarketError::is_transient) errors are retried, with an
//! exponential delay between attempts. Every other error is returned on the
//! first attempt: a rejected trade or resolution has no side effects, and
//! repeating it would give the same answer.

use playmarket_core::PlaymarketResult;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::PlaymarketConfig;

/// Retry schedule for exchange operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failed attempt, doubled each time after
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &PlaymarketConfig) -> Self {
        Self {
            max_attempts: config.retry_max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` starts at 1
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out
    pub async fn run<T, F>(&self, name: &str, mut op: F) -> PlaymarketResult<T>
    where
        F: FnMut() -> PlaymarketResult<T>,
    {
        let mut attempt = 1u32;
        loop {
            match op() {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", name, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        "{} failed transiently ({}), retrying in {:?} (attempt {}/{})",
                        name, e, delay, attempt, self.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
