//! Retry policy for producer calls.

use std::time::Duration;

use crate::config::Config;

/// Default producer invocations per fetch cycle.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default wait between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(200);

// == Retry Policy ==
/// How many times a fetch cycle calls the producer and how long it waits
/// between calls.
///
/// `max_retries` counts every invocation, the first one included, and is
/// never below one. With the default `backoff_factor` of 1.0 the delay is
/// fixed; a larger factor grows it per attempt up to `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Fixed-delay policy.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            delay,
            backoff_factor: 1.0,
            max_delay: delay,
        }
    }

    /// Exponential policy: `delay * factor^n`, capped at `max_delay`.
    pub fn exponential(max_retries: u32, delay: Duration, factor: f64, max_delay: Duration) -> Self {
        Self {
            max_retries,
            delay,
            backoff_factor: factor,
            max_delay,
        }
    }

    /// Total producer invocations allowed per cycle.
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    // == Delay For ==
    /// Wait after failed attempt number `attempt` (1-based) before the next.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.backoff_factor <= 1.0 {
            return self.delay;
        }
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled_ms = self.delay.as_millis() as f64 * self.backoff_factor.powi(exponent);
        if !scaled_ms.is_finite() || scaled_ms >= self.max_delay.as_millis() as f64 {
            self.max_delay
        } else {
            Duration::from_millis(scaled_ms as u64)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

impl From<&Config> for RetryPolicy {
    fn from(config: &Config) -> Self {
        Self::fixed(
            config.max_retries,
            Duration::from_millis(config.retry_delay_ms),
        )
    }
}
