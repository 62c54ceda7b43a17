// src/utils/retry.rs

//! Backoff policy and randomized pacing for outbound requests.
//!
//! Every fetch and every notification goes through here so that the request
//! cadence is never fixed.

use std::time::Duration;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `base * attempt`
    Linear,
    /// `base * 2^(attempt - 1)`
    Exponential,
}

/// Retry configuration for a single operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Base delay the growth is applied to.
    pub base_delay: Duration,
    /// Upper bound for a single delay (before jitter).
    pub max_delay: Duration,
    /// Upper bound of the uniformly distributed jitter added to each delay.
    pub jitter: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1500),
            max_delay: Duration::from_secs(30),
            jitter: Duration::from_millis(500),
            backoff: Backoff::Linear,
        }
    }
}

impl RetryPolicy {
    /// Policy that never sleeps; used by tests and dry runs.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
            backoff: Backoff::Linear,
        }
    }

    /// Delay to wait after the given failed attempt (1-based), without jitter.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let scaled = match self.backoff {
            Backoff::Linear => self.base_delay.saturating_mul(attempt),
            Backoff::Exponential => {
                let factor = 2_u32.saturating_pow(attempt - 1);
                self.base_delay.saturating_mul(factor)
            }
        };
        scaled.min(self.max_delay)
    }

    /// Delay to wait after the given failed attempt, jitter included.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay_for(attempt) + random_between(Duration::ZERO, self.jitter)
    }
}

/// Uniformly distributed duration in `[min, max]`.
pub fn random_between(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let lo = min.as_millis() as u64;
    let hi = max.as_millis() as u64;
    Duration::from_millis(fastrand::u64(lo..=hi))
}

/// Sleep for a random duration in `[min_ms, max_ms]` milliseconds.
pub async fn pace(min_ms: u64, max_ms: u64) {
    let delay = random_between(Duration::from_millis(min_ms), Duration::from_millis(max_ms));
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
