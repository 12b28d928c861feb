//! Retry with pluggable backoff

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{ResilienceError, ResilienceResult};

/// Computes the pause after a failed attempt.
pub trait BackoffPolicy: Send + Sync + fmt::Debug {
    /// Delay after the failure of `attempt` (0-indexed) out of `max_attempts`.
    fn calculate_delay(&self, attempt: usize, max_attempts: usize) -> Duration;

    fn policy_name(&self) -> &'static str;
}

/// `2^(base_exponent - remaining)` milliseconds, where `remaining` counts
/// the attempts left including the one that just failed.
///
/// With the default exponent of 10 and three attempts this waits 128 ms and
/// then 256 ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExponentialBackoff {
    pub base_exponent: u32,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self { base_exponent: 10 }
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn calculate_delay(&self, attempt: usize, max_attempts: usize) -> Duration {
        let remaining = max_attempts.saturating_sub(attempt) as u32;
        let exponent = self.base_exponent.saturating_sub(remaining).min(20);
        Duration::from_millis(1u64 << exponent)
    }

    fn policy_name(&self) -> &'static str {
        "ExponentialBackoff"
    }
}

/// Constant pause between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedDelay(pub Duration);

impl BackoffPolicy for FixedDelay {
    fn calculate_delay(&self, _attempt: usize, _max_attempts: usize) -> Duration {
        self.0
    }

    fn policy_name(&self) -> &'static str {
        "FixedDelay"
    }
}

/// Runs an operation up to `max_attempts` times.
#[derive(Debug, Clone)]
pub struct RetryStrategy<B> {
    backoff: B,
    max_attempts: usize,
}

impl RetryStrategy<ExponentialBackoff> {
    /// Exponential backoff with the default exponent.
    pub fn exponential(max_attempts: usize) -> ResilienceResult<Self> {
        Self::new(ExponentialBackoff::default(), max_attempts)
    }
}

impl<B: BackoffPolicy> RetryStrategy<B> {
    pub fn new(backoff: B, max_attempts: usize) -> ResilienceResult<Self> {
        if max_attempts == 0 {
            return Err(ResilienceError::invalid_config(
                "max_attempts must be at least 1",
            ));
        }
        Ok(Self {
            backoff,
            max_attempts,
        })
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn backoff(&self) -> &B {
        &self.backoff
    }

    /// Retry every error.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.execute_if(operation, |_| true).await
    }

    /// Retry only the errors `retryable` accepts; anything else, or the
    /// error of the last attempt, is returned unchanged.
    pub async fn execute_if<T, E, F, Fut, P>(&self, mut operation: F, retryable: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: fmt::Display,
    {
        let mut attempt = 0;
        loop {
            debug!(
                attempt = attempt + 1,
                max_attempts = self.max_attempts,
                policy = self.backoff.policy_name(),
                "starting attempt"
            );

            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !retryable(&error) {
                        debug!(attempt = attempt + 1, %error, "error is not retryable");
                        return Err(error);
                    }
                    if attempt + 1 >= self.max_attempts {
                        warn!(attempts = attempt + 1, %error, "giving up after final attempt");
                        return Err(error);
                    }

                    let delay = self.backoff.calculate_delay(attempt, self.max_attempts);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "attempt failed, backing off"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, 3, 128)]
    #[case(1, 3, 256)]
    #[case(2, 3, 512)]
    #[case(0, 1, 512)]
    fn exponential_delays(#[case] attempt: usize, #[case] max: usize, #[case] millis: u64) {
        let delay = ExponentialBackoff::default().calculate_delay(attempt, max);
        assert_eq!(delay, Duration::from_millis(millis));
    }

    #[test]
    fn large_attempt_counts_saturate() {
        let delay = ExponentialBackoff::default().calculate_delay(0, 50);
        assert_eq!(delay, Duration::from_millis(1));
    }

    #[test]
    fn zero_attempts_rejected() {
        let err = RetryStrategy::new(FixedDelay(Duration::ZERO), 0).unwrap_err();
        assert!(matches!(err, ResilienceError::InvalidConfig { .. }));
    }
}
