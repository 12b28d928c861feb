//! Sliding window rate limiter

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::{RateLimitPolicy, RateLimiter};
use crate::{ResilienceError, ResilienceResult};

/// Counts admissions inside a trailing window.
///
/// Timestamps come from `tokio::time`, so paused-clock tests can advance
/// the window deterministically.
#[derive(Debug)]
pub struct SlidingWindow {
    window: Duration,
    max_requests: usize,
    admitted: Mutex<VecDeque<Instant>>,
}

impl SlidingWindow {
    #[must_use]
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
            admitted: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    #[must_use]
    pub fn from_policy(policy: RateLimitPolicy) -> Self {
        Self::new(policy.window, policy.max_requests)
    }

    /// Admit or reject without awaiting.
    pub fn try_acquire(&self) -> ResilienceResult<()> {
        let now = Instant::now();
        let mut admitted = self.admitted.lock();
        evict_expired(&mut admitted, now, self.window);

        if admitted.len() < self.max_requests {
            admitted.push_back(now);
            return Ok(());
        }

        let retry_after = admitted.front().map_or(self.window, |&oldest| {
            self.window
                .checked_sub(now.duration_since(oldest))
                .unwrap_or(Duration::from_millis(1))
        });

        Err(ResilienceError::RateLimitExceeded {
            retry_after: Some(retry_after),
            limit: self.max_requests,
            current: admitted.len(),
            window: self.window,
        })
    }

    /// Admissions still inside the window.
    pub fn in_window(&self) -> usize {
        let mut admitted = self.admitted.lock();
        evict_expired(&mut admitted, Instant::now(), self.window);
        admitted.len()
    }

    pub fn clear(&self) {
        self.admitted.lock().clear();
    }
}

fn evict_expired(admitted: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    let Some(cutoff) = now.checked_sub(window) else {
        return;
    };
    while admitted.front().is_some_and(|&front| front <= cutoff) {
        admitted.pop_front();
    }
}

#[async_trait]
impl RateLimiter for SlidingWindow {
    type Key = ();

    async fn acquire(&self, _key: &()) -> ResilienceResult<()> {
        self.try_acquire()
    }

    async fn current_rate(&self, _key: &()) -> usize {
        self.in_window()
    }

    async fn reset(&self) {
        self.clear();
    }
}
