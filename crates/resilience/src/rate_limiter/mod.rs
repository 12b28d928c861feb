//! Sliding-window rate limiting
//!
//! ```
//! use std::time::Duration;
//! use sluice_resilience::SlidingWindow;
//!
//! let limiter = SlidingWindow::new(Duration::from_secs(10), 30);
//! ```

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ResilienceResult;

mod keyed;
mod sliding_window;

pub use keyed::KeyedSlidingWindow;
pub use sliding_window::SlidingWindow;

/// Common interface for admission limiters.
#[async_trait]
pub trait RateLimiter: Send + Sync + fmt::Debug {
    /// What admissions are counted per; `()` for one shared window.
    type Key: Send + Sync;

    /// Admit one request for `key` or fail with `RateLimitExceeded`.
    async fn acquire(&self, key: &Self::Key) -> ResilienceResult<()>;

    /// Admissions currently inside the window of `key`.
    async fn current_rate(&self, key: &Self::Key) -> usize;

    /// Forget every admission.
    async fn reset(&self);
}

/// `max_requests` per trailing `window`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    pub max_requests: usize,
    #[serde(rename = "window_ms", with = "millis")]
    pub window: Duration,
}

impl RateLimitPolicy {
    pub const fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// 30 requests per 10 seconds, applied to `/execute`.
    pub const fn execute() -> Self {
        Self::new(30, Duration::from_secs(10))
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::execute()
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
