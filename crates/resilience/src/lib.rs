//! Resilience primitives used around outbound action calls and inbound admission.
//!
//! - [`RetryStrategy`] re-runs an operation with a [`BackoffPolicy`] between attempts.
//! - [`SlidingWindow`] admits at most N requests per trailing window.
//! - [`KeyedSlidingWindow`] keeps one window per caller key.

mod error;
pub mod rate_limiter;
pub mod retry;

pub use error::{ResilienceError, ResilienceResult};
pub use rate_limiter::{KeyedSlidingWindow, RateLimitPolicy, RateLimiter, SlidingWindow};
pub use retry::{BackoffPolicy, ExponentialBackoff, FixedDelay, RetryStrategy};
