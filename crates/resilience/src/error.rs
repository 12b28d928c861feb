//! Error types for resilience operations

use std::time::Duration;

/// Result type for resilience operations
pub type ResilienceResult<T> = Result<T, ResilienceError>;

/// Errors produced by the limiters and by retry configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ResilienceError {
    /// The window already holds `limit` admissions
    #[error("rate limit exceeded: {current} of {limit} requests per {window:?}")]
    RateLimitExceeded {
        /// Time until the oldest admission leaves the window
        retry_after: Option<Duration>,
        limit: usize,
        current: usize,
        window: Duration,
    },

    /// Rejected construction parameters
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl ResilienceError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Suggested wait before trying again, when known.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimitExceeded { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimitExceeded { .. })
    }
}
