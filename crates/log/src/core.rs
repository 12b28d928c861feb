//! Error type for logger initialization

/// Result alias for logger operations
pub type LogResult<T> = Result<T, LogError>;

/// Errors raised while building the global subscriber
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LogError {
    /// The level / directive string could not be parsed
    #[error("invalid log filter {0}")]
    Filter(String),

    /// A global subscriber was already installed
    #[error("logger already initialized: {0}")]
    Init(String),
}
