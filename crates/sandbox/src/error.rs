use std::time::Duration;

/// Result alias for sandbox operations
pub type SandboxResult<T> = Result<T, SandboxError>;

/// Why a snippet did not complete.
///
/// Messages are already translated into snippet coordinates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SandboxError {
    /// The snippet does not parse.
    #[error("{0}")]
    Compile(String),

    /// The snippet threw and nothing caught it.
    #[error("{0}")]
    Runtime(String),

    /// The wall-clock budget ran out.
    #[error("Execution timed out after {} ms", .0.as_millis())]
    Timeout(Duration),
}

impl SandboxError {
    /// Stable code for logs and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Compile(_) => "SANDBOX:COMPILE",
            Self::Runtime(_) => "SANDBOX:RUNTIME",
            Self::Timeout(_) => "SANDBOX:TIMEOUT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_the_budget() {
        let err = SandboxError::Timeout(Duration::from_secs(60));
        assert_eq!(err.to_string(), "Execution timed out after 60000 ms");
        assert_eq!(err.code(), "SANDBOX:TIMEOUT");
    }
}
