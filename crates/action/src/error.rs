use http::StatusCode;

/// Result alias for action operations
pub type ActionResult<T> = Result<T, ActionError>;

/// Error type for building, sending and decoding an action call.
///
/// Only [`ActionError::Transport`] is transient; the dispatcher retries it
/// and nothing else. A downstream status of 300 or more is an answer, not a
/// failure of the transport.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ActionError {
    /// The action definition cannot produce a request: missing path, method
    /// or host, an unfilled placeholder, an unsupported parameter location.
    #[error("action `{action}` is misconfigured: {message}")]
    Config {
        /// Identifier of the offending action.
        action: String,
        /// What is wrong with it.
        message: String,
    },

    /// The third-party API answered with a status of 300 or more.
    #[error("{action} failed with status {status}")]
    Downstream {
        /// Identifier of the action that was called.
        action: String,
        /// Final HTTP status.
        status: StatusCode,
        /// Processed response body.
        body: serde_json::Value,
    },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// A 3xx response without a usable `Location` header.
    #[error("redirect without a usable Location header (status {status})")]
    Redirect {
        /// Status of the redirect response.
        status: StatusCode,
    },

    /// A header name or value that HTTP cannot carry.
    #[error("invalid header `{name}`")]
    InvalidHeader {
        /// Offending header name.
        name: String,
    },

    /// A request body could not be serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ActionError {
    /// Create a configuration error for `action`.
    pub fn config(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            action: action.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if the dispatcher may try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<reqwest::Error> for ActionError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_errors_are_retryable() {
        assert!(ActionError::Transport("reset".into()).is_retryable());
        assert!(!ActionError::config("getUser", "missing path").is_retryable());
        assert!(
            !ActionError::Downstream {
                action: "getUser".into(),
                status: StatusCode::BAD_GATEWAY,
                body: serde_json::Value::Null,
            }
            .is_retryable()
        );
    }

    #[test]
    fn config_errors_name_the_action() {
        let err = ActionError::config("listUsers", "missing host");
        assert_eq!(
            err.to_string(),
            "action `listUsers` is misconfigured: missing host"
        );
    }
}
