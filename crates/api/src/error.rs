//! Errors surfaced at the HTTP boundary

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sluice_resilience::ResilienceError;

pub type ApiResult<T> = Result<T, ApiError>;

/// A rejected request. Execution failures are not errors here: they are
/// reported inside a `200` trace.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Rate limit hit ({0})")]
    RateLimited(ResilienceError),

    #[error("Invalid request body")]
    InvalidBody,

    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::InvalidBody => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let retry_after = match &self {
            Self::RateLimited(err) => err.retry_after(),
            _ => None,
        };
        let mut response = (
            self.status(),
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response();
        if let Some(wait) = retry_after {
            let seconds = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ApiError::Unauthorized, StatusCode::UNAUTHORIZED)]
    #[case(ApiError::InvalidBody, StatusCode::BAD_REQUEST)]
    #[case(ApiError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn status_codes(#[case] error: ApiError, #[case] status: StatusCode) {
        assert_eq!(error.into_response().status(), status);
    }

    #[test]
    fn rate_limited_carries_retry_after() {
        let error = ApiError::RateLimited(ResilienceError::RateLimitExceeded {
            retry_after: Some(Duration::from_millis(2500)),
            limit: 30,
            current: 30,
            window: Duration::from_secs(10),
        });
        assert!(error.to_string().starts_with("Rate limit hit (rate limit exceeded"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "3");
    }
}
