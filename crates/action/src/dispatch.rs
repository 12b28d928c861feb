//! Sending prepared requests
//!
//! Redirects are followed by hand, at most once, and never carry the
//! credential header to the new location. The whole exchange, redirect hop
//! included, runs inside the retry strategy; only transport failures are
//! retried.

use std::borrow::Cow;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, LOCATION};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use indexmap::IndexMap;
use reqwest::redirect::Policy;
use sluice_resilience::{ExponentialBackoff, RetryStrategy};
use tracing::debug;
use url::Url;

use crate::error::{ActionError, ActionResult};
use crate::html;
use crate::request::PreparedRequest;

/// What came back from the downstream API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub status: StatusCode,
    /// `Content-Type` of the response, lower-cased; `None` for synthetic bodies
    pub content_type: Option<String>,
    pub body: Bytes,
    /// The status was 300 or above
    pub is_error: bool,
}

impl DispatchOutcome {
    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// HTTP client with manual redirects and exponential retry.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    retry: RetryStrategy<ExponentialBackoff>,
}

impl Dispatcher {
    pub fn new(retry: RetryStrategy<ExponentialBackoff>) -> ActionResult<Self> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .build()?;
        Ok(Self { client, retry })
    }

    /// Send `request`, retrying transport failures.
    pub async fn dispatch(&self, request: &PreparedRequest) -> ActionResult<DispatchOutcome> {
        self.retry
            .execute_if(|| self.exchange(request), ActionError::is_retryable)
            .await
    }

    async fn exchange(&self, request: &PreparedRequest) -> ActionResult<DispatchOutcome> {
        let body = request.body.as_deref();
        let response = self
            .fetch(&request.method, request.url.clone(), &request.headers, body)
            .await?;

        let response = if response.status().is_redirection() {
            let status = response.status();
            let target = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|location| redirect_target(&request.url, location))
                .ok_or(ActionError::Redirect { status })?;

            let mut headers = request.headers.clone();
            headers.retain(|name, _| !name.eq_ignore_ascii_case("authorization"));
            debug!(action = %request.action, %status, location = %target, "following redirect");
            self.fetch(&request.method, target, &headers, body).await?
        } else {
            response
        };

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_ascii_lowercase);
        let body = response.bytes().await?;
        debug!(action = %request.action, %status, bytes = body.len(), "received response");
        Ok(outcome(status, content_type, body))
    }

    async fn fetch(
        &self,
        method: &Method,
        url: Url,
        headers: &IndexMap<String, String>,
        body: Option<&str>,
    ) -> ActionResult<reqwest::Response> {
        let mut builder = self
            .client
            .request(method.clone(), url)
            .headers(header_map(headers)?);
        if let Some(body) = body {
            builder = builder.body(body.to_string());
        }
        Ok(builder.send().await?)
    }
}

/// `location` resolved against the origin of `url`, so relative targets
/// land under the host root rather than next to the request path.
fn redirect_target(url: &Url, location: &str) -> Option<Url> {
    url.join("/").ok()?.join(location).ok()
}

fn header_map(headers: &IndexMap<String, String>) -> ActionResult<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let invalid = || ActionError::InvalidHeader { name: name.clone() };
        let key = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        map.insert(key, value);
    }
    Ok(map)
}

fn outcome(status: StatusCode, content_type: Option<String>, body: Bytes) -> DispatchOutcome {
    let is_error = status.as_u16() >= 300;

    if body.trim_ascii().is_empty() {
        let message = if is_error {
            format!("Request failed with status {status}")
        } else {
            format!("Request succeeded with status {status}")
        };
        return DispatchOutcome {
            status,
            content_type: None,
            body: Bytes::from(message),
            is_error,
        };
    }

    let html_shaped = content_type
        .as_deref()
        .is_some_and(|ct| ct.contains("html"))
        || html::looks_like_html(&String::from_utf8_lossy(&body));
    if is_error
        && html_shaped
        && let Some(text) = html::extract_error_text(&String::from_utf8_lossy(&body))
    {
        return DispatchOutcome {
            status,
            content_type: Some("text/plain".to_string()),
            body: Bytes::from(text),
            is_error,
        };
    }

    DispatchOutcome {
        status,
        content_type,
        body,
        is_error,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(StatusCode::NO_CONTENT, "Request succeeded with status 204 No Content", false)]
    #[case(StatusCode::NOT_FOUND, "Request failed with status 404 Not Found", true)]
    fn empty_bodies_get_a_status_message(
        #[case] status: StatusCode,
        #[case] message: &str,
        #[case] is_error: bool,
    ) {
        let outcome = outcome(status, Some("application/json".into()), Bytes::from_static(b"  "));
        assert_eq!(outcome.text(), message);
        assert_eq!(outcome.is_error, is_error);
        assert_eq!(outcome.content_type, None);
    }

    #[test]
    fn html_error_pages_are_reduced() {
        let outcome = outcome(
            StatusCode::BAD_GATEWAY,
            Some("text/html; charset=utf-8".into()),
            Bytes::from_static(b"<html><title>502</title><h1>Bad Gateway</h1><p>nginx</p></html>"),
        );
        assert_eq!(outcome.text(), "502\nBad Gateway");
        assert_eq!(outcome.content_type.as_deref(), Some("text/plain"));
        assert!(outcome.is_error);
    }

    #[test]
    fn successful_html_is_left_alone() {
        let page = "<html><title>Docs</title></html>";
        let outcome = outcome(StatusCode::OK, Some("text/html".into()), Bytes::from_static(page.as_bytes()));
        assert_eq!(outcome.text(), page);
        assert!(!outcome.is_error);
    }

    #[rstest]
    #[case("https://api.test/v1/items?page=2", "next", "https://api.test/next")]
    #[case("https://api.test/v1/items", "/v2/items", "https://api.test/v2/items")]
    #[case("https://api.test:8443/v1/", "moved", "https://api.test:8443/moved")]
    #[case("https://api.test/v1/items", "https://other.test/x", "https://other.test/x")]
    fn redirects_resolve_against_the_origin(
        #[case] url: &str,
        #[case] location: &str,
        #[case] expected: &str,
    ) {
        let url = Url::parse(url).unwrap();
        assert_eq!(redirect_target(&url, location).unwrap().as_str(), expected);
    }

    #[test]
    fn invalid_header_names_are_rejected() {
        let headers = IndexMap::from([("bad header".to_string(), "x".to_string())]);
        let err = header_map(&headers).unwrap_err();
        assert!(matches!(err, ActionError::InvalidHeader { name } if name == "bad header"));
    }
}
