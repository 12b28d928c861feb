//! Credential placement and redaction
//!
//! The credential ends up either in a header or in the query string. Every
//! placement carries the text that may be logged in its place.

use secrecy::{ExposeSecret, SecretString};

use crate::model::Api;

/// Replaces credentials in anything that is logged or traced.
pub const REDACTED: &str = "<REDACTED>";

/// Header used when an API does not name one.
pub const DEFAULT_AUTH_HEADER: &str = "Authorization";

/// Only these headers receive the `"<scheme> "` prefix.
const SCHEME_HEADERS: [&str; 4] = ["Authorization", "Proxy-Authorization", "x-api-key", "apiKey"];

/// Where a credential goes on the request.
#[derive(Debug)]
pub enum AuthPlacement {
    Header {
        name: String,
        value: SecretString,
        /// Log form, e.g. `Bearer <REDACTED>`
        redacted: String,
    },
    Query {
        name: String,
        value: SecretString,
        /// Log form: the raw value unless query redaction is enabled
        logged: String,
    },
}

impl AuthPlacement {
    /// Decide where `credential` goes for `api`.
    ///
    /// Returns `None` for query-parameter auth without a parameter name.
    pub fn for_api(api: &Api, credential: &SecretString, redact_query: bool) -> Option<Self> {
        if api.uses_query_auth() {
            let name = api
                .auth_query_param_name
                .as_deref()
                .filter(|name| !name.is_empty())?;
            let logged = if redact_query {
                REDACTED.to_string()
            } else {
                credential.expose_secret().to_string()
            };
            return Some(Self::Query {
                name: name.to_string(),
                value: SecretString::from(credential.expose_secret().to_string()),
                logged,
            });
        }

        let name = api
            .auth_header
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_AUTH_HEADER);
        let scheme = api
            .auth_scheme
            .as_deref()
            .map(str::trim)
            .filter(|scheme| !scheme.is_empty() && takes_scheme(name));

        let (value, redacted) = match scheme {
            Some(scheme) => (
                format!("{scheme} {}", credential.expose_secret()),
                format!("{scheme} {REDACTED}"),
            ),
            None => (credential.expose_secret().to_string(), REDACTED.to_string()),
        };
        Some(Self::Header {
            name: name.to_string(),
            value: SecretString::from(value),
            redacted,
        })
    }
}

fn takes_scheme(header: &str) -> bool {
    SCHEME_HEADERS
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(header))
}
