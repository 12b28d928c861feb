//! Shared-secret admission

use axum::http::{HeaderMap, header};
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

/// Characters of the presented token used as the rate-limit key.
const CALLER_KEY_LEN: usize = 8;

/// The token of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|token| !token.is_empty())
}

/// Constant-time comparison against the configured secret.
pub fn verify(token: &str, secret: &SecretString) -> bool {
    token
        .as_bytes()
        .ct_eq(secret.expose_secret().as_bytes())
        .into()
}

/// Rate-limit key of an admitted caller: the token's last characters.
pub fn caller_key(token: &str) -> String {
    let start = token
        .char_indices()
        .rev()
        .nth(CALLER_KEY_LEN - 1)
        .map_or(0, |(index, _)| index);
    token[start..].to_string()
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use rstest::rstest;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[rstest]
    #[case("Bearer abc", Some("abc"))]
    #[case("bearer abc", Some("abc"))]
    #[case("Basic abc", None)]
    #[case("Bearer ", None)]
    #[case("abc", None)]
    fn extracts_bearer_tokens(#[case] value: &str, #[case] token: Option<&str>) {
        assert_eq!(bearer_token(&headers(value)), token);
    }

    #[test]
    fn missing_header_has_no_token() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn verifies_exact_secret_only() {
        let secret = SecretString::from("service-secret".to_string());
        assert!(verify("service-secret", &secret));
        assert!(!verify("service-secre", &secret));
        assert!(!verify("service-secret!", &secret));
    }

    #[rstest]
    #[case("0123456789abcdef", "89abcdef")]
    #[case("short", "short")]
    #[case("12345678", "12345678")]
    fn caller_key_is_the_token_suffix(#[case] token: &str, #[case] key: &str) {
        assert_eq!(caller_key(token), key);
    }
}
