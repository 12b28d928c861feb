//! Request construction from an action definition and call parameters

use std::fmt;
use std::sync::LazyLock;

use http::Method;
use indexmap::IndexMap;
use regex::{Captures, Regex};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::auth::AuthPlacement;
use crate::error::{ActionError, ActionResult};
use crate::model::{ActionDefinition, Org, ParameterLocation};

/// `{name}` in an action path
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]+)\}").expect("placeholder pattern is valid"));

/// Engine-wide switches for request construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Hosts starting with this prefix receive `org-id`/`org-name` headers.
    pub mock_api_host: Option<String>,
    /// Redact query-parameter credentials in logs and traces.
    pub redact_query_auth: bool,
}

/// Per-execution inputs of the builder.
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    pub org: &'a Org,
    pub credential: Option<&'a SecretString>,
}

/// What gets logged and traced for a request: credentials already redacted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestLog {
    pub method: String,
    pub url: String,
    pub headers: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl RequestLog {
    /// Multi-line rendering: request line, headers, then the pretty body.
    pub fn human_format(&self) -> String {
        let mut out = format!("{} {}", self.method, self.url);
        for (name, value) in &self.headers {
            out.push_str(&format!("\n{name}: {value}"));
        }
        if let Some(body) = &self.body {
            let pretty = serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string());
            out.push_str("\n\n");
            out.push_str(&pretty);
        }
        out
    }
}

/// A request ready to be dispatched.
#[derive(Clone)]
pub struct PreparedRequest {
    /// Call name of the action this request belongs to
    pub action: String,
    pub method: Method,
    pub url: Url,
    pub headers: IndexMap<String, String>,
    pub body: Option<String>,
    pub log: RequestLog,
}

impl fmt::Debug for PreparedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedRequest")
            .field("action", &self.action)
            .field("method", &self.method)
            .field("url", &self.log.url)
            .field("headers", &self.log.headers)
            .finish_non_exhaustive()
    }
}

/// Build the concrete request for calling `action` with `params`.
pub fn build_request(
    action: &ActionDefinition,
    params: &Map<String, Value>,
    ctx: CallContext<'_>,
    options: &BuildOptions,
) -> ActionResult<PreparedRequest> {
    let name = action.call_name();
    let path = action
        .path
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ActionError::config(&name, "missing path"))?;
    let method = action
        .http_method
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ActionError::config(&name, "missing method"))?;
    let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| ActionError::config(&name, format!("invalid method `{method}`")))?;
    let host = action
        .api
        .api_host
        .as_deref()
        .filter(|h| !h.trim().is_empty())
        .ok_or_else(|| ActionError::config(&name, "missing host"))?;

    let body_schema = action
        .request_body_schema
        .as_ref()
        .filter(|_| method != Method::GET);

    let mut headers = IndexMap::new();
    headers.insert("Accept".to_string(), "application/json".to_string());
    if body_schema.is_some() {
        headers.insert("Content-Type".to_string(), "application/json".to_string());
    }
    for header in action.api.headers.iter().filter(|h| !h.name.is_empty()) {
        set_header(&mut headers, &header.name, header.value.clone());
    }

    let mut path_values = IndexMap::new();
    let mut query = Vec::new();
    let mut cookies = Vec::new();
    for param in &action.parameters {
        let Some(value) = param.fixed_value().or_else(|| lookup(params, &param.name)) else {
            continue;
        };
        let text = param_text(value);
        match &param.location {
            ParameterLocation::Path => {
                path_values.insert(param.name.as_str(), text);
            }
            ParameterLocation::Query => query.push((param.name.clone(), text)),
            ParameterLocation::Header => set_header(&mut headers, &param.name, text),
            ParameterLocation::Cookie => cookies.push(format!("{}={text}", param.name)),
            ParameterLocation::Other(location) => {
                return Err(ActionError::config(
                    &name,
                    format!(
                        "parameter `{}` has unsupported location `{location}`",
                        param.name
                    ),
                ));
            }
        }
    }
    let path = fill_path(path, &path_values).map_err(|placeholder| {
        ActionError::config(
            &name,
            format!("missing value for path parameter `{placeholder}`"),
        )
    })?;
    if !cookies.is_empty() {
        set_header(&mut headers, "Cookie", cookies.join("; "));
    }

    let body = body_schema.map(|schema| {
        let object: Map<String, Value> = schema
            .writable_properties()
            .filter_map(|property| {
                lookup(params, property).map(|value| (property.to_string(), value.clone()))
            })
            .collect();
        Value::Object(object)
    });

    if let Some(prefix) = options.mock_api_host.as_deref()
        && !prefix.is_empty()
        && host.starts_with(prefix)
    {
        set_header(&mut headers, "org-id", ctx.org.id.clone());
        set_header(&mut headers, "org-name", ctx.org.name.clone());
    }

    let joined = format!(
        "{}/{}",
        host.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    let mut url = Url::parse(&joined)
        .map_err(|e| ActionError::config(&name, format!("invalid URL `{joined}`: {e}")))?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(&query);
    }

    let auth = ctx.credential.and_then(|credential| {
        AuthPlacement::for_api(&action.api, credential, options.redact_query_auth)
    });
    let mut log_url = url.clone();
    let mut log_headers = headers.clone();
    match auth {
        Some(AuthPlacement::Header {
            name: header,
            value,
            redacted,
        }) => {
            set_header(&mut log_headers, &header, redacted);
            set_header(&mut headers, &header, value.expose_secret().to_string());
        }
        Some(AuthPlacement::Query {
            name: param,
            value,
            logged,
        }) => {
            url.query_pairs_mut()
                .append_pair(&param, value.expose_secret());
            log_url.query_pairs_mut().append_pair(&param, &logged);
        }
        None => {}
    }

    let log = RequestLog {
        method: method.to_string(),
        url: log_url.to_string(),
        headers: log_headers,
        body: body.clone(),
    };
    debug!(action = %name, method = %log.method, url = %log.url, headers = ?log.headers, "built request");

    Ok(PreparedRequest {
        action: name,
        method,
        url,
        headers,
        body: body.map(|b| b.to_string()),
        log,
    })
}

/// Look a parameter up by name, treating `-` and `_` as the same character.
/// On collisions the first key in insertion order wins.
fn lookup<'p>(params: &'p Map<String, Value>, name: &str) -> Option<&'p Value> {
    let found = params.get(name).or_else(|| {
        let wanted = normalize(name);
        params
            .iter()
            .find(|(key, _)| normalize(key) == wanted)
            .map(|(_, value)| value)
    });
    found.filter(|value| !value.is_null())
}

fn normalize(key: &str) -> String {
    key.replace('-', "_")
}

/// Text form of a parameter value: strings raw, arrays comma-joined.
fn param_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(param_text).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

/// Header names are case-insensitive: a later value replaces any earlier
/// spelling of the same name.
fn set_header(headers: &mut IndexMap<String, String>, name: &str, value: String) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value);
}

/// Substitute every `{name}` of `path`. Fails with the first placeholder
/// that has no value.
fn fill_path(path: &str, values: &IndexMap<&str, String>) -> Result<String, String> {
    let mut missing = None;
    let filled = PLACEHOLDER.replace_all(path, |caps: &Captures<'_>| {
        if let Some(value) = values.get(&caps[1]) {
            return value.clone();
        }
        missing.get_or_insert_with(|| caps[1].to_string());
        caps[0].to_string()
    });
    match missing {
        Some(placeholder) => Err(placeholder),
        None => Ok(filled.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::model::{Api, Header, QUERY_PARAMETER_AUTH};

    fn action(value: Value) -> ActionDefinition {
        serde_json::from_value(value).unwrap()
    }

    fn issues_action() -> ActionDefinition {
        action(json!({
            "name": "create_issue",
            "http_method": "post",
            "path": "/repos/{owner}/{repo}/issues",
            "parameters": [
                {"name": "owner", "in": "path", "required": true},
                {"name": "repo", "in": "path", "required": true},
                {"name": "dry-run", "in": "query"},
                {"name": "labels", "in": "query"},
                {"name": "X-Trace", "in": "header"},
                {"name": "session", "in": "cookie"},
                {"name": "theme", "in": "cookie"},
                {"name": "api_version", "in": "query", "required": true,
                 "schema": {"enum": ["2022-11-28"]}}
            ],
            "request_body_schema": {
                "properties": {
                    "title": {"type": "string"},
                    "number": {"type": "integer", "readOnly": true},
                    "body": {"type": "string"}
                }
            },
            "api": {
                "api_host": "https://api.example.com/v3/",
                "auth_header": "Authorization",
                "auth_scheme": "Bearer",
                "headers": [{"name": "X-Client", "value": "sluice"}, {"name": "", "value": "x"}]
            }
        }))
    }

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("params must be an object"),
        }
    }

    fn build(
        action: &ActionDefinition,
        params: &Map<String, Value>,
        credential: Option<&SecretString>,
        options: &BuildOptions,
    ) -> ActionResult<PreparedRequest> {
        let org = Org {
            id: "org_1".into(),
            name: "Acme".into(),
            description: None,
        };
        build_request(action, params, CallContext { org: &org, credential }, options)
    }

    #[test]
    fn routes_every_parameter_location() {
        let secret = SecretString::from("tok".to_string());
        let request = build(
            &issues_action(),
            &params(json!({
                "owner": "acme",
                "repo": "api",
                "dry_run": true,
                "labels": ["bug", "p1"],
                "X-Trace": "abc",
                "session": "s1",
                "theme": "dark",
                "api_version": "ignored",
                "title": "Broken",
                "number": 7
            })),
            Some(&secret),
            &BuildOptions::default(),
        )
        .unwrap();

        assert_eq!(request.action, "createIssue");
        assert_eq!(request.method, Method::POST);
        assert_eq!(
            request.url.as_str(),
            "https://api.example.com/v3/repos/acme/api/issues?dry-run=true&labels=bug%2Cp1&api_version=2022-11-28"
        );
        assert_eq!(request.headers["Accept"], "application/json");
        assert_eq!(request.headers["Content-Type"], "application/json");
        assert_eq!(request.headers["X-Client"], "sluice");
        assert!(!request.headers.contains_key(""));
        assert_eq!(request.headers["X-Trace"], "abc");
        assert_eq!(request.headers["Cookie"], "session=s1; theme=dark");
        assert_eq!(request.headers["Authorization"], "Bearer tok");
        assert_eq!(request.log.headers["Authorization"], "Bearer <REDACTED>");
        assert_eq!(request.body.as_deref(), Some(r#"{"title":"Broken"}"#));
    }

    #[test]
    fn get_requests_have_no_body() {
        let mut action = issues_action();
        action.http_method = Some("GET".into());
        let request = build(
            &action,
            &params(json!({"owner": "a", "repo": "b", "title": "x"})),
            None,
            &BuildOptions::default(),
        )
        .unwrap();
        assert!(request.body.is_none());
        assert!(!request.headers.contains_key("Content-Type"));
        assert!(!request.headers.contains_key("Authorization"));
    }

    #[rstest]
    #[case(json!({"owner": "a"}), "missing value for path parameter `repo`")]
    #[case(json!({}), "missing value for path parameter `owner`")]
    fn unfilled_placeholders_are_config_errors(#[case] input: Value, #[case] message: &str) {
        let err = build(
            &issues_action(),
            &params(input),
            None,
            &BuildOptions::default(),
        )
        .unwrap_err();
        let ActionError::Config { message: actual, .. } = err else {
            panic!("expected a config error, got {err:?}");
        };
        assert_eq!(actual, message);
    }

    #[rstest]
    #[case("path", "missing path")]
    #[case("http_method", "missing method")]
    #[case("host", "missing host")]
    fn missing_fields(#[case] field: &str, #[case] message: &str) {
        let mut action = issues_action();
        match field {
            "path" => action.path = None,
            "http_method" => action.http_method = None,
            _ => action.api.api_host = Some(String::new()),
        }
        let err = build(&action, &Map::new(), None, &BuildOptions::default()).unwrap_err();
        assert!(err.to_string().ends_with(message), "{err}");
    }

    #[test]
    fn unsupported_location_is_an_error_when_used() {
        let action = action(json!({
            "name": "odd",
            "http_method": "GET",
            "path": "/x",
            "parameters": [{"name": "payload", "in": "body"}],
            "api": {"api_host": "https://api.example.com"}
        }));
        assert!(build(&action, &Map::new(), None, &BuildOptions::default()).is_ok());
        let err = build(
            &action,
            &params(json!({"payload": 1})),
            None,
            &BuildOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ActionError::Config { .. }));
    }

    #[test]
    fn query_auth_goes_to_the_url() {
        let action = ActionDefinition {
            name: "search".into(),
            description: None,
            http_method: Some("GET".into()),
            path: Some("search".into()),
            parameters: Vec::new(),
            request_body_schema: None,
            keys_to_keep: None,
            api: Api {
                api_host: Some("https://api.example.com".into()),
                auth_header: Some(QUERY_PARAMETER_AUTH.into()),
                auth_scheme: None,
                auth_query_param_name: Some("key".into()),
                headers: vec![Header {
                    name: "X-Client".into(),
                    value: "sluice".into(),
                }],
            },
        };
        let secret = SecretString::from("k1".to_string());
        let options = BuildOptions {
            redact_query_auth: true,
            ..BuildOptions::default()
        };
        let request = build(&action, &Map::new(), Some(&secret), &options).unwrap();
        assert_eq!(request.url.as_str(), "https://api.example.com/search?key=k1");
        assert_eq!(
            request.log.url,
            "https://api.example.com/search?key=%3CREDACTED%3E"
        );
        assert!(!request.headers.contains_key("Authorization"));
    }

    #[test]
    fn mock_hosts_receive_org_headers() {
        let options = BuildOptions {
            mock_api_host: Some("https://api.example.com".into()),
            ..BuildOptions::default()
        };
        let request = build(
            &issues_action(),
            &params(json!({"owner": "a", "repo": "b"})),
            None,
            &options,
        )
        .unwrap();
        assert_eq!(request.headers["org-id"], "org_1");
        assert_eq!(request.headers["org-name"], "Acme");
    }

    #[test]
    fn human_format_lists_headers_and_body() {
        let log = RequestLog {
            method: "POST".into(),
            url: "https://api.example.com/items".into(),
            headers: IndexMap::from([
                ("Accept".to_string(), "application/json".to_string()),
                ("Authorization".to_string(), "Bearer <REDACTED>".to_string()),
            ]),
            body: Some(json!({"a": 1})),
        };
        assert_eq!(
            log.human_format(),
            "POST https://api.example.com/items\nAccept: application/json\nAuthorization: Bearer <REDACTED>\n\n{\n  \"a\": 1\n}"
        );
    }

    #[test]
    fn auth_header_replaces_a_fixed_header_of_any_case() {
        let mut action = issues_action();
        action.api.headers.push(Header {
            name: "authorization".into(),
            value: "Basic stale".into(),
        });
        action.api.headers.push(Header {
            name: "x-client".into(),
            value: "override".into(),
        });
        let secret = SecretString::from("tok".to_string());
        let request = build(
            &action,
            &params(json!({"owner": "a", "repo": "b"})),
            Some(&secret),
            &BuildOptions::default(),
        )
        .unwrap();

        let named = |headers: &IndexMap<String, String>, wanted: &str| {
            headers
                .iter()
                .filter(|(name, _)| name.eq_ignore_ascii_case(wanted))
                .map(|(_, value)| value.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(named(&request.headers, "authorization"), ["Bearer tok"]);
        assert_eq!(named(&request.log.headers, "authorization"), ["Bearer <REDACTED>"]);
        assert_eq!(named(&request.headers, "x-client"), ["override"]);
        assert_eq!(request.log.human_format().matches("uthorization:").count(), 1);
    }

    #[rstest]
    #[case("/items/{id}/tags/{tag}", Ok("/items/7/tags/x%2Fy"))]
    #[case("/items/{id}/{missing}/{other}", Err("missing"))]
    #[case("/plain", Ok("/plain"))]
    fn path_placeholders(#[case] path: &str, #[case] expected: Result<&str, &str>) {
        let values = IndexMap::from([("id", "7".to_string()), ("tag", "x%2Fy".to_string())]);
        assert_eq!(fill_path(path, &values).as_deref().map_err(String::as_str), expected);
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let values = IndexMap::from([("a", "{b}".to_string())]);
        assert_eq!(fill_path("/{a}", &values).unwrap(), "/{b}");
    }

    #[test]
    fn first_matching_key_wins_on_separator_collisions() {
        let map = params(json!({"page_size": 1, "page-size": 2}));
        assert_eq!(lookup(&map, "page-size"), Some(&json!(2)));
        assert_eq!(lookup(&map, "page.size"), None);
        let map = params(json!({"a_b": 1, "a-b-": 2}));
        assert_eq!(lookup(&map, "a-b"), Some(&json!(1)));
    }
}
