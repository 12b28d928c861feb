//! Action definitions as they arrive with an execution request
//!
//! Everything here is request scoped: built from the inbound payload,
//! read by the request builder and dropped with the response.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// `auth_header` value that moves the credential into the query string.
pub const QUERY_PARAMETER_AUTH: &str = "Query parameter";

/// A header attached to every request of an [`Api`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Host and auth configuration shared by a group of actions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Api {
    #[serde(alias = "apiHost")]
    pub api_host: Option<String>,
    /// Header that carries the credential, or [`QUERY_PARAMETER_AUTH`].
    #[serde(alias = "authHeader")]
    pub auth_header: Option<String>,
    /// `Bearer`, `Basic`, ...
    #[serde(alias = "authScheme")]
    pub auth_scheme: Option<String>,
    #[serde(alias = "authQueryParamName")]
    pub auth_query_param_name: Option<String>,
    pub headers: Vec<Header>,
}

impl Api {
    pub fn uses_query_auth(&self) -> bool {
        self.auth_header.as_deref() == Some(QUERY_PARAMETER_AUTH)
    }
}

/// Where a parameter goes in the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
    /// Anything else; rejected when the request is built.
    Other(String),
}

impl From<String> for ParameterLocation {
    fn from(value: String) -> Self {
        match value.as_str() {
            "path" => Self::Path,
            "query" => Self::Query,
            "header" => Self::Header,
            "cookie" => Self::Cookie,
            _ => Self::Other(value),
        }
    }
}

impl From<ParameterLocation> for String {
    fn from(value: ParameterLocation) -> Self {
        match value {
            ParameterLocation::Path => "path".into(),
            ParameterLocation::Query => "query".into(),
            ParameterLocation::Header => "header".into(),
            ParameterLocation::Cookie => "cookie".into(),
            ParameterLocation::Other(other) => other,
        }
    }
}

/// One declared parameter of an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in", alias = "location")]
    pub location: ParameterLocation,
    #[serde(default)]
    pub required: bool,
    /// JSON schema of the value
    #[serde(default)]
    pub schema: Option<serde_json::Value>,
}

impl Parameter {
    /// The only value a required single-value enum allows.
    pub fn fixed_value(&self) -> Option<&serde_json::Value> {
        if !self.required {
            return None;
        }
        match self.schema.as_ref()?.get("enum")?.as_array()?.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

/// JSON request body schema (`application/json` only).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodySchema {
    pub properties: IndexMap<String, serde_json::Value>,
    pub required: Vec<String>,
}

impl BodySchema {
    /// Properties a client may send, i.e. those not marked `readOnly`.
    pub fn writable_properties(&self) -> impl Iterator<Item = &str> {
        self.properties
            .iter()
            .filter(|(_, schema)| {
                !schema
                    .get("readOnly")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false)
            })
            .map(|(name, _)| name.as_str())
    }
}

/// One HTTP operation the sandbox may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "httpMethod", alias = "method")]
    pub http_method: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default, alias = "requestBodySchema")]
    pub request_body_schema: Option<BodySchema>,
    /// Response keys to retain; everything else is filtered out
    #[serde(default, alias = "keysToKeep")]
    pub keys_to_keep: Option<Vec<String>>,
    pub api: Api,
}

impl ActionDefinition {
    /// Name under which the action is callable from a script,
    /// e.g. `list_open-issues` becomes `listOpenIssues`.
    pub fn call_name(&self) -> String {
        to_camel_case(&self.name)
    }
}

/// The tenant a request runs for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Org {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

pub(crate) fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '$' {
            if upper_next && !out.is_empty() {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
            upper_next = false;
        } else {
            upper_next = true;
        }
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("get_user", "getUser")]
    #[case("list_open-issues", "listOpenIssues")]
    #[case("search", "search")]
    #[case("_private_call", "privateCall")]
    #[case("2fa_enable", "_2faEnable")]
    #[case("send message now", "sendMessageNow")]
    fn call_names(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(to_camel_case(name), expected);
    }

    #[test]
    fn deserializes_a_definition() {
        let action: ActionDefinition = serde_json::from_value(serde_json::json!({
            "name": "get_user",
            "http_method": "GET",
            "path": "/users/{id}",
            "parameters": [
                {"name": "id", "in": "path", "required": true},
                {"name": "version", "in": "query", "required": true,
                 "schema": {"type": "string", "enum": ["v2"]}},
                {"name": "trace", "in": "body"}
            ],
            "api": {"api_host": "https://api.example.com", "auth_header": "Authorization",
                    "auth_scheme": "Bearer", "headers": [{"name": "X-Client", "value": "sluice"}]}
        }))
        .unwrap();

        assert_eq!(action.call_name(), "getUser");
        assert_eq!(action.parameters[0].location, ParameterLocation::Path);
        assert_eq!(
            action.parameters[1].fixed_value(),
            Some(&serde_json::json!("v2"))
        );
        assert_eq!(
            action.parameters[2].location,
            ParameterLocation::Other("body".into())
        );
        assert!(!action.api.uses_query_auth());
    }

    #[test]
    fn read_only_properties_are_not_writable() {
        let schema: BodySchema = serde_json::from_value(serde_json::json!({
            "properties": {
                "id": {"type": "integer", "readOnly": true},
                "title": {"type": "string"}
            }
        }))
        .unwrap();
        assert_eq!(schema.writable_properties().collect::<Vec<_>>(), ["title"]);
    }
}
