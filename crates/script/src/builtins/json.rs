//! `JSON.stringify` and `JSON.parse`

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use super::arg;
use crate::error::{ScriptError, ScriptResult};
use crate::value::Value;

/// Longest indent accepted by `JSON.stringify`
const MAX_INDENT: usize = 10;

pub(super) fn object() -> Value {
    let mut members = IndexMap::new();
    members.insert(
        "stringify".to_string(),
        Value::native("stringify", |args| stringify(&arg(args, 0), &arg(args, 2))),
    );
    members.insert(
        "parse".to_string(),
        Value::native("parse", |args| parse(&arg(args, 0).to_display_string())),
    );
    Value::object(members)
}

fn indent_of(space: &Value) -> String {
    match space {
        Value::Number(n) if *n >= 1.0 => " ".repeat((*n as usize).min(MAX_INDENT)),
        Value::String(s) => s.chars().take(MAX_INDENT).collect(),
        _ => String::new(),
    }
}

/// `JSON.stringify(value, replacer, space)`; the replacer is ignored.
pub(crate) fn stringify(value: &Value, space: &Value) -> ScriptResult<Value> {
    let Some(json) = value.to_json() else {
        return Ok(Value::Undefined);
    };
    let indent = indent_of(space);
    if indent.is_empty() {
        return Ok(Value::from(json.to_string()));
    }

    let mut out = Vec::new();
    let mut serializer =
        Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(indent.as_bytes()));
    json.serialize(&mut serializer)
        .map_err(|e| ScriptError::type_error(e.to_string()))?;
    Ok(Value::from(String::from_utf8_lossy(&out).into_owned()))
}

/// `JSON.parse(text)`; malformed input throws a `SyntaxError` object.
pub(crate) fn parse(text: &str) -> ScriptResult<Value> {
    serde_json::from_str::<serde_json::Value>(text)
        .map(|json| Value::from_json(&json))
        .map_err(|e| {
            ScriptError::thrown(Value::error_object(
                "SyntaxError",
                &format!("{e} in JSON"),
            ))
        })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn stringify_keeps_insertion_order() {
        let value = parse(r#"{"b":1,"a":[true,null]}"#).unwrap();
        let text = stringify(&value, &Value::Undefined).unwrap();
        assert_eq!(text.to_display_string(), r#"{"b":1,"a":[true,null]}"#);
    }

    #[test]
    fn stringify_indents() {
        let value = parse(r#"{"a":1}"#).unwrap();
        let text = stringify(&value, &Value::from(2.0)).unwrap();
        assert_eq!(text.to_display_string(), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn stringify_of_undefined_is_undefined() {
        let text = stringify(&Value::Undefined, &Value::Undefined).unwrap();
        assert!(matches!(text, Value::Undefined));
    }

    #[test]
    fn malformed_input_throws_syntax_error() {
        let err = parse("{oops").unwrap_err();
        assert_eq!(err.name(), "SyntaxError");
    }
}
