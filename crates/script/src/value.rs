//! Runtime values
//!
//! Arrays and objects are shared by reference, like in JS: cloning a
//! [`Value`] clones the handle, not the contents. Never hold one of the
//! container locks across an `.await`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{self, BoxFuture, Shared};
use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::error::{ScriptError, ScriptResult};
use crate::eval::Closure;

/// Containers nested deeper than this (usually cycles) are cut off when
/// converted to text or JSON.
const MAX_NESTING: usize = 128;

pub type ArrayRef = Arc<Mutex<Vec<Value>>>;
pub type ObjectRef = Arc<Mutex<IndexMap<String, Value>>>;

/// Synchronous builtin
pub type NativeFn = dyn Fn(&[Value]) -> ScriptResult<Value> + Send + Sync;

/// Asynchronous host function; its future is spawned as soon as it is called
pub type HostFn = dyn Fn(Vec<Value>) -> BoxFuture<'static, ScriptResult<Value>> + Send + Sync;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(Arc<Callable>),
    Promise(Promise),
}

/// Anything that can be called from a script
pub enum Callable {
    Closure(Closure),
    Native {
        name: Arc<str>,
        func: Arc<NativeFn>,
        /// Allowed after `new`
        constructor: bool,
    },
    Host {
        name: Arc<str>,
        func: Arc<HostFn>,
    },
    /// Builtin that calls back into script code
    Intrinsic(Intrinsic),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    /// `Array.from(source, mapFn?)`
    ArrayFrom,
}

impl Callable {
    pub fn name(&self) -> Arc<str> {
        match self {
            Self::Closure(closure) => closure.name(),
            Self::Native { name, .. } | Self::Host { name, .. } => Arc::clone(name),
            Self::Intrinsic(Intrinsic::ArrayFrom) => Arc::from("from"),
        }
    }
}

/// A settled-or-pending result. Awaiting the same promise twice yields the
/// same outcome.
#[derive(Clone)]
pub struct Promise(Shared<BoxFuture<'static, ScriptResult<Value>>>);

impl Promise {
    pub fn resolved(value: Value) -> Self {
        Self(future::ready(Ok(value)).boxed().shared())
    }

    pub fn rejected(error: ScriptError) -> Self {
        Self(future::ready(Err(error)).boxed().shared())
    }

    /// Wrap a future without starting it.
    pub fn lazy(fut: impl Future<Output = ScriptResult<Value>> + Send + 'static) -> Self {
        Self(fut.boxed().shared())
    }

    /// Start `fut` on the runtime right away so that un-awaited calls run
    /// concurrently.
    pub fn spawn(fut: impl Future<Output = ScriptResult<Value>> + Send + 'static) -> Self {
        let handle = tokio::spawn(fut);
        Self::lazy(async move {
            handle
                .await
                .map_err(|e| ScriptError::type_error(format!("host task failed: {e}")))?
        })
    }

    /// Resolve once every input resolves; reject with the first rejection.
    pub fn all(inputs: Vec<Value>) -> Self {
        let pending: Vec<_> = inputs.into_iter().map(Value::settle).collect();
        Self::lazy(async move {
            let values = future::try_join_all(pending).await?;
            Ok(Value::array(values))
        })
    }

    pub async fn settle(self) -> ScriptResult<Value> {
        self.0.await
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

impl Value {
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Self::String(s.into())
    }

    pub fn array(items: Vec<Value>) -> Self {
        Self::Array(Arc::new(Mutex::new(items)))
    }

    pub fn object(entries: IndexMap<String, Value>) -> Self {
        Self::Object(Arc::new(Mutex::new(entries)))
    }

    pub fn empty_object() -> Self {
        Self::object(IndexMap::new())
    }

    pub fn native(
        name: &str,
        func: impl Fn(&[Value]) -> ScriptResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self::Function(Arc::new(Callable::Native {
            name: Arc::from(name),
            func: Arc::new(func),
            constructor: false,
        }))
    }

    /// Native that may also be invoked with `new`, e.g. `Error`.
    pub fn native_constructor(
        name: &str,
        func: impl Fn(&[Value]) -> ScriptResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self::Function(Arc::new(Callable::Native {
            name: Arc::from(name),
            func: Arc::new(func),
            constructor: true,
        }))
    }

    pub fn host<F, Fut>(name: &str, func: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ScriptResult<Value>> + Send + 'static,
    {
        Self::Function(Arc::new(Callable::Host {
            name: Arc::from(name),
            func: Arc::new(move |args| func(args).boxed()),
        }))
    }

    /// `{ name, message }`, the shape produced by `new Error(...)`.
    pub fn error_object(name: &str, message: &str) -> Self {
        let mut entries = IndexMap::new();
        entries.insert("name".to_string(), Self::from(name));
        entries.insert("message".to_string(), Self::from(message));
        Self::object(entries)
    }

    /// Name and message of an error-shaped object.
    pub fn error_parts(&self) -> Option<(String, String)> {
        let Self::Object(object) = self else {
            return None;
        };
        let object = object.lock();
        match (object.get("name"), object.get("message")) {
            (Some(Self::String(name)), Some(Self::String(message))) if name.ends_with("Error") => {
                Some((name.to_string(), message.to_string()))
            }
            _ => None,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Array(_) | Self::Object(_) | Self::Function(_) | Self::Promise(_) => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Function(_) => "function",
            Self::Null | Self::Array(_) | Self::Object(_) | Self::Promise(_) => "object",
        }
    }

    /// Numeric conversion with JS coercion rules.
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => string_to_number(s),
            Self::Array(items) => {
                let single = match items.lock().as_slice() {
                    [] => return 0.0,
                    [single] => single.clone(),
                    _ => return f64::NAN,
                };
                match single {
                    Self::Array(_) => f64::NAN,
                    other => other.to_number(),
                }
            }
            Self::Object(_) | Self::Function(_) | Self::Promise(_) => f64::NAN,
        }
    }

    /// String conversion as done by `String(value)` and template literals.
    pub fn to_display_string(&self) -> String {
        self.display_nested(0)
    }

    fn display_nested(&self, depth: usize) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => number_to_string(*n),
            Self::String(s) => s.to_string(),
            Self::Array(_) if depth >= MAX_NESTING => String::new(),
            Self::Array(items) => {
                let items = items.lock().clone();
                items
                    .iter()
                    .map(|item| {
                        if item.is_nullish() {
                            String::new()
                        } else {
                            item.display_nested(depth + 1)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(",")
            }
            Self::Object(_) => match self.error_parts() {
                Some((name, message)) if message.is_empty() => name,
                Some((name, message)) => format!("{name}: {message}"),
                None => "[object Object]".to_string(),
            },
            Self::Function(callable) => format!("function {}() {{ [native code] }}", callable.name()),
            Self::Promise(_) => "[object Promise]".to_string(),
        }
    }

    /// Key used for property access, e.g. `obj[1]` reads `"1"`.
    pub fn to_property_key(&self) -> String {
        self.to_display_string()
    }

    /// JSON form; `None` for values JSON cannot represent (`undefined`,
    /// functions), which are dropped from objects and become `null` in arrays.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        self.json_nested(0)
    }

    fn json_nested(&self, depth: usize) -> Option<serde_json::Value> {
        use serde_json::Value as Json;
        Some(match self {
            Self::Undefined | Self::Function(_) => return None,
            Self::Array(_) | Self::Object(_) if depth >= MAX_NESTING => Json::Null,
            Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Number(n) => number_to_json(*n),
            Self::String(s) => Json::String(s.to_string()),
            Self::Array(items) => {
                let items = items.lock().clone();
                Json::Array(
                    items
                        .iter()
                        .map(|item| item.json_nested(depth + 1).unwrap_or(Json::Null))
                        .collect(),
                )
            }
            Self::Object(object) => {
                let entries = object.lock().clone();
                Json::Object(
                    entries
                        .iter()
                        .filter_map(|(key, value)| {
                            value.json_nested(depth + 1).map(|v| (key.clone(), v))
                        })
                        .collect(),
                )
            }
            Self::Promise(_) => Json::Object(serde_json::Map::new()),
        })
    }

    /// Like [`to_json`](Self::to_json) but never absent.
    pub fn to_json_lossy(&self) -> serde_json::Value {
        self.to_json().unwrap_or(serde_json::Value::Null)
    }

    pub fn from_json(json: &serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(*b),
            Json::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Self::string(s.as_str()),
            Json::Array(items) => Self::array(items.iter().map(Self::from_json).collect()),
            Json::Object(map) => Self::object(
                map.iter()
                    .map(|(key, value)| (key.clone(), Self::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// `===`
    pub fn strict_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => Arc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => Arc::ptr_eq(a, b),
            (Self::Promise(a), Self::Promise(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// `==`
    pub fn loose_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Self::Number(_), Self::String(_) | Self::Bool(_))
            | (Self::String(_) | Self::Bool(_), Self::Number(_))
            | (Self::Bool(_), Self::String(_))
            | (Self::String(_), Self::Bool(_)) => self.to_number() == other.to_number(),
            _ => self.strict_equals(other),
        }
    }

    /// Equality used by `includes`: like `===` but `NaN` equals `NaN`.
    pub fn same_value_zero(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }

    /// Await semantics: promises are settled (a promise resolved with
    /// another promise adopts its result), anything else passes through.
    pub async fn settle(self) -> ScriptResult<Value> {
        let mut current = self;
        while let Self::Promise(promise) = current {
            current = promise.settle().await?;
        }
        Ok(current)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Rendering used by `console.*`: strings as-is, everything else in the
    /// JSON-like inspect form.
    pub fn to_log_string(&self) -> String {
        match self {
            Self::String(s) => s.to_string(),
            other => other.inspect(),
        }
    }

    /// Developer-facing rendering, e.g. `{ a: 1, b: [ 'x' ] }`.
    pub fn inspect(&self) -> String {
        let mut out = String::new();
        self.inspect_into(&mut out, 0);
        out
    }

    fn inspect_into(&self, out: &mut String, depth: usize) {
        const MAX_DEPTH: usize = 4;
        match self {
            Self::String(s) if depth > 0 => {
                out.push('\'');
                out.push_str(&s.replace('\'', "\\'"));
                out.push('\'');
            }
            Self::Array(items) => {
                if depth >= MAX_DEPTH {
                    out.push_str("[Array]");
                    return;
                }
                let items = items.lock().clone();
                if items.is_empty() {
                    out.push_str("[]");
                    return;
                }
                out.push_str("[ ");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.inspect_into(out, depth + 1);
                }
                out.push_str(" ]");
            }
            Self::Object(object) => {
                if let Some((name, message)) = self.error_parts() {
                    out.push_str(&format!("{name}: {message}"));
                    return;
                }
                if depth >= MAX_DEPTH {
                    out.push_str("[Object]");
                    return;
                }
                let entries = object.lock().clone();
                if entries.is_empty() {
                    out.push_str("{}");
                    return;
                }
                out.push_str("{ ");
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    if is_plain_identifier(key) {
                        out.push_str(key);
                    } else {
                        out.push_str(&format!("'{key}'"));
                    }
                    out.push_str(": ");
                    value.inspect_into(out, depth + 1);
                }
                out.push_str(" }");
            }
            Self::Function(callable) => out.push_str(&format!("[Function: {}]", callable.name())),
            Self::Promise(_) => out.push_str("Promise { <pending> }"),
            other => out.push_str(&other.to_display_string()),
        }
    }
}

fn is_plain_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn number_to_json(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

/// `Number("...")` coercion.
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    let radix = |prefix_len: usize, radix: u32| {
        u64::from_str_radix(&trimmed[prefix_len..], radix).map_or(f64::NAN, |v| v as f64)
    };
    match trimmed.get(..2) {
        Some("0x" | "0X") => return radix(2, 16),
        Some("0o" | "0O") => return radix(2, 8),
        Some("0b" | "0B") => return radix(2, 2),
        _ => {}
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')) =>
        {
            trimmed.parse().unwrap_or(f64::NAN)
        }
        _ => f64::NAN,
    }
}

/// JS `Number.prototype.toString()` for base 10.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if abs >= 1e21 || abs < 1e-6 {
        let formatted = format!("{n:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => formatted,
        };
    }
    if n.fract() == 0.0 {
        return format!("{n:.0}");
    }
    n.to_string()
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s:?}"),
            other => f.write_str(&other.inspect()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(Arc::from(s))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::array(items)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case(1.0, "1")]
    #[case(-42.0, "-42")]
    #[case(0.1 + 0.2, "0.30000000000000004")]
    #[case(1.5, "1.5")]
    #[case(-0.0, "0")]
    #[case(1e21, "1e+21")]
    #[case(1.5e-7, "1.5e-7")]
    #[case(f64::NAN, "NaN")]
    #[case(f64::NEG_INFINITY, "-Infinity")]
    fn numbers_print_like_js(#[case] n: f64, #[case] expected: &str) {
        assert_eq!(number_to_string(n), expected);
    }

    #[rstest]
    #[case("", 0.0)]
    #[case("  12 ", 12.0)]
    #[case("0x1f", 31.0)]
    #[case("1e3", 1000.0)]
    #[case("-Infinity", f64::NEG_INFINITY)]
    fn string_coercion(#[case] input: &str, #[case] expected: f64) {
        assert_eq!(string_to_number(input), expected);
    }

    #[test]
    fn non_numeric_strings_are_nan() {
        assert!(string_to_number("12px").is_nan());
    }

    #[test]
    fn truthiness_follows_js() {
        assert!(Value::array(vec![]).is_truthy());
        assert!(Value::empty_object().is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
    }

    #[test]
    fn json_drops_undefined_fields_and_keeps_integers() {
        let value = Value::from_json(&json!({"a": 1, "b": [1.5, null]}));
        if let Value::Object(object) = &value {
            object.lock().insert("skip".into(), Value::Undefined);
        }
        assert_eq!(value.to_json(), Some(json!({"a": 1, "b": [1.5, null]})));
        assert_eq!(value.to_json_lossy().to_string(), r#"{"a":1,"b":[1.5,null]}"#);
    }

    #[test]
    fn containers_compare_by_identity() {
        let a = Value::array(vec![Value::from(1.0)]);
        let b = Value::array(vec![Value::from(1.0)]);
        assert!(a.strict_equals(&a.clone()));
        assert!(!a.strict_equals(&b));
    }

    #[test]
    fn loose_equality_coerces() {
        assert!(Value::from("1").loose_equals(&Value::from(1.0)));
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.loose_equals(&Value::from(0.0)));
    }

    #[test]
    fn inspect_nested_values() {
        let value = Value::from_json(&json!({"id": 1, "tags": ["a"], "odd-key": null}));
        assert_eq!(value.inspect(), "{ id: 1, tags: [ 'a' ], 'odd-key': null }");
    }

    #[test]
    fn error_objects_display_with_name() {
        let err = Value::error_object("TypeError", "nope");
        assert_eq!(err.to_display_string(), "TypeError: nope");
        assert_eq!(err.error_parts(), Some(("TypeError".into(), "nope".into())));
    }

    #[tokio::test]
    async fn promise_all_collects_in_order() {
        let all = Promise::all(vec![
            Value::Promise(Promise::resolved(Value::from(1.0))),
            Value::from(2.0),
        ]);
        let result = all.settle().await.unwrap();
        assert_eq!(result.to_json(), Some(json!([1, 2])));
    }

    #[tokio::test]
    async fn promise_all_rejects_with_first_error() {
        let all = Promise::all(vec![
            Value::Promise(Promise::rejected(ScriptError::type_error("boom"))),
            Value::from(2.0),
        ]);
        let err = all.settle().await.unwrap_err();
        assert_eq!(err.message(), "boom");
    }
}
