//! The execution trace
//!
//! Every observable effect of a snippet is one [`BuiltinFunctionCall`],
//! appended in the order it happened. The trace is never reordered or
//! deduplicated.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One trace event, serialized as `{"type": ..., "args": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "args", rename_all = "kebab-case")]
pub enum BuiltinFunctionCall {
    /// An action was called with these parameters.
    Call(CallArgs),
    /// The request an action call produced, credentials redacted.
    CallHumanFormat(HumanFormatArgs),
    Plot(PlotArgs),
    Log(MessageArgs),
    Error(MessageArgs),
}

impl BuiltinFunctionCall {
    pub fn log(message: impl Into<String>) -> Self {
        Self::Log(MessageArgs {
            message: message.into(),
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(MessageArgs {
            message: message.into(),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Call(_) => "call",
            Self::CallHumanFormat(_) => "call-human-format",
            Self::Plot(_) => "plot",
            Self::Log(_) => "log",
            Self::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallArgs {
    pub name: String,
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanFormatArgs {
    pub name: String,
    pub request: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotArgs {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageArgs {
    pub message: String,
}

/// Append-only event list shared by the bindings of one execution.
#[derive(Debug, Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<BuiltinFunctionCall>>>);

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: BuiltinFunctionCall) {
        self.0.lock().push(event);
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Copy of the events recorded so far.
    pub fn snapshot(&self) -> Vec<BuiltinFunctionCall> {
        self.0.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn events_serialize_with_kebab_case_tags() {
        let events = vec![
            BuiltinFunctionCall::Call(CallArgs {
                name: "getUser".into(),
                params: json!({"id": 1}).as_object().cloned().unwrap(),
            }),
            BuiltinFunctionCall::CallHumanFormat(HumanFormatArgs {
                name: "getUser".into(),
                request: "GET https://api.example.com/users/1".into(),
            }),
            BuiltinFunctionCall::Plot(PlotArgs {
                title: "Signups".into(),
                kind: "bar".into(),
                data: json!([1, 2]),
                labels: None,
            }),
            BuiltinFunctionCall::log("hello"),
            BuiltinFunctionCall::error("boom"),
        ];

        assert_eq!(
            serde_json::to_value(&events).unwrap(),
            json!([
                {"type": "call", "args": {"name": "getUser", "params": {"id": 1}}},
                {"type": "call-human-format", "args": {"name": "getUser", "request": "GET https://api.example.com/users/1"}},
                {"type": "plot", "args": {"title": "Signups", "type": "bar", "data": [1, 2]}},
                {"type": "log", "args": {"message": "hello"}},
                {"type": "error", "args": {"message": "boom"}}
            ])
        );
        let kinds: Vec<_> = events.iter().map(BuiltinFunctionCall::kind).collect();
        assert_eq!(kinds, ["call", "call-human-format", "plot", "log", "error"]);
    }

    #[test]
    fn clones_share_one_event_list() {
        let trace = Trace::new();
        let other = trace.clone();
        other.push(BuiltinFunctionCall::log("a"));
        trace.push(BuiltinFunctionCall::log("b"));
        assert_eq!(
            trace.snapshot(),
            vec![BuiltinFunctionCall::log("a"), BuiltinFunctionCall::log("b")]
        );
        assert_eq!(other.len(), 2);
    }
}
