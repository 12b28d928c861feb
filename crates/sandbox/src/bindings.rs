//! The binding table a snippet sees: one async function per action, plus
//! `console` and `plot`.

use std::sync::Arc;

use indexmap::IndexMap;
use secrecy::SecretString;
use serde_json::Map;
use sluice_action::{ActionDefinition, ActionError, ActionRunner, CallContext, Org};
use sluice_script::{ScriptError, ScriptResult, Value};
use tracing::debug;

use crate::trace::{BuiltinFunctionCall, CallArgs, HumanFormatArgs, PlotArgs, Trace};

/// State behind one action wrapper function.
pub(crate) struct ActionBinding {
    pub action: ActionDefinition,
    pub runner: Arc<ActionRunner>,
    pub org: Arc<Org>,
    pub credential: Option<Arc<SecretString>>,
    pub trace: Trace,
}

impl ActionBinding {
    /// The call name and the host function to bind under it.
    pub fn into_function(self) -> (String, Value) {
        let name = self.action.call_name();
        let binding = Arc::new(self);
        let function = Value::host(&name, move |args| {
            let binding = Arc::clone(&binding);
            async move { binding.invoke(args).await }
        });
        (name, function)
    }

    async fn invoke(&self, args: Vec<Value>) -> ScriptResult<Value> {
        let name = self.action.call_name();
        let params = match args.into_iter().next().unwrap_or_default() {
            Value::Undefined | Value::Null => Map::new(),
            value => match value.to_json() {
                Some(serde_json::Value::Object(map)) => map,
                _ => {
                    return Err(ScriptError::type_error(format!(
                        "{name} expects an object of parameters"
                    )));
                }
            },
        };

        let ctx = CallContext {
            org: &self.org,
            credential: self.credential.as_deref(),
        };
        let request = self
            .runner
            .prepare(&self.action, &params, ctx)
            .map_err(|e| self.throw(&name, &e))?;

        self.trace.push(BuiltinFunctionCall::Call(CallArgs {
            name: name.clone(),
            params,
        }));
        self.trace
            .push(BuiltinFunctionCall::CallHumanFormat(HumanFormatArgs {
                name: name.clone(),
                request: request.log.human_format(),
            }));

        match self.runner.send(&self.action, &request).await {
            Ok(value) => Ok(Value::from_json(&value)),
            Err(error) => {
                debug!(action = %name, %error, "action call failed");
                Err(self.throw(&name, &error))
            }
        }
    }

    /// An error object the snippet can catch, annotated with the action name
    /// and, for downstream failures, the status and decoded body.
    fn throw(&self, name: &str, error: &ActionError) -> ScriptError {
        let kind = match error {
            ActionError::Config { .. } => "ActionConfigError",
            ActionError::Downstream { .. } => "DownstreamAPIError",
            _ => "NetworkError",
        };
        let value = Value::error_object(kind, &error.to_string());
        if let Value::Object(object) = &value {
            let mut object = object.lock();
            object.insert("action".to_string(), Value::from(name));
            if let ActionError::Downstream { status, body, .. } = error {
                object.insert(
                    "status".to_string(),
                    Value::Number(f64::from(status.as_u16())),
                );
                object.insert("body".to_string(), Value::from_json(body));
            }
        }
        ScriptError::thrown(value)
    }
}

/// `console.log/info/warn` record `log` events, `console.error` records an
/// `error` event. Arguments are joined with spaces.
pub(crate) fn console(trace: &Trace) -> Value {
    let mut methods = IndexMap::new();
    for (method, is_error) in [("log", false), ("info", false), ("warn", false), ("error", true)] {
        let trace = trace.clone();
        let function = Value::native(method, move |args| {
            let message = args
                .iter()
                .map(Value::to_log_string)
                .collect::<Vec<_>>()
                .join(" ");
            trace.push(if is_error {
                BuiltinFunctionCall::error(message)
            } else {
                BuiltinFunctionCall::log(message)
            });
            Ok(Value::Undefined)
        });
        methods.insert(method.to_string(), function);
    }
    Value::object(methods)
}

/// `plot(title, type, data, labels?)`
pub(crate) fn plot(trace: &Trace) -> Value {
    let trace = trace.clone();
    Value::native("plot", move |args| {
        let arg = |i: usize| args.get(i).cloned().unwrap_or_default();
        trace.push(BuiltinFunctionCall::Plot(PlotArgs {
            title: arg(0).to_display_string(),
            kind: arg(1).to_display_string(),
            data: arg(2).to_json_lossy(),
            labels: arg(3).to_json().filter(|labels| !labels.is_null()),
        }));
        Ok(Value::Undefined)
    })
}
