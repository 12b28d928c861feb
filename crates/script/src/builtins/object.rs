//! `Object`, `Array` and `Promise` with their static members

use std::sync::Arc;

use indexmap::IndexMap;

use super::arg;
use crate::error::{ScriptError, ScriptResult};
use crate::eval::{enumerable_keys, get_property, set_property};
use crate::value::{Callable, Intrinsic, Promise, Value};

/// Largest array `Array(n)` may allocate
const MAX_ARRAY_CONSTRUCTOR_LENGTH: f64 = 16_777_216.0;

pub(super) fn object_constructor() -> Value {
    Value::native_constructor("Object", |args| {
        Ok(match arg(args, 0) {
            value @ (Value::Object(_) | Value::Array(_) | Value::Function(_)) => value,
            _ => Value::empty_object(),
        })
    })
}

fn entries_of(value: &Value) -> ScriptResult<Vec<(String, Value)>> {
    if value.is_nullish() {
        return Err(ScriptError::type_error(
            "Cannot convert undefined or null to object",
        ));
    }
    enumerable_keys(value)
        .into_iter()
        .map(|key| {
            let item = get_property(value, &key)?;
            Ok((key, item))
        })
        .collect()
}

pub(super) fn object_static(key: &str) -> Option<Value> {
    let value = match key {
        "keys" => Value::native("keys", |args| {
            let entries = entries_of(&arg(args, 0))?;
            Ok(Value::array(
                entries.into_iter().map(|(k, _)| Value::from(k)).collect(),
            ))
        }),
        "values" => Value::native("values", |args| {
            let entries = entries_of(&arg(args, 0))?;
            Ok(Value::array(entries.into_iter().map(|(_, v)| v).collect()))
        }),
        "entries" => Value::native("entries", |args| {
            let entries = entries_of(&arg(args, 0))?;
            Ok(Value::array(
                entries
                    .into_iter()
                    .map(|(k, v)| Value::array(vec![Value::from(k), v]))
                    .collect(),
            ))
        }),
        "assign" => Value::native("assign", |args| {
            let target = arg(args, 0);
            if target.is_nullish() {
                return Err(ScriptError::type_error(
                    "Cannot convert undefined or null to object",
                ));
            }
            for source in args.iter().skip(1) {
                if source.is_nullish() {
                    continue;
                }
                for (key, value) in entries_of(source)? {
                    set_property(&target, key, value)?;
                }
            }
            Ok(target)
        }),
        "fromEntries" => Value::native("fromEntries", |args| {
            let Value::Array(pairs) = arg(args, 0) else {
                return Err(ScriptError::type_error("Object.fromEntries requires an array"));
            };
            let pairs = pairs.lock().clone();
            let mut entries = IndexMap::with_capacity(pairs.len());
            for pair in pairs {
                let key = get_property(&pair, "0")?.to_property_key();
                let value = get_property(&pair, "1")?;
                entries.insert(key, value);
            }
            Ok(Value::object(entries))
        }),
        // Values have no frozen state; freezing is accepted and ignored.
        "freeze" => Value::native("freeze", |args| Ok(arg(args, 0))),
        _ => return None,
    };
    Some(value)
}

pub(super) fn array_constructor() -> Value {
    Value::native_constructor("Array", |args| match args {
        [Value::Number(n)] => {
            if n.fract() != 0.0 || *n < 0.0 || *n > MAX_ARRAY_CONSTRUCTOR_LENGTH {
                return Err(ScriptError::range("Invalid array length"));
            }
            Ok(Value::array(vec![Value::Undefined; *n as usize]))
        }
        items => Ok(Value::array(items.to_vec())),
    })
}

pub(super) fn array_static(key: &str) -> Option<Value> {
    let value = match key {
        "isArray" => Value::native("isArray", |args| {
            Ok(Value::Bool(matches!(arg(args, 0), Value::Array(_))))
        }),
        "of" => Value::native("of", |args| Ok(Value::array(args.to_vec()))),
        "from" => Value::Function(Arc::new(Callable::Intrinsic(Intrinsic::ArrayFrom))),
        _ => return None,
    };
    Some(value)
}

pub(super) fn promise_constructor() -> Value {
    Value::native_constructor("Promise", |_| {
        Err(ScriptError::type_error(
            "Promise executors are not supported; use an async function",
        ))
    })
}

pub(super) fn promise_static(key: &str) -> Option<Value> {
    let value = match key {
        "all" => Value::native("all", |args| match arg(args, 0) {
            Value::Array(items) => {
                let items = items.lock().clone();
                Ok(Value::Promise(Promise::all(items)))
            }
            other => Err(ScriptError::type_error(format!(
                "{} is not iterable",
                other.type_of()
            ))),
        }),
        "resolve" => Value::native("resolve", |args| {
            Ok(match arg(args, 0) {
                promise @ Value::Promise(_) => promise,
                value => Value::Promise(Promise::resolved(value)),
            })
        }),
        "reject" => Value::native("reject", |args| {
            Ok(Value::Promise(Promise::rejected(ScriptError::thrown(arg(
                args, 0,
            )))))
        }),
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn call(value: &Value, args: &[Value]) -> ScriptResult<Value> {
        let Value::Function(callable) = value else {
            panic!("not a function");
        };
        let Callable::Native { func, .. } = &**callable else {
            panic!("not native");
        };
        func(args)
    }

    #[test]
    fn keys_follow_insertion_order() {
        let object = Value::from_json(&serde_json::json!({"z": 1, "a": 2}));
        let keys = call(&object_static("keys").unwrap(), &[object]).unwrap();
        assert_eq!(keys.to_display_string(), "z,a");
    }

    #[test]
    fn assign_copies_into_target() {
        let target = Value::from_json(&serde_json::json!({"a": 1}));
        let source = Value::from_json(&serde_json::json!({"b": 2}));
        call(&object_static("assign").unwrap(), &[target.clone(), source]).unwrap();
        assert_eq!(
            target.to_json(),
            Some(serde_json::json!({"a": 1, "b": 2}))
        );
    }

    #[test]
    fn keys_of_null_is_a_type_error() {
        assert!(call(&object_static("keys").unwrap(), &[Value::Null]).is_err());
    }

    #[test]
    fn array_constructor_checks_length() {
        let ctor = array_constructor();
        let made = call(&ctor, &[Value::from(3.0)]).unwrap();
        assert_eq!(get_property(&made, "length").unwrap().to_number(), 3.0);
        assert!(call(&ctor, &[Value::from(-1.0)]).is_err());
    }
}
