//! Operators and coercions

use std::borrow::Cow;
use std::cmp::Ordering;

use super::methods::check_string_length;
use crate::core::ast::BinaryOp;
use crate::error::{ScriptError, ScriptResult};
use crate::value::{Callable, Value};

/// Elements visited by `for...of`, spread and array destructuring.
pub(super) fn iterate(value: &Value) -> ScriptResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items.lock().clone()),
        Value::String(s) => Ok(s.chars().map(|c| Value::from(c.to_string())).collect()),
        other => Err(ScriptError::type_error(format!(
            "{} is not iterable",
            describe_value(other)
        ))),
    }
}

/// Keys visited by `for...in` and `Object.keys`.
pub(crate) fn enumerable_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Object(object) => object.lock().keys().cloned().collect(),
        Value::Array(items) => (0..items.lock().len()).map(|i| i.to_string()).collect(),
        Value::String(s) => (0..s.chars().count()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    }
}

/// Short description used in error messages.
pub(super) fn describe_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{s}\""),
        Value::Array(_) | Value::Object(_) | Value::Promise(_) => value.type_of().to_string(),
        Value::Function(callable) => callable.name().to_string(),
        other => other.to_display_string(),
    }
}

pub(super) fn binary(op: BinaryOp, left: &Value, right: &Value) -> ScriptResult<Value> {
    Ok(match op {
        BinaryOp::Add => add(left, right)?,
        BinaryOp::Subtract => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Multiply => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Divide => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Modulo => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Power => Value::Number(left.to_number().powf(right.to_number())),
        BinaryOp::Equal => Value::Bool(left.loose_equals(right)),
        BinaryOp::NotEqual => Value::Bool(!left.loose_equals(right)),
        BinaryOp::StrictEqual => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNotEqual => Value::Bool(!left.strict_equals(right)),
        BinaryOp::LessThan => Value::Bool(compare(left, right) == Some(Ordering::Less)),
        BinaryOp::GreaterThan => Value::Bool(compare(left, right) == Some(Ordering::Greater)),
        BinaryOp::LessEqual => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::GreaterEqual => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::In => Value::Bool(has_property(right, &left.to_property_key())?),
        BinaryOp::Instanceof => Value::Bool(instance_of(left, right)?),
    })
}

fn add(left: &Value, right: &Value) -> ScriptResult<Value> {
    let is_text = |v: &Value| {
        matches!(
            v,
            Value::String(_)
                | Value::Array(_)
                | Value::Object(_)
                | Value::Function(_)
                | Value::Promise(_)
        )
    };
    if is_text(left) || is_text(right) {
        let (head, tail) = (display_text(left), display_text(right));
        check_string_length(head.len() + tail.len())?;
        let mut text = String::with_capacity(head.len() + tail.len());
        text.push_str(&head);
        text.push_str(&tail);
        return Ok(Value::from(text));
    }
    Ok(Value::Number(left.to_number() + right.to_number()))
}

fn display_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(&**s),
        other => Cow::Owned(other.to_display_string()),
    }
}

/// Relational comparison; `None` when either side is `NaN`.
pub(super) fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}

fn has_property(object: &Value, key: &str) -> ScriptResult<bool> {
    match object {
        Value::Object(entries) => Ok(entries.lock().contains_key(key)),
        Value::Array(items) => Ok(key == "length"
            || key
                .parse::<usize>()
                .is_ok_and(|index| index < items.lock().len())),
        other => Err(ScriptError::type_error(format!(
            "Cannot use 'in' operator to search for '{key}' in {}",
            other.to_display_string()
        ))),
    }
}

/// Only error objects and arrays have a notion of class here.
fn instance_of(value: &Value, class: &Value) -> ScriptResult<bool> {
    let Value::Function(callable) = class else {
        return Err(ScriptError::type_error(
            "Right-hand side of 'instanceof' is not callable",
        ));
    };
    let class_name = match &**callable {
        Callable::Native { name, .. } => name.clone(),
        _ => return Ok(false),
    };
    Ok(match (value, &*class_name) {
        (Value::Array(_), "Array") => true,
        (Value::Object(_), "Object") => true,
        (_, "Error") => value.error_parts().is_some(),
        (_, name) => value
            .error_parts()
            .is_some_and(|(error_name, _)| error_name == name),
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Value::from(1.0), Value::from(2.0), "3")]
    #[case(Value::from("a"), Value::from(1.0), "a1")]
    #[case(Value::from(1.0), Value::Null, "1")]
    #[case(Value::Bool(true), Value::from(1.0), "2")]
    #[case(Value::array(vec![Value::from(1.0), Value::from(2.0)]), Value::from("!"), "1,2!")]
    fn addition_coerces_like_js(#[case] left: Value, #[case] right: Value, #[case] expected: &str) {
        let sum = binary(BinaryOp::Add, &left, &right).unwrap();
        assert_eq!(sum.to_display_string(), expected);
    }

    #[test]
    fn nan_compares_false() {
        let nan = Value::Number(f64::NAN);
        let one = Value::from(1.0);
        for op in [BinaryOp::LessThan, BinaryOp::GreaterEqual] {
            assert!(!binary(op, &nan, &one).unwrap().is_truthy());
        }
    }

    #[test]
    fn strings_compare_lexicographically() {
        let result = binary(BinaryOp::LessThan, &Value::from("10"), &Value::from("9")).unwrap();
        assert!(result.is_truthy());
    }

    #[test]
    fn in_requires_an_object() {
        assert!(binary(BinaryOp::In, &Value::from("a"), &Value::from("abc")).is_err());
    }
}
