//! `Error` and its subclasses

use super::arg;
use crate::value::Value;

const ERROR_NAMES: [&str; 5] = [
    "Error",
    "TypeError",
    "RangeError",
    "SyntaxError",
    "ReferenceError",
];

pub(super) fn constructors() -> Vec<(&'static str, Value)> {
    ERROR_NAMES
        .into_iter()
        .map(|name| {
            let ctor = Value::native_constructor(name, move |args| {
                let message = match arg(args, 0) {
                    Value::Undefined => String::new(),
                    other => other.to_display_string(),
                };
                Ok(Value::error_object(name, &message))
            });
            (name, ctor)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Callable;

    #[test]
    fn constructors_build_error_objects() {
        let (_, ctor) = constructors()
            .into_iter()
            .find(|(name, _)| *name == "RangeError")
            .unwrap();
        let Value::Function(callable) = ctor else {
            panic!("not a function");
        };
        let Callable::Native { func, .. } = &*callable else {
            panic!("not native");
        };
        let error = func(&[Value::from("too big")]).unwrap();
        assert_eq!(
            error.error_parts(),
            Some(("RangeError".to_string(), "too big".to_string()))
        );
    }
}
