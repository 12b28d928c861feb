//! Global objects and functions available to every script
//!
//! Constructors such as `Number` or `Array` are native functions; their
//! static members (`Number.isInteger`, `Array.isArray`, ...) are resolved
//! on access by [`static_member`].

mod conversion;
mod errors;
mod json;
mod math;
mod object;

use std::sync::Arc;

use crate::eval::{BindingKind, Scope};
use crate::value::{Callable, Value};

/// Bind every builtin global into `scope`.
pub fn install(scope: &Scope) {
    let mut globals: Vec<(&str, Value)> = vec![
        ("NaN", Value::Number(f64::NAN)),
        ("Infinity", Value::Number(f64::INFINITY)),
        ("JSON", json::object()),
        ("Math", math::object()),
        ("Date", conversion::date_object()),
        ("Object", object::object_constructor()),
        ("Array", object::array_constructor()),
        ("Promise", object::promise_constructor()),
    ];
    globals.extend(conversion::globals());
    globals.extend(errors::constructors());

    for (name, value) in globals {
        // Builtins are installed into a fresh scope, so redeclaration cannot
        // happen.
        let _ = scope.declare(&Arc::from(name), value, BindingKind::Var);
    }
}

/// Static member `key` of a builtin constructor, e.g. `Array.isArray`.
pub fn static_member(callable: &Arc<Callable>, key: &str) -> Option<Value> {
    let Callable::Native {
        name,
        constructor: true,
        ..
    } = &**callable
    else {
        return None;
    };
    match &**name {
        "Number" => conversion::number_static(key),
        "String" => conversion::string_static(key),
        "Object" => object::object_static(key),
        "Array" => object::array_static(key),
        "Promise" => object::promise_static(key),
        _ => None,
    }
}

/// Argument `index`, or `undefined` when absent.
fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}
