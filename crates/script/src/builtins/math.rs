//! The `Math` object

use std::f64::consts;

use indexmap::IndexMap;

use super::arg;
use crate::value::Value;

type Unary = fn(f64) -> f64;

/// JS rounding: halves go towards +Infinity.
fn round(n: f64) -> f64 {
    if !n.is_finite() || n.fract() == 0.0 {
        return n;
    }
    let rounded = (n + 0.5).floor();
    // Keep the sign of -0.4 -> -0
    if rounded == 0.0 && n < 0.0 { -0.0 } else { rounded }
}

fn sign(n: f64) -> f64 {
    if n.is_nan() || n == 0.0 { n } else { n.signum() }
}

fn extreme(args: &[Value], pick: fn(f64, f64) -> f64, empty: f64) -> f64 {
    let mut acc = empty;
    for value in args {
        let n = value.to_number();
        if n.is_nan() {
            return f64::NAN;
        }
        acc = pick(acc, n);
    }
    acc
}

pub(super) fn object() -> Value {
    let mut members = IndexMap::new();
    for (name, value) in [
        ("PI", consts::PI),
        ("E", consts::E),
        ("LN2", consts::LN_2),
        ("LN10", consts::LN_10),
        ("LOG2E", consts::LOG2_E),
        ("LOG10E", consts::LOG10_E),
        ("SQRT2", consts::SQRT_2),
    ] {
        members.insert(name.to_string(), Value::Number(value));
    }

    let unary: [(&str, Unary); 17] = [
        ("abs", f64::abs),
        ("floor", f64::floor),
        ("ceil", f64::ceil),
        ("round", round),
        ("trunc", f64::trunc),
        ("sign", sign),
        ("sqrt", f64::sqrt),
        ("cbrt", f64::cbrt),
        ("exp", f64::exp),
        ("log", f64::ln),
        ("log2", f64::log2),
        ("log10", f64::log10),
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("asin", f64::asin),
        ("atan", f64::atan),
    ];
    for (name, func) in unary {
        members.insert(
            name.to_string(),
            Value::native(name, move |args| Ok(Value::Number(func(arg(args, 0).to_number())))),
        );
    }

    members.insert(
        "pow".to_string(),
        Value::native("pow", |args| {
            Ok(Value::Number(
                arg(args, 0).to_number().powf(arg(args, 1).to_number()),
            ))
        }),
    );
    members.insert(
        "atan2".to_string(),
        Value::native("atan2", |args| {
            Ok(Value::Number(
                arg(args, 0).to_number().atan2(arg(args, 1).to_number()),
            ))
        }),
    );
    members.insert(
        "hypot".to_string(),
        Value::native("hypot", |args| {
            let sum: f64 = args.iter().map(|v| v.to_number().powi(2)).sum();
            Ok(Value::Number(sum.sqrt()))
        }),
    );
    members.insert(
        "max".to_string(),
        Value::native("max", |args| {
            Ok(Value::Number(extreme(args, f64::max, f64::NEG_INFINITY)))
        }),
    );
    members.insert(
        "min".to_string(),
        Value::native("min", |args| {
            Ok(Value::Number(extreme(args, f64::min, f64::INFINITY)))
        }),
    );
    members.insert(
        "random".to_string(),
        Value::native("random", |_| Ok(Value::Number(fastrand::f64()))),
    );
    Value::object(members)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(2.5, 3.0)]
    #[case(-2.5, -2.0)]
    #[case(-2.6, -3.0)]
    #[case(0.49, 0.0)]
    fn round_goes_half_up(#[case] n: f64, #[case] expected: f64) {
        assert_eq!(round(n), expected);
    }

    #[test]
    fn extremes() {
        let args = [Value::from(3.0), Value::from("7"), Value::from(-1.0)];
        assert_eq!(extreme(&args, f64::max, f64::NEG_INFINITY), 7.0);
        assert_eq!(extreme(&[], f64::min, f64::INFINITY), f64::INFINITY);
        assert!(extreme(&[Value::from("x")], f64::max, f64::NEG_INFINITY).is_nan());
    }
}
