//! `Number`, `String`, `Boolean`, the global parse functions and `Date`

use indexmap::IndexMap;

use super::arg;
use crate::value::Value;

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

pub(super) fn globals() -> Vec<(&'static str, Value)> {
    vec![
        (
            "Number",
            Value::native_constructor("Number", |args| {
                Ok(Value::Number(args.first().map_or(0.0, Value::to_number)))
            }),
        ),
        (
            "String",
            Value::native_constructor("String", |args| {
                Ok(Value::from(
                    args.first()
                        .map(Value::to_display_string)
                        .unwrap_or_default(),
                ))
            }),
        ),
        (
            "Boolean",
            Value::native_constructor("Boolean", |args| {
                Ok(Value::Bool(arg(args, 0).is_truthy()))
            }),
        ),
        ("parseInt", parse_int_function()),
        ("parseFloat", parse_float_function()),
        (
            "isNaN",
            Value::native("isNaN", |args| {
                Ok(Value::Bool(arg(args, 0).to_number().is_nan()))
            }),
        ),
        (
            "isFinite",
            Value::native("isFinite", |args| {
                Ok(Value::Bool(arg(args, 0).to_number().is_finite()))
            }),
        ),
    ]
}

fn parse_int_function() -> Value {
    Value::native("parseInt", |args| {
        let radix = match arg(args, 1) {
            Value::Undefined => 0,
            other => other.to_number() as u32,
        };
        Ok(Value::Number(parse_int(
            &arg(args, 0).to_display_string(),
            radix,
        )))
    })
}

fn parse_float_function() -> Value {
    Value::native("parseFloat", |args| {
        Ok(Value::Number(parse_float(&arg(args, 0).to_display_string())))
    })
}

/// `parseInt`: the longest digit prefix in `radix`; radix 0 means 10, or
/// 16 with a `0x` prefix.
pub(crate) fn parse_int(text: &str, radix: u32) -> f64 {
    let text = text.trim_start();
    let (negative, mut digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let mut radix = radix;
    let has_hex_prefix = digits.starts_with("0x") || digits.starts_with("0X");
    if (radix == 0 || radix == 16) && has_hex_prefix {
        digits = &digits[2..];
        radix = 16;
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }

    let mut value = 0.0_f64;
    let mut seen = false;
    for c in digits.chars() {
        let Some(digit) = c.to_digit(radix) else {
            break;
        };
        value = value.mul_add(f64::from(radix), f64::from(digit));
        seen = true;
    }
    if !seen {
        return f64::NAN;
    }
    if negative { -value } else { value }
}

/// `parseFloat`: the longest prefix that reads as a decimal literal.
pub(crate) fn parse_float(text: &str) -> f64 {
    let text = text.trim_start();
    let unsigned = text.trim_start_matches(['+', '-']);
    let sign_len = text.len() - unsigned.len();
    if sign_len > 1 {
        return f64::NAN;
    }
    if unsigned.starts_with("Infinity") {
        return if text.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let bytes = unsigned.as_bytes();
    let mut end = 0;
    let mut digits = 0;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        digits += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return f64::NAN;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    text[..sign_len + end].parse().unwrap_or(f64::NAN)
}

pub(super) fn number_static(key: &str) -> Option<Value> {
    let value = match key {
        "isInteger" => Value::native("isInteger", |args| {
            Ok(Value::Bool(matches!(
                arg(args, 0),
                Value::Number(n) if n.is_finite() && n.fract() == 0.0
            )))
        }),
        "isSafeInteger" => Value::native("isSafeInteger", |args| {
            Ok(Value::Bool(matches!(
                arg(args, 0),
                Value::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER
            )))
        }),
        "isFinite" => Value::native("isFinite", |args| {
            Ok(Value::Bool(
                matches!(arg(args, 0), Value::Number(n) if n.is_finite()),
            ))
        }),
        "isNaN" => Value::native("isNaN", |args| {
            Ok(Value::Bool(
                matches!(arg(args, 0), Value::Number(n) if n.is_nan()),
            ))
        }),
        "parseInt" => parse_int_function(),
        "parseFloat" => parse_float_function(),
        "MAX_SAFE_INTEGER" => Value::Number(MAX_SAFE_INTEGER),
        "MIN_SAFE_INTEGER" => Value::Number(-MAX_SAFE_INTEGER),
        "MAX_VALUE" => Value::Number(f64::MAX),
        "EPSILON" => Value::Number(f64::EPSILON),
        "POSITIVE_INFINITY" => Value::Number(f64::INFINITY),
        "NEGATIVE_INFINITY" => Value::Number(f64::NEG_INFINITY),
        "NaN" => Value::Number(f64::NAN),
        _ => return None,
    };
    Some(value)
}

pub(super) fn string_static(key: &str) -> Option<Value> {
    match key {
        "fromCharCode" => Some(Value::native("fromCharCode", |args| {
            let text: String = args
                .iter()
                .map(|v| {
                    let code = v.to_number() as u32 & 0xFFFF;
                    char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
                })
                .collect();
            Ok(Value::from(text))
        })),
        _ => None,
    }
}

/// `Date`, reduced to `Date.now()`.
pub(super) fn date_object() -> Value {
    let mut members = IndexMap::new();
    members.insert(
        "now".to_string(),
        Value::native("now", |_| {
            Ok(Value::Number(chrono::Utc::now().timestamp_millis() as f64))
        }),
    );
    Value::object(members)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("42px", 0, 42.0)]
    #[case("  -17", 0, -17.0)]
    #[case("0x1f", 0, 31.0)]
    #[case("ff", 16, 255.0)]
    #[case("101", 2, 5.0)]
    #[case("3.9", 10, 3.0)]
    fn parse_int_reads_prefix(#[case] text: &str, #[case] radix: u32, #[case] expected: f64) {
        assert_eq!(parse_int(text, radix), expected);
    }

    #[test]
    fn parse_int_without_digits_is_nan() {
        assert!(parse_int("px", 0).is_nan());
        assert!(parse_int("1", 40).is_nan());
    }

    #[rstest]
    #[case("3.14abc", 3.14)]
    #[case("-.5", -0.5)]
    #[case("1e3x", 1000.0)]
    #[case("2e", 2.0)]
    #[case("-Infinity", f64::NEG_INFINITY)]
    fn parse_float_reads_prefix(#[case] text: &str, #[case] expected: f64) {
        assert_eq!(parse_float(text), expected);
    }

    #[test]
    fn parse_float_rejects_garbage() {
        assert!(parse_float("abc").is_nan());
        assert!(parse_float("--1").is_nan());
        assert!(parse_float(".").is_nan());
    }
}
