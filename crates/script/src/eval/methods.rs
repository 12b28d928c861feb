//! Property access and the builtin methods of arrays, strings, numbers and
//! promises

use std::cmp::Ordering;
use std::sync::Arc;

use super::Interpreter;
use super::ops::describe_value;
use crate::builtins;
use crate::core::span::Span;
use crate::error::{ScriptError, ScriptResult};
use crate::value::{Callable, Promise, Value, number_to_string};

/// Largest array an index assignment may grow to
const MAX_ARRAY_LENGTH: usize = 1 << 24;

/// Longest string a script may build
const MAX_STRING_LENGTH: usize = 1 << 26;

/// Fails once a string being built would pass [`MAX_STRING_LENGTH`].
pub(super) fn check_string_length(len: usize) -> ScriptResult<()> {
    if len > MAX_STRING_LENGTH {
        return Err(ScriptError::range("Invalid string length"));
    }
    Ok(())
}

pub(crate) fn get_property(value: &Value, key: &str) -> ScriptResult<Value> {
    match value {
        Value::Undefined | Value::Null => Err(ScriptError::type_error(format!(
            "Cannot read properties of {value} (reading '{key}')"
        ))),
        Value::Object(object) => Ok(object.lock().get(key).cloned().unwrap_or_default()),
        Value::Array(items) => {
            let items = items.lock();
            if key == "length" {
                return Ok(Value::from(items.len()));
            }
            Ok(array_index(key)
                .and_then(|index| items.get(index).cloned())
                .unwrap_or_default())
        }
        Value::String(s) => {
            if key == "length" {
                return Ok(Value::from(s.chars().count()));
            }
            Ok(array_index(key)
                .and_then(|index| s.chars().nth(index))
                .map(|c| Value::from(c.to_string()))
                .unwrap_or_default())
        }
        Value::Function(callable) => {
            if key == "name" {
                return Ok(Value::string(callable.name()));
            }
            Ok(builtins::static_member(callable, key).unwrap_or_default())
        }
        Value::Bool(_) | Value::Number(_) | Value::Promise(_) => Ok(Value::Undefined),
    }
}

pub(crate) fn set_property(target: &Value, key: String, value: Value) -> ScriptResult<()> {
    match target {
        Value::Undefined | Value::Null => Err(ScriptError::type_error(format!(
            "Cannot set properties of {target} (setting '{key}')"
        ))),
        Value::Object(object) => {
            object.lock().insert(key, value);
            Ok(())
        }
        Value::Array(items) => {
            if key == "length" {
                let length = value.to_number();
                if length < 0.0 || length.fract() != 0.0 || length as usize > MAX_ARRAY_LENGTH {
                    return Err(ScriptError::range("Invalid array length"));
                }
                items.lock().resize(length as usize, Value::Undefined);
                return Ok(());
            }
            let Some(index) = array_index(&key) else {
                return Ok(());
            };
            if index >= MAX_ARRAY_LENGTH {
                return Err(ScriptError::range("Invalid array length"));
            }
            let mut items = items.lock();
            if index >= items.len() {
                items.resize(index + 1, Value::Undefined);
            }
            items[index] = value;
            Ok(())
        }
        // Primitives silently drop writes.
        _ => Ok(()),
    }
}

/// Canonical array index, e.g. `"3"` but not `"03"`.
fn array_index(key: &str) -> Option<usize> {
    let index = key.parse::<usize>().ok()?;
    (index.to_string() == key).then_some(index)
}

/// `ToIntegerOrInfinity`, with `NaN` as 0.
fn to_integer(value: &Value) -> f64 {
    let n = value.to_number();
    if n.is_nan() { 0.0 } else { n.trunc() }
}

/// Resolve a possibly negative position against `len`.
fn relative_index(arg: Option<&Value>, len: usize, default: usize) -> usize {
    match arg {
        None | Some(Value::Undefined) => default,
        Some(value) => {
            let n = to_integer(value);
            if n < 0.0 {
                (len as f64 + n).max(0.0) as usize
            } else {
                n.min(len as f64) as usize
            }
        }
    }
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn callback(args: &[Value], method: &str) -> ScriptResult<Arc<Callable>> {
    match args.first() {
        Some(Value::Function(callable)) => Ok(Arc::clone(callable)),
        other => Err(ScriptError::type_error(format!(
            "{} is not a function (in {method})",
            describe_value(&other.cloned().unwrap_or_default())
        ))),
    }
}

fn flatten_into(out: &mut Vec<Value>, items: Vec<Value>, depth: f64) {
    for item in items {
        match item {
            Value::Array(inner) if depth >= 1.0 => {
                let inner = inner.lock().clone();
                flatten_into(out, inner, depth - 1.0);
            }
            other => out.push(other),
        }
    }
}

/// Default sort order: `undefined` last, everything else by string form.
fn default_order(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => Ordering::Equal,
        (Value::Undefined, _) => Ordering::Greater,
        (_, Value::Undefined) => Ordering::Less,
        _ => a.to_display_string().cmp(&b.to_display_string()),
    }
}

/// Add one unit in the last place of a plain decimal string, e.g.
/// `"1.29"` to `"1.30"` and `"9.9"` to `"10.0"`.
fn increment_decimal(digits: &str) -> String {
    let mut bytes = digits.as_bytes().to_vec();
    for i in (0..bytes.len()).rev() {
        match bytes[i] {
            b'.' => {}
            b'9' => bytes[i] = b'0',
            b => {
                bytes[i] = b + 1;
                return String::from_utf8(bytes).unwrap_or_default();
            }
        }
    }
    let mut out = String::from("1");
    out.push_str(&String::from_utf8(bytes).unwrap_or_default());
    out
}

/// `Number.prototype.toFixed`; exact ties round away from zero.
pub(crate) fn to_fixed(n: f64, digits: usize) -> String {
    if !n.is_finite() || n.abs() >= 1e21 {
        return number_to_string(n);
    }
    const EXTRA: usize = 25;
    let long = format!("{:.*}", digits + EXTRA, n.abs());
    let (head, tail) = long.split_at(long.len() - EXTRA);
    let is_tie = tail.starts_with('5') && tail[1..].bytes().all(|b| b == b'0');
    let magnitude = if is_tie {
        increment_decimal(head.trim_end_matches('.'))
    } else {
        format!("{:.*}", digits, n.abs())
    };
    let is_zero = magnitude.bytes().all(|b| b == b'0' || b == b'.');
    if n.is_sign_negative() && !(is_zero && n == 0.0) {
        format!("-{magnitude}")
    } else {
        magnitude
    }
}

/// en-US grouping with up to three fraction digits.
fn to_locale_string(n: f64) -> String {
    if !n.is_finite() {
        return number_to_string(n);
    }
    let fixed = to_fixed(n.abs(), 3);
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((&fixed, ""));
    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let frac = frac_part.trim_end_matches('0');
    let sign = if n < 0.0 && (int_part != "0" || !frac.is_empty()) {
        "-"
    } else {
        ""
    };
    if frac.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac}")
    }
}

fn to_radix_string(n: f64, radix: u32) -> ScriptResult<String> {
    if !(2..=36).contains(&radix) {
        return Err(ScriptError::range(
            "toString() radix must be between 2 and 36",
        ));
    }
    if radix == 10 || !n.is_finite() || n.fract() != 0.0 {
        return Ok(number_to_string(n));
    }
    let mut value = n.abs() as u64;
    if value == 0 {
        return Ok("0".to_string());
    }
    let mut digits = Vec::new();
    while value > 0 {
        let digit = (value % u64::from(radix)) as u32;
        digits.push(char::from_digit(digit, radix).unwrap_or('0'));
        value /= u64::from(radix);
    }
    if n < 0.0 {
        digits.push('-');
    }
    Ok(digits.iter().rev().collect())
}

fn char_index_of(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let start = haystack.char_indices().nth(from).map_or(haystack.len(), |(b, _)| b);
    if from > haystack.chars().count() {
        return None;
    }
    haystack[start..]
        .find(needle)
        .map(|byte| haystack[..start + byte].chars().count())
}

fn chars_slice(chars: &[char], start: usize, end: usize) -> String {
    if start >= end {
        return String::new();
    }
    chars[start..end].iter().collect()
}

impl Interpreter {
    /// Invoke a builtin method. `Ok(None)` when the receiver has no method
    /// of that name.
    pub(super) async fn call_method(
        &self,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
        site: Span,
        depth: usize,
    ) -> ScriptResult<Option<Value>> {
        match receiver {
            Value::Array(_) => self.call_array_method(receiver, name, args, site, depth).await,
            Value::String(s) => {
                let s = Arc::clone(s);
                self.call_string_method(&s, name, args, site, depth).await
            }
            Value::Number(n) => number_method(*n, name, &args),
            Value::Bool(b) => Ok(match name {
                "valueOf" => Some(Value::Bool(*b)),
                "toString" => Some(Value::from(b.to_string())),
                _ => None,
            }),
            Value::Promise(promise) => {
                self.call_promise_method(promise.clone(), name, args, site, depth)
                    .await
            }
            Value::Object(object) => Ok(match name {
                "hasOwnProperty" => {
                    let key = arg(&args, 0).to_property_key();
                    Some(Value::Bool(object.lock().contains_key(&key)))
                }
                "toString" => Some(Value::from(receiver.to_display_string())),
                _ => None,
            }),
            _ => Ok(None),
        }
    }

    async fn call_array_method(
        &self,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
        site: Span,
        depth: usize,
    ) -> ScriptResult<Option<Value>> {
        let Value::Array(array) = receiver else {
            return Ok(None);
        };
        let snapshot = || array.lock().clone();

        let value = match name {
            "push" => {
                let mut items = array.lock();
                items.extend(args);
                Value::from(items.len())
            }
            "pop" => array.lock().pop().unwrap_or_default(),
            "shift" => {
                let mut items = array.lock();
                if items.is_empty() {
                    Value::Undefined
                } else {
                    items.remove(0)
                }
            }
            "unshift" => {
                let mut items = array.lock();
                items.splice(0..0, args);
                Value::from(items.len())
            }
            "slice" => {
                let items = snapshot();
                let start = relative_index(args.first(), items.len(), 0);
                let end = relative_index(args.get(1), items.len(), items.len());
                Value::array(items.get(start..end.max(start)).unwrap_or_default().to_vec())
            }
            "splice" => {
                let mut items = array.lock();
                let len = items.len();
                let start = relative_index(args.first(), len, 0);
                let delete = match args.get(1) {
                    None => len - start,
                    Some(count) => (to_integer(count).max(0.0) as usize).min(len - start),
                };
                let inserted: Vec<Value> = args.iter().skip(2).cloned().collect();
                let removed: Vec<Value> = items.splice(start..start + delete, inserted).collect();
                Value::array(removed)
            }
            "concat" => {
                let mut items = snapshot();
                for extra in args {
                    match extra {
                        Value::Array(more) => {
                            let more = more.lock().clone();
                            items.extend(more);
                        }
                        other => items.push(other),
                    }
                }
                Value::array(items)
            }
            "join" => {
                let separator = match args.first() {
                    None | Some(Value::Undefined) => ",".to_string(),
                    Some(sep) => sep.to_display_string(),
                };
                let parts: Vec<String> = snapshot()
                    .iter()
                    .map(|item| {
                        if item.is_nullish() {
                            String::new()
                        } else {
                            item.to_display_string()
                        }
                    })
                    .collect();
                let total = parts.iter().map(String::len).sum::<usize>()
                    + separator.len().saturating_mul(parts.len().saturating_sub(1));
                check_string_length(total)?;
                Value::from(parts.join(&separator))
            }
            "toString" => Value::from(receiver.to_display_string()),
            "reverse" => {
                array.lock().reverse();
                receiver.clone()
            }
            "includes" => {
                let needle = arg(&args, 0);
                Value::Bool(snapshot().iter().any(|item| item.same_value_zero(&needle)))
            }
            "indexOf" => {
                let needle = arg(&args, 0);
                let items = snapshot();
                let from = relative_index(args.get(1), items.len(), 0);
                items
                    .iter()
                    .skip(from)
                    .position(|item| item.strict_equals(&needle))
                    .map_or(Value::Number(-1.0), |i| Value::from(i + from))
            }
            "lastIndexOf" => {
                let needle = arg(&args, 0);
                snapshot()
                    .iter()
                    .rposition(|item| item.strict_equals(&needle))
                    .map_or(Value::Number(-1.0), Value::from)
            }
            "at" => {
                let items = snapshot();
                let n = to_integer(&arg(&args, 0));
                let index = if n < 0.0 { items.len() as f64 + n } else { n };
                if index < 0.0 {
                    Value::Undefined
                } else {
                    items.get(index as usize).cloned().unwrap_or_default()
                }
            }
            "flat" => {
                let depth_arg = match args.first() {
                    None | Some(Value::Undefined) => 1.0,
                    Some(d) => to_integer(d),
                };
                let mut out = Vec::new();
                flatten_into(&mut out, snapshot(), depth_arg);
                Value::array(out)
            }
            "fill" => {
                let mut items = array.lock();
                let len = items.len();
                let start = relative_index(args.get(1), len, 0);
                let end = relative_index(args.get(2), len, len);
                let fill = arg(&args, 0);
                for item in items.iter_mut().take(end).skip(start) {
                    *item = fill.clone();
                }
                drop(items);
                receiver.clone()
            }
            "keys" => Value::array((0..array.lock().len()).map(Value::from).collect()),
            "entries" => Value::array(
                snapshot()
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| Value::array(vec![Value::from(i), item]))
                    .collect(),
            ),
            "map" | "filter" | "forEach" | "find" | "findIndex" | "findLast" | "some"
            | "every" | "flatMap" => {
                let func = callback(&args, name)?;
                let items = snapshot();
                let mut out = Vec::new();
                let mut found = None;
                for (index, item) in items.iter().enumerate() {
                    let result = self
                        .call_function(
                            Arc::clone(&func),
                            Value::Undefined,
                            vec![item.clone(), Value::from(index), receiver.clone()],
                            site,
                            depth,
                        )
                        .await?;
                    match name {
                        "map" => out.push(result),
                        "flatMap" => flatten_into(&mut out, vec![result], 1.0),
                        "filter" if result.is_truthy() => out.push(item.clone()),
                        "find" | "findIndex" | "some" if result.is_truthy() => {
                            found = Some((index, item.clone()));
                            break;
                        }
                        "findLast" if result.is_truthy() => found = Some((index, item.clone())),
                        "every" if !result.is_truthy() => {
                            found = Some((index, item.clone()));
                            break;
                        }
                        _ => {}
                    }
                }
                match name {
                    "map" | "filter" | "flatMap" => Value::array(out),
                    "forEach" => Value::Undefined,
                    "find" | "findLast" => found.map(|(_, item)| item).unwrap_or_default(),
                    "findIndex" => found.map_or(Value::Number(-1.0), |(i, _)| Value::from(i)),
                    "some" => Value::Bool(found.is_some()),
                    _ => Value::Bool(found.is_none()),
                }
            }
            "reduce" | "reduceRight" => {
                let func = callback(&args, name)?;
                let mut items: Vec<(usize, Value)> = snapshot().into_iter().enumerate().collect();
                if name == "reduceRight" {
                    items.reverse();
                }
                let mut items = items.into_iter();
                let mut accumulator = match args.get(1) {
                    Some(initial) => initial.clone(),
                    None => match items.next() {
                        Some((_, first)) => first,
                        None => {
                            return Err(ScriptError::type_error(
                                "Reduce of empty array with no initial value",
                            ));
                        }
                    },
                };
                for (index, item) in items {
                    accumulator = self
                        .call_function(
                            Arc::clone(&func),
                            Value::Undefined,
                            vec![accumulator, item, Value::from(index), receiver.clone()],
                            site,
                            depth,
                        )
                        .await?;
                }
                accumulator
            }
            "sort" => {
                let comparator = match args.first() {
                    None | Some(Value::Undefined) => None,
                    Some(_) => Some(callback(&args, name)?),
                };
                let sorted = self.merge_sort(snapshot(), comparator, site, depth).await?;
                *array.lock() = sorted;
                receiver.clone()
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    /// Stable bottom-up merge sort; the comparator may be a script function.
    async fn merge_sort(
        &self,
        items: Vec<Value>,
        comparator: Option<Arc<Callable>>,
        site: Span,
        depth: usize,
    ) -> ScriptResult<Vec<Value>> {
        let mut current = items;
        let len = current.len();
        let mut width = 1;
        while width < len {
            let mut merged = Vec::with_capacity(len);
            let mut start = 0;
            while start < len {
                let mid = (start + width).min(len);
                let end = (start + 2 * width).min(len);
                let (mut i, mut j) = (start, mid);
                while i < mid && j < end {
                    let order = match &comparator {
                        Some(func) => {
                            let result = self
                                .call_function(
                                    Arc::clone(func),
                                    Value::Undefined,
                                    vec![current[i].clone(), current[j].clone()],
                                    site,
                                    depth,
                                )
                                .await?
                                .to_number();
                            if result > 0.0 {
                                Ordering::Greater
                            } else {
                                Ordering::Less
                            }
                        }
                        None => default_order(&current[i], &current[j]),
                    };
                    if order == Ordering::Greater {
                        merged.push(current[j].clone());
                        j += 1;
                    } else {
                        merged.push(current[i].clone());
                        i += 1;
                    }
                }
                merged.extend_from_slice(&current[i..mid]);
                merged.extend_from_slice(&current[j..end]);
                start = end;
            }
            current = merged;
            width *= 2;
        }
        Ok(current)
    }

    async fn call_string_method(
        &self,
        s: &str,
        name: &str,
        args: Vec<Value>,
        site: Span,
        depth: usize,
    ) -> ScriptResult<Option<Value>> {
        let text_arg = |index: usize| match args.get(index) {
            None | Some(Value::Undefined) => None,
            Some(value) => Some(value.to_display_string()),
        };
        let chars: Vec<char> = s.chars().collect();
        let len = chars.len();

        let value = match name {
            "toUpperCase" | "toLocaleUpperCase" => Value::from(s.to_uppercase()),
            "toLowerCase" | "toLocaleLowerCase" => Value::from(s.to_lowercase()),
            "trim" => Value::from(s.trim()),
            "trimStart" => Value::from(s.trim_start()),
            "trimEnd" => Value::from(s.trim_end()),
            "toString" | "valueOf" => Value::from(s),
            "split" => {
                let limit = match args.get(1) {
                    None | Some(Value::Undefined) => usize::MAX,
                    Some(n) => to_integer(n).max(0.0) as usize,
                };
                let parts: Vec<Value> = match text_arg(0) {
                    None => vec![Value::from(s)],
                    Some(sep) if sep.is_empty() => {
                        chars.iter().map(|c| Value::from(c.to_string())).collect()
                    }
                    Some(sep) => s.split(sep.as_str()).map(Value::from).collect(),
                };
                Value::array(parts.into_iter().take(limit).collect())
            }
            "includes" => Value::Bool(s.contains(text_arg(0).unwrap_or_default().as_str())),
            "startsWith" => Value::Bool(s.starts_with(text_arg(0).unwrap_or_default().as_str())),
            "endsWith" => Value::Bool(s.ends_with(text_arg(0).unwrap_or_default().as_str())),
            "indexOf" => {
                let needle = text_arg(0).unwrap_or_else(|| "undefined".to_string());
                let from = relative_index(args.get(1), len, 0);
                char_index_of(s, &needle, from).map_or(Value::Number(-1.0), Value::from)
            }
            "lastIndexOf" => {
                let needle = text_arg(0).unwrap_or_else(|| "undefined".to_string());
                s.rfind(needle.as_str())
                    .map_or(Value::Number(-1.0), |b| Value::from(s[..b].chars().count()))
            }
            "slice" => {
                let start = relative_index(args.first(), len, 0);
                let end = relative_index(args.get(1), len, len);
                Value::from(chars_slice(&chars, start, end))
            }
            "substring" => {
                let clamp = |value: Option<&Value>, default: usize| match value {
                    None | Some(Value::Undefined) => default,
                    Some(v) => to_integer(v).clamp(0.0, len as f64) as usize,
                };
                let a = clamp(args.first(), 0);
                let b = clamp(args.get(1), len);
                Value::from(chars_slice(&chars, a.min(b), a.max(b)))
            }
            "substr" => {
                let start = relative_index(args.first(), len, 0);
                let count = match args.get(1) {
                    None | Some(Value::Undefined) => len,
                    Some(n) => to_integer(n).max(0.0) as usize,
                };
                Value::from(chars_slice(&chars, start, start.saturating_add(count).min(len)))
            }
            "charAt" => {
                let index = to_integer(&arg(&args, 0));
                Value::from(
                    (index >= 0.0)
                        .then(|| chars.get(index as usize))
                        .flatten()
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                )
            }
            "charCodeAt" | "codePointAt" => {
                let index = to_integer(&arg(&args, 0));
                (index >= 0.0)
                    .then(|| chars.get(index as usize))
                    .flatten()
                    .map_or(Value::Number(f64::NAN), |c| Value::Number(f64::from(u32::from(*c))))
            }
            "at" => {
                let n = to_integer(&arg(&args, 0));
                let index = if n < 0.0 { len as f64 + n } else { n };
                if index < 0.0 {
                    Value::Undefined
                } else {
                    chars
                        .get(index as usize)
                        .map(|c| Value::from(c.to_string()))
                        .unwrap_or_default()
                }
            }
            "concat" => {
                let mut out = s.to_string();
                for extra in &args {
                    let extra = extra.to_display_string();
                    check_string_length(out.len() + extra.len())?;
                    out.push_str(&extra);
                }
                Value::from(out)
            }
            "repeat" => {
                let count = to_integer(&arg(&args, 0));
                if count < 0.0 || count.is_infinite() {
                    return Err(ScriptError::range(format!("Invalid count value: {count}")));
                }
                check_string_length(s.len().saturating_mul(count as usize))?;
                Value::from(s.repeat(count as usize))
            }
            "padStart" | "padEnd" => {
                let target = to_integer(&arg(&args, 0)).max(0.0) as usize;
                check_string_length(target)?;
                let fill = text_arg(1).unwrap_or_else(|| " ".to_string());
                if target <= len || fill.is_empty() {
                    Value::from(s)
                } else {
                    let padding: String = fill.chars().cycle().take(target - len).collect();
                    if name == "padStart" {
                        Value::from(format!("{padding}{s}"))
                    } else {
                        Value::from(format!("{s}{padding}"))
                    }
                }
            }
            "localeCompare" => {
                let other = text_arg(0).unwrap_or_else(|| "undefined".to_string());
                Value::Number(match s.cmp(other.as_str()) {
                    Ordering::Less => -1.0,
                    Ordering::Equal => 0.0,
                    Ordering::Greater => 1.0,
                })
            }
            "replace" | "replaceAll" => {
                let pattern = text_arg(0).unwrap_or_else(|| "undefined".to_string());
                let replacement = arg(&args, 1);
                let positions: Vec<usize> = if name == "replace" {
                    s.find(pattern.as_str()).into_iter().collect()
                } else if pattern.is_empty() {
                    s.char_indices().map(|(b, _)| b).chain([s.len()]).collect()
                } else {
                    s.match_indices(pattern.as_str()).map(|(b, _)| b).collect()
                };
                let mut out = String::with_capacity(s.len());
                let mut last = 0;
                for byte in positions {
                    out.push_str(&s[last..byte]);
                    let text = match &replacement {
                        Value::Function(func) => self
                            .call_function(
                                Arc::clone(func),
                                Value::Undefined,
                                vec![
                                    Value::from(pattern.as_str()),
                                    Value::from(s[..byte].chars().count()),
                                    Value::from(s),
                                ],
                                site,
                                depth,
                            )
                            .await?
                            .to_display_string(),
                        other => other.to_display_string(),
                    };
                    out.push_str(&text);
                    last = byte + pattern.len();
                }
                out.push_str(&s[last.min(s.len())..]);
                Value::from(out)
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    async fn call_promise_method(
        &self,
        promise: Promise,
        name: &str,
        args: Vec<Value>,
        site: Span,
        depth: usize,
    ) -> ScriptResult<Option<Value>> {
        let (on_fulfilled, on_rejected) = match name {
            "then" => (args.first().cloned(), args.get(1).cloned()),
            "catch" => (None, args.first().cloned()),
            "finally" => {
                let outcome = Value::Promise(promise).settle().await;
                if let Some(Value::Function(func)) = args.first() {
                    self.call_function(Arc::clone(func), Value::Undefined, Vec::new(), site, depth)
                        .await?
                        .settle()
                        .await?;
                }
                return Ok(Some(Value::Promise(match outcome {
                    Ok(value) => Promise::resolved(value),
                    Err(err) => Promise::rejected(err),
                })));
            }
            _ => return Ok(None),
        };

        // Handlers run as soon as the promise settles, inline with the caller.
        let outcome = Value::Promise(promise).settle().await;
        let (handler, input) = match outcome {
            Ok(value) => match on_fulfilled {
                Some(Value::Function(func)) => (func, value),
                _ => return Ok(Some(Value::Promise(Promise::resolved(value)))),
            },
            Err(err) => match on_rejected {
                Some(Value::Function(func)) => (func, err.to_value()),
                _ => return Ok(Some(Value::Promise(Promise::rejected(err)))),
            },
        };
        let result = self
            .call_function(handler, Value::Undefined, vec![input], site, depth)
            .await;
        Ok(Some(Value::Promise(match result {
            Ok(value) => Promise::resolved(value),
            Err(err) => Promise::rejected(err),
        })))
    }
}

fn number_method(n: f64, name: &str, args: &[Value]) -> ScriptResult<Option<Value>> {
    Ok(Some(match name {
        "toFixed" => {
            let digits = to_integer(&arg(args, 0));
            if !(0.0..=100.0).contains(&digits) {
                return Err(ScriptError::range(
                    "toFixed() digits argument must be between 0 and 100",
                ));
            }
            Value::from(to_fixed(n, digits as usize))
        }
        "toString" => {
            let radix = match args.first() {
                None | Some(Value::Undefined) => 10,
                Some(r) => to_integer(r) as u32,
            };
            Value::from(to_radix_string(n, radix)?)
        }
        "toLocaleString" => Value::from(to_locale_string(n)),
        "valueOf" => Value::Number(n),
        _ => return Ok(None),
    }))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(1.005, 2, "1.00")]
    #[case(2.5, 0, "3")]
    #[case(0.125, 2, "0.13")]
    #[case(-1.5, 0, "-2")]
    #[case(9.995, 2, "9.99")]
    #[case(99.5, 0, "100")]
    #[case(3.14159, 3, "3.142")]
    #[case(-0.0001, 2, "-0.00")]
    fn to_fixed_matches_js(#[case] n: f64, #[case] digits: usize, #[case] expected: &str) {
        assert_eq!(to_fixed(n, digits), expected);
    }

    #[rstest]
    #[case(1234567.891, "1,234,567.891")]
    #[case(-1000.0, "-1,000")]
    #[case(0.5, "0.5")]
    #[case(999.9999, "1,000")]
    fn locale_string_groups_thousands(#[case] n: f64, #[case] expected: &str) {
        assert_eq!(to_locale_string(n), expected);
    }

    #[test]
    fn radix_conversion() {
        assert_eq!(to_radix_string(255.0, 16).unwrap(), "ff");
        assert_eq!(to_radix_string(-5.0, 2).unwrap(), "-101");
        assert!(to_radix_string(1.0, 1).is_err());
    }

    #[test]
    fn array_index_requires_canonical_form() {
        assert_eq!(array_index("3"), Some(3));
        assert_eq!(array_index("03"), None);
        assert_eq!(array_index("-1"), None);
    }

    #[test]
    fn writing_past_the_end_grows_the_array() {
        let array = Value::array(vec![]);
        set_property(&array, "2".into(), Value::from(1.0)).unwrap();
        assert_eq!(get_property(&array, "length").unwrap().to_number(), 3.0);
        assert!(matches!(get_property(&array, "0").unwrap(), Value::Undefined));
    }

    #[test]
    fn reading_from_null_is_a_type_error() {
        let err = get_property(&Value::Null, "x").unwrap_err();
        assert_eq!(err.message(), "Cannot read properties of null (reading 'x')");
    }
}
