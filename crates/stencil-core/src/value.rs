//! Coercion and comparison helpers shared by the evaluator, the template
//! compiler and the loop engine.

use serde_json::{Number, Value};

/// Document truthiness: `null`, `false`, `0`, non-finite numbers and `""`
/// are falsy. Empty arrays and objects are truthy.
pub fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && f.is_finite()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Numeric view used by `>`, `>=`, `<`, `<=`. Strings must be fully numeric.
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s).and_then(|n| n.as_f64()),
        _ => None,
    }
}

/// Integer view used by loop bounds. Floats qualify only when they carry no
/// fractional part; strings never do.
pub fn as_integer(value: &Value) -> Option<i64> {
    let Value::Number(n) = value else {
        return None;
    };
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    if f.fract() == 0.0 && f.is_finite() && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Equality that refuses to coerce: both sides must have the same JSON type.
/// Numbers compare by value, so `1` equals `1.0`.
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| strict_eq(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, l)| y.get(k).is_some_and(|r| strict_eq(l, r)))
        }
        _ => a == b,
    }
}

/// Parse text that is *entirely* a decimal number (surrounding whitespace
/// allowed). Rejects `inf`, `nan`, hex and empty input.
pub fn parse_number(text: &str) -> Option<Number> {
    let t = text.trim();
    if t.is_empty()
        || !t.bytes().any(|b| b.is_ascii_digit())
        || !t
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
    {
        return None;
    }
    if !t.contains(['.', 'e', 'E'])
        && let Ok(i) = t.parse::<i64>()
    {
        return Some(Number::from(i));
    }
    let f = t.parse::<f64>().ok()?;
    Number::from_f64(f)
}

/// Literal coercion applied to whole strings: `"true"`/`"false"` become
/// booleans, numeric text becomes a number, anything else stays a string.
pub fn coerce_scalar(text: &str) -> Value {
    match text.trim() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        trimmed => match parse_number(trimmed) {
            Some(n) => Value::Number(n),
            None => Value::String(text.to_string()),
        },
    }
}

/// Text used when a value is spliced into a larger string.
pub fn display_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.as_i64().is_none() && n.as_u64().is_none() => format_f64(f),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn format_f64(f: f64) -> String {
    if f.fract() == 0.0 && f.is_finite() {
        format!("{:.0}", f)
    } else {
        f.to_string()
    }
}
