//! Dynamic SQL values.

use serde::{Deserialize, Serialize};

/// A dynamically-typed scalar as produced by the engine.
///
/// SQLite stores five storage classes; BLOBs are decoded to `Text` before they
/// reach this type, and `Bool` exists for caller-supplied parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,

    /// Boolean value
    Bool(bool),

    /// 64-bit signed integer
    Int(i64),

    /// 64-bit floating point
    Float(f64),

    /// Text string
    Text(String),
}

impl Value {
    /// Check if this value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the type name of this value, in the spelling used by argument
    /// type errors (`null`, `bool`, `int`, `float`, `string`).
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "string",
        }
    }

    /// Try to convert this value to a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Try to convert this value to an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Try to convert this value to an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Textual rendering of a non-null value; `None` for NULL.
    ///
    /// Integers are rendered in decimal, booleans as `"1"`/`"0"` and floats
    /// with 14 significant digits (see [`format_float`]).
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Value::Int(v) => Some(v.to_string()),
            Value::Float(v) => Some(format_float(*v)),
            Value::Text(s) => Some(s.clone()),
        }
    }

    /// Convert every non-null scalar to `Text`, leaving NULL untouched.
    #[must_use]
    pub fn stringify(self) -> Self {
        match self {
            Value::Null => Value::Null,
            Value::Text(s) => Value::Text(s),
            other => other.to_text().map_or(Value::Null, Value::Text),
        }
    }

    /// Render as a JSON value.
    ///
    /// Non-finite floats have no JSON form and become their text spelling.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(v) => serde_json::Value::from(*v),
            Value::Float(v) => serde_json::Number::from_f64(*v)
                .map_or_else(|| serde_json::Value::String(format_float(*v)), serde_json::Value::Number),
            Value::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// Format a float the way the reference driver stringifies it: 14 significant
/// digits, trailing zeros dropped, exponent notation outside `1e-4 ..< 1e14`.
///
/// ```
/// use mysqlite_core::format_float;
///
/// assert_eq!(format_float(1.23), "1.23");
/// assert_eq!(format_float(1.0), "1");
/// assert_eq!(format_float(1e14), "1.0E+14");
/// assert_eq!(format_float(0.00001), "1.0E-5");
/// ```
pub fn format_float(v: f64) -> String {
    if v.is_nan() {
        return "NAN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // "d.ddddddddddddde<exp>", correctly rounded to 14 significant digits
    let sci = format!("{:.13e}", v.abs());
    let (mantissa, exponent) = match sci.split_once('e') {
        Some(parts) => parts,
        None => return sci,
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let digits = digits.trim_end_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };

    // position of the decimal point relative to the digit string
    let decpt = exponent + 1;

    let mut out = String::with_capacity(24);
    if v < 0.0 {
        out.push('-');
    }

    if decpt < -3 || decpt > 14 {
        let (first, rest) = digits.split_at(1);
        out.push_str(first);
        out.push('.');
        out.push_str(if rest.is_empty() { "0" } else { rest });
        out.push('E');
        out.push(if exponent < 0 { '-' } else { '+' });
        out.push_str(&exponent.unsigned_abs().to_string());
    } else if decpt <= 0 {
        out.push_str("0.");
        for _ in 0..decpt.unsigned_abs() {
            out.push('0');
        }
        out.push_str(digits);
    } else {
        let point = decpt.unsigned_abs() as usize;
        if digits.len() <= point {
            out.push_str(digits);
            for _ in digits.len()..point {
                out.push('0');
            }
        } else {
            let (int_part, frac_part) = digits.split_at(point);
            out.push_str(int_part);
            out.push('.');
            out.push_str(frac_part);
        }
    }
    out
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::Bool(true).type_name(), "bool");
        assert_eq!(Value::Int(1).type_name(), "int");
        assert_eq!(Value::Float(1.5).type_name(), "float");
        assert_eq!(Value::from("x").type_name(), "string");
    }

    #[test]
    fn test_stringify_scalars() {
        assert_eq!(Value::Int(-42).stringify(), Value::from("-42"));
        assert_eq!(Value::Bool(true).stringify(), Value::from("1"));
        assert_eq!(Value::Bool(false).stringify(), Value::from("0"));
        assert_eq!(Value::Float(1.5).stringify(), Value::from("1.5"));
        assert_eq!(Value::Null.stringify(), Value::Null);
    }

    #[test]
    fn test_format_float_fixed() {
        assert_eq!(format_float(1.23), "1.23");
        assert_eq!(format_float(1.0), "1");
        assert_eq!(format_float(-2.5), "-2.5");
        assert_eq!(format_float(100.0), "100");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(0.0001), "0.0001");
        assert_eq!(format_float(1e14 - 1.0), "99999999999999");
        assert_eq!(format_float(0.1 + 0.2), "0.3");
        assert_eq!(format_float(1.0 / 3.0), "0.33333333333333");
        assert_eq!(format_float(0.0), "0");
        assert_eq!(format_float(-0.0), "-0");
    }

    #[test]
    fn test_format_float_exponent() {
        assert_eq!(format_float(1e15), "1.0E+15");
        assert_eq!(format_float(1e14), "1.0E+14");
        assert_eq!(format_float(0.00001), "1.0E-5");
        assert_eq!(format_float(-1.5e-7), "-1.5E-7");
        assert_eq!(format_float(1.25e20), "1.25E+20");
    }

    #[test]
    fn test_format_float_special() {
        assert_eq!(format_float(f64::NAN), "NAN");
        assert_eq!(format_float(f64::INFINITY), "INF");
        assert_eq!(format_float(f64::NEG_INFINITY), "-INF");
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Value::from(Some(7_i64)), Value::Int(7));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from("12").as_i64(), Some(12));
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Int(0).as_bool(), Some(false));
    }

    #[test]
    fn test_to_json() {
        assert_eq!(Value::Int(3).to_json(), serde_json::json!(3));
        assert_eq!(Value::Null.to_json(), serde_json::Value::Null);
        assert_eq!(Value::Float(f64::INFINITY).to_json(), serde_json::json!("INF"));
    }
}
