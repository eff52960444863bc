//! Boxed value codec for request `args` and `options`.
//!
//! Values travel as `google.protobuf.Any`: the `type_url` names how the bytes
//! are encoded, and the bytes are always text. Four tags are understood:
//!
//! | tag           | payload                          |
//! |---------------|----------------------------------|
//! | `StringValue` | raw UTF-8 text                   |
//! | `DoubleValue` | decimal text of an `f64`         |
//! | `BoolValue`   | `"true"` or `"false"`            |
//! | `Struct`      | JSON text                        |
//!
//! The tag set is closed. Anything else must be sent as `Struct`.

use crate::error::{PluginError, Result};
use prost_types::Any;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Type URL used for string values.
pub const STRING_TYPE_URL: &str = "type.googleapis.com/google.protobuf.StringValue";
/// Type URL used for numeric values.
pub const DOUBLE_TYPE_URL: &str = "type.googleapis.com/google.protobuf.DoubleValue";
/// Type URL used for boolean values.
pub const BOOL_TYPE_URL: &str = "type.googleapis.com/google.protobuf.BoolValue";
/// Type URL used for structured (JSON) values.
pub const STRUCT_TYPE_URL: &str = "type.googleapis.com/google.protobuf.Struct";

/// Decoding markers in match priority order.
const MARKERS: [(&str, Kind); 4] = [
    ("StringValue", Kind::String),
    ("DoubleValue", Kind::Number),
    ("BoolValue", Kind::Bool),
    ("Struct", Kind::Struct),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    String,
    Number,
    Bool,
    Struct,
}

/// A decoded boxed value.
#[derive(Debug, Clone, PartialEq)]
pub enum DynamicValue {
    String(String),
    Number(f64),
    Bool(bool),
    /// Any JSON tree that is not a bare string, number or boolean.
    Struct(serde_json::Value),
}

impl DynamicValue {
    /// Borrow the value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DynamicValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DynamicValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DynamicValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&serde_json::Value> {
        match self {
            DynamicValue::Struct(v) => Some(v),
            _ => None,
        }
    }

    /// Convert into a JSON tree.
    ///
    /// Non-finite numbers have no JSON form and become `null`.
    pub fn into_json(self) -> serde_json::Value {
        match self {
            DynamicValue::String(s) => serde_json::Value::String(s),
            DynamicValue::Number(n) => serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            DynamicValue::Bool(b) => serde_json::Value::Bool(b),
            DynamicValue::Struct(v) => v,
        }
    }

    /// The type URL this value is packed under when no override is given.
    pub fn default_type_url(&self) -> &'static str {
        match self {
            DynamicValue::String(_) => STRING_TYPE_URL,
            DynamicValue::Number(_) => DOUBLE_TYPE_URL,
            DynamicValue::Bool(_) => BOOL_TYPE_URL,
            DynamicValue::Struct(_) => STRUCT_TYPE_URL,
        }
    }

    /// Encoded payload text.
    fn encode(&self) -> String {
        match self {
            DynamicValue::String(s) => s.clone(),
            DynamicValue::Number(n) => n.to_string(),
            DynamicValue::Bool(b) => b.to_string(),
            DynamicValue::Struct(v) => v.to_string(),
        }
    }
}

impl fmt::Display for DynamicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl From<String> for DynamicValue {
    fn from(value: String) -> Self {
        DynamicValue::String(value)
    }
}

impl From<&str> for DynamicValue {
    fn from(value: &str) -> Self {
        DynamicValue::String(value.to_string())
    }
}

impl From<f64> for DynamicValue {
    fn from(value: f64) -> Self {
        DynamicValue::Number(value)
    }
}

impl From<i64> for DynamicValue {
    fn from(value: i64) -> Self {
        DynamicValue::Number(value as f64)
    }
}

impl From<bool> for DynamicValue {
    fn from(value: bool) -> Self {
        DynamicValue::Bool(value)
    }
}

impl From<serde_json::Value> for DynamicValue {
    /// Classify a JSON tree the same way [`pack_serializable`] does.
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => DynamicValue::String(s),
            serde_json::Value::Bool(b) => DynamicValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => DynamicValue::Number(f),
                None => DynamicValue::Struct(serde_json::Value::Number(n)),
            },
            other => DynamicValue::Struct(other),
        }
    }
}

/// Pack a value into a boxed `Any`.
///
/// `type_url` replaces the inferred tag but never changes how the payload is
/// encoded.
pub fn pack(value: impl Into<DynamicValue>, type_url: Option<&str>) -> Any {
    let value = value.into();
    Any {
        type_url: type_url.unwrap_or(value.default_type_url()).to_string(),
        value: value.encode().into_bytes(),
    }
}

/// Pack any serializable value, inferring its tag from its JSON shape.
///
/// JSON strings, numbers and booleans take their scalar tags; everything else
/// (objects, arrays, null) is packed as `Struct`.
pub fn pack_serializable<T>(value: &T, type_url: Option<&str>) -> Result<Any>
where
    T: Serialize + ?Sized,
{
    let json = serde_json::to_value(value).map_err(PluginError::encoding)?;
    Ok(pack(DynamicValue::from(json), type_url))
}

/// Unpack a boxed `Any`.
///
/// The first marker contained in `type_url` wins. Unknown tags decode to the
/// raw payload text.
pub fn unpack(boxed: &Any) -> Result<DynamicValue> {
    let text = String::from_utf8_lossy(&boxed.value);
    let kind = MARKERS
        .iter()
        .find(|(marker, _)| boxed.type_url.contains(marker))
        .map(|(_, kind)| *kind);

    match kind {
        Some(Kind::Number) => Ok(DynamicValue::Number(parse_leading_f64(&text))),
        Some(Kind::Bool) => Ok(DynamicValue::Bool(text == "true")),
        Some(Kind::Struct) => serde_json::from_str(&text)
            .map(DynamicValue::Struct)
            .map_err(|e| PluginError::decoding(boxed.type_url.clone(), e)),
        Some(Kind::String) | None => Ok(DynamicValue::String(text.into_owned())),
    }
}

/// Parse the longest decimal prefix of `text` as an `f64`.
///
/// Leading whitespace is skipped and trailing garbage ignored, so `"12px"` is
/// 12. `Infinity` is accepted with an optional sign. Text with no numeric
/// prefix is NaN.
fn parse_leading_f64(text: &str) -> f64 {
    let text = text.trim_start();
    let bytes = text.as_bytes();

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    if text[end..].starts_with("Infinity") {
        return if text.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let digits_from = |start: usize| {
        bytes[start..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let int_digits = digits_from(end);
    end += int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = digits_from(end + 1);
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return f64::NAN;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = digits_from(exp_end);
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }

    text[..end].parse::<f64>().unwrap_or(f64::NAN)
}

/// Unpack every entry of a boxed map, failing on the first malformed entry.
pub fn unpack_map(map: &HashMap<String, Any>) -> Result<HashMap<String, DynamicValue>> {
    map.iter()
        .map(|(key, boxed)| Ok((key.clone(), unpack(boxed)?)))
        .collect()
}
