//! # Value
//!
//! The variant type exchanged with the RPC layer. Decoding produces it,
//! encoding consumes it, and conversion steps rewrite it in place, so a step
//! may turn an integer into a float or a string into bytes.

use base64::Engine as _;
use bytes::Bytes;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Void,
    Boolean(bool),
    Integer(i32),
    Float(f64),
    String(String),
    /// Opaque byte string, rendered as base64 text on the RPC wire
    Base64(Bytes),
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Base64(_) => "base64",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    /// Integer view of the value
    ///
    /// Floats are truncated, strings are parsed (decimal or `0x` hex) and
    /// anything else that has no integer meaning becomes zero.
    pub fn as_i32(&self) -> i32 {
        match self {
            Value::Boolean(b) => *b as i32,
            Value::Integer(i) => *i,
            Value::Float(f) if f.is_finite() => *f as i32,
            Value::String(s) => crate::bits::parse_number(s),
            _ => 0,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Boolean(b) => *b as i32 as f64,
            Value::Integer(i) => *i as f64,
            Value::Float(f) => *f,
            Value::String(s) => crate::bits::parse_double(s),
            _ => 0.0,
        }
    }

    /// Boolean view; the string `"true"` is true regardless of case
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// Text view used by string conversions
    pub fn as_text(&self) -> String {
        match self {
            Value::Void => String::new(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Base64(b) => String::from_utf8_lossy(b).into_owned(),
            Value::Array(_) | Value::Struct(_) => String::new(),
        }
    }

    /// Raw bytes carried by string-like values
    pub fn as_bytes(&self) -> Vec<u8> {
        match self {
            Value::String(s) => s.as_bytes().to_vec(),
            Value::Base64(b) => b.to_vec(),
            _ => Vec::new(),
        }
    }

    /// Convert into a `serde_json::Value` for callers that speak JSON
    ///
    /// Base64 values become base64 text, non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Void => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::Number((*i as i64).into()),
            Value::Float(f) => {
                serde_json::Number::from_f64(*f).map_or(serde_json::Value::Null, Into::into)
            }
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Base64(b) => serde_json::Value::String(
                base64::engine::general_purpose::STANDARD.encode(b.as_ref()),
            ),
            Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Struct(fields) => serde_json::Value::Object(
                fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lossy_views() {
        assert_eq!(Value::Float(10.9).as_i32(), 10);
        assert_eq!(Value::from("0x10").as_i32(), 16);
        assert_eq!(Value::Boolean(true).as_f64(), 1.0);
        assert!(Value::from("TRUE").as_bool());
        assert!(!Value::Void.as_bool());
        assert_eq!(Value::Integer(5).as_text(), "5");
    }

    #[test]
    fn test_to_json() {
        let mut fields = BTreeMap::new();
        fields.insert("LEVEL".to_string(), Value::Float(0.5));
        fields.insert("RAW".to_string(), Value::Base64(Bytes::from_static(b"hi")));
        let json = Value::Struct(fields).to_json();

        assert_eq!(json["LEVEL"], serde_json::json!(0.5));
        assert_eq!(json["RAW"], serde_json::json!("aGk="));
        assert_eq!(Value::Float(f64::NAN).to_json(), serde_json::Value::Null);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::default().type_name(), "void");
        assert_eq!(Value::Array(vec![]).type_name(), "array");
    }
}
