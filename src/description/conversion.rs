//! # Conversion Engine
//!
//! The closed set of transformations between wire integers and logical
//! values. Decoding runs a parameter's chain back to front, encoding front
//! to back. Each step rewrites the [`Value`] in place and may change its type.

use bytes::Bytes;
use std::collections::BTreeMap;
use thiserror::Error;

use super::parameter::LogicalParameter;
use crate::bits;
use crate::rpc::binary;
use crate::value::Value;

/// Factor table of the default configtime encoding, keyed by the top 3 bits
pub const CONFIG_TIME_FACTORS: [f64; 8] = [0.1, 1.0, 5.0, 10.0, 60.0, 300.0, 600.0, 3600.0];

/// Largest mantissa of the default configtime encoding
const CONFIG_TIME_MAX_MANTISSA: f64 = 31.0;

/// A conversion step that could not produce a value
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("scale factor is zero")]
    ZeroFactor,

    #[error("no factor at index {0}")]
    FactorIndex(usize),

    #[error("no enum option with index {0}")]
    UnknownOptionIndex(i32),

    #[error("no enum option called \"{0}\"")]
    UnknownOption(String),

    #[error("\"{0}\" is not an unsigned integer")]
    NotUnsigned(String),

    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("nested value could not be decoded: {0}")]
    Rpc(String),
}

/// Two-way integer table of a map conversion
#[derive(Debug, Clone, PartialEq)]
pub struct ValueMap {
    /// Device value to parameter value
    pub from_device_table: BTreeMap<i32, i32>,
    /// Parameter value to device value
    pub to_device_table: BTreeMap<i32, i32>,
    pub from_device: bool,
    pub to_device: bool,
}

impl Default for ValueMap {
    fn default() -> Self {
        Self {
            from_device_table: BTreeMap::new(),
            to_device_table: BTreeMap::new(),
            from_device: true,
            to_device: true,
        }
    }
}

impl ValueMap {
    /// Register one `value_map` entry in both directions
    pub fn insert(&mut self, device_value: i32, parameter_value: i32) {
        self.from_device_table.insert(device_value, parameter_value);
        self.to_device_table.insert(parameter_value, device_value);
    }

    pub fn from_device(&self, value: i32) -> i32 {
        match self.from_device_table.get(&value) {
            Some(mapped) if self.from_device => *mapped,
            _ => value,
        }
    }

    pub fn to_device(&self, value: i32) -> i32 {
        match self.to_device_table.get(&value) {
            Some(mapped) if self.to_device => *mapped,
            _ => value,
        }
    }
}

/// Bit layout of a tinyfloat field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TinyFloat {
    pub mantissa_start: u32,
    pub mantissa_size: u32,
    pub exponent_start: u32,
    pub exponent_size: u32,
}

impl Default for TinyFloat {
    fn default() -> Self {
        Self { mantissa_start: 5, mantissa_size: 11, exponent_start: 0, exponent_size: 5 }
    }
}

fn field_max(width: u32) -> i64 {
    (1i64 << width.min(31)) - 1
}

impl TinyFloat {
    pub fn decode(&self, raw: i32) -> i32 {
        let raw = raw as u32 as i64;
        let mantissa = if self.mantissa_size == 0 {
            1
        } else {
            (raw >> self.mantissa_start.min(31)) & field_max(self.mantissa_size)
        };
        let exponent = (raw >> self.exponent_start.min(31)) & field_max(self.exponent_size);
        (mantissa << exponent.min(31)).min(i32::MAX as i64) as i32
    }

    pub fn encode(&self, value: i32) -> i32 {
        let max_mantissa = field_max(self.mantissa_size);
        let max_exponent = field_max(self.exponent_size);
        let mut mantissa = (value as i64).max(0);
        let mut exponent = 0i64;
        while mantissa > max_mantissa {
            mantissa >>= 1;
            exponent += 1;
        }
        let mantissa = mantissa.min(max_mantissa);
        let exponent = exponent.min(max_exponent);
        ((mantissa << self.mantissa_start.min(31)) | (exponent << self.exponent_start.min(31))) as i32
    }
}

/// Boolean-integer thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BooleanInteger {
    pub threshold: i32,
    pub value_false: i32,
    pub value_true: i32,
    pub invert: bool,
}

impl Default for BooleanInteger {
    fn default() -> Self {
        Self { threshold: 1, value_false: 0, value_true: 0, invert: false }
    }
}

/// One step of a conversion chain
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterConversion {
    FloatIntegerScale { factor: f64, offset: f64 },
    IntegerIntegerScale { div: i32, mul: i32 },
    IntegerIntegerMap(ValueMap),
    OptionInteger(ValueMap),
    BooleanInteger(BooleanInteger),
    /// `factors` empty selects the fixed 8-entry table
    FloatConfigTime { factors: Vec<f64>, value_size: f64 },
    IntegerTinyFloat(TinyFloat),
    OptionString,
    StringUnsignedInteger,
    HexstringBytearray,
    StringJsonArrayFloat,
    RpcBinary,
    BlindTest { value: i32 },
    Toggle { on: i32, off: i32 },
    Cfm,
    CcrtdnParty,
}

/// Whether the chain continues after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Done,
}

type StepResult = std::result::Result<Flow, ConversionError>;

impl ParameterConversion {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FloatIntegerScale { .. } => "float_integer_scale",
            Self::IntegerIntegerScale { .. } => "integer_integer_scale",
            Self::IntegerIntegerMap(_) => "integer_integer_map",
            Self::OptionInteger(_) => "option_integer",
            Self::BooleanInteger(_) => "boolean_integer",
            Self::FloatConfigTime { .. } => "float_configtime",
            Self::IntegerTinyFloat(_) => "integer_tinyfloat",
            Self::OptionString => "option_string",
            Self::StringUnsignedInteger => "string_unsigned_integer",
            Self::HexstringBytearray => "hexstring_bytearray",
            Self::StringJsonArrayFloat => "string_json_array_float",
            Self::RpcBinary => "rpc_binary",
            Self::BlindTest { .. } => "blind_test",
            Self::Toggle { .. } => "toggle",
            Self::Cfm => "cfm",
            Self::CcrtdnParty => "ccrtdn_party",
        }
    }

    /// Whether this step bypasses the generic chain with its own byte layout
    pub fn is_fixed_layout(&self) -> bool {
        matches!(self, Self::Cfm | Self::CcrtdnParty)
    }

    /// Apply the decode direction of this step
    ///
    /// # Arguments
    ///
    /// * `value` - Value produced so far, rewritten in place
    /// * `logical` - Logical descriptor of the owning parameter
    /// * `raw` - Unconverted wire bytes, needed by nested binary values
    ///
    /// # Errors
    ///
    /// Returns error if the step has no defined result for the input
    pub fn from_packet(&self, value: &mut Value, logical: &LogicalParameter, raw: &[u8]) -> StepResult {
        match self {
            Self::FloatIntegerScale { factor, offset } => {
                if *factor == 0.0 {
                    return Err(ConversionError::ZeroFactor);
                }
                *value = Value::Float(value.as_i32() as f64 / factor - offset);
            }
            Self::IntegerIntegerScale { div, mul } => {
                let mut v = value.as_i32();
                if *div > 0 {
                    v = v.wrapping_mul(*div);
                }
                if *mul > 0 {
                    v /= mul;
                }
                *value = Value::Integer(v);
            }
            Self::IntegerIntegerMap(map) | Self::OptionInteger(map) => {
                *value = Value::Integer(map.from_device(value.as_i32()));
            }
            Self::BooleanInteger(b) => {
                let v = value.as_i32();
                let mut result = if b.value_true == 0 && b.value_false == 0 {
                    v >= b.threshold
                } else if v == b.value_false {
                    false
                } else {
                    v == b.value_true || v >= b.threshold
                };
                if b.invert {
                    result = !result;
                }
                *value = Value::Boolean(result);
            }
            Self::FloatConfigTime { factors, value_size } => {
                let v = value.as_i32();
                if *value_size > 0.0 && !factors.is_empty() {
                    let bits = bits::bit_width(*value_size).min(30);
                    let index = ((v as u32) >> bits) as usize;
                    let factor = factors.get(index).ok_or(ConversionError::FactorIndex(index))?;
                    let mantissa = v & ((1i32 << bits) - 1);
                    *value = Value::Float(mantissa as f64 * factor);
                } else {
                    let index = ((v & 0xFF) >> 5) as usize;
                    *value = Value::Float((v & 0x1F) as f64 * CONFIG_TIME_FACTORS[index]);
                }
            }
            Self::IntegerTinyFloat(layout) => {
                *value = Value::Integer(layout.decode(value.as_i32()));
            }
            Self::OptionString => {
                let index = value.as_i32();
                let id = logical.option_id(index).ok_or(ConversionError::UnknownOptionIndex(index))?;
                *value = Value::String(id.to_string());
            }
            Self::StringUnsignedInteger => {
                *value = Value::String((value.as_i32() as u32).to_string());
            }
            Self::HexstringBytearray => {
                *value = Value::String(hex::encode_upper(value.as_bytes()));
            }
            Self::StringJsonArrayFloat => {
                if let Value::Array(items) = value {
                    let text = items
                        .iter()
                        .map(|i| i.as_f64().to_string())
                        .collect::<Vec<_>>()
                        .join(";");
                    *value = Value::String(text);
                }
            }
            Self::RpcBinary => {
                *value = binary::decode_response(raw, 0).map_err(|e| ConversionError::Rpc(e.to_string()))?;
                return Ok(Flow::Done);
            }
            Self::BlindTest { value: constant } => {
                *value = Value::Integer(*constant);
            }
            Self::Toggle { .. } | Self::Cfm | Self::CcrtdnParty => {}
        }
        Ok(Flow::Continue)
    }

    /// Apply the encode direction of this step
    ///
    /// # Errors
    ///
    /// Returns error if the step has no defined result for the input
    pub fn to_packet(&self, value: &mut Value, logical: &LogicalParameter) -> StepResult {
        match self {
            Self::FloatIntegerScale { factor, offset } => {
                *value = Value::Integer(((value.as_f64() + offset) * factor).round() as i32);
            }
            Self::IntegerIntegerScale { div, mul } => {
                let mut v = value.as_i32();
                if *mul > 0 {
                    v = v.wrapping_mul(*mul);
                }
                if *div > 0 {
                    v /= div;
                }
                *value = Value::Integer(v);
            }
            Self::IntegerIntegerMap(map) | Self::OptionInteger(map) => {
                *value = Value::Integer(map.to_device(value.as_i32()));
            }
            Self::BooleanInteger(b) => {
                let mut flag = value.as_bool();
                if b.invert {
                    flag = !flag;
                }
                let v = if b.value_true == 0 && b.value_false == 0 {
                    flag as i32
                } else if flag {
                    b.value_true
                } else {
                    b.value_false
                };
                *value = Value::Integer(v);
            }
            Self::FloatConfigTime { factors, value_size } => {
                let v = value.as_f64().max(0.0);
                *value = Value::Integer(encode_config_time(v, factors, *value_size)?);
            }
            Self::IntegerTinyFloat(layout) => {
                *value = Value::Integer(layout.encode(value.as_i32()));
            }
            Self::OptionString => {
                let text = value.as_text();
                let index = logical
                    .option_index(&text)
                    .or_else(|| bits::try_parse_number(&text))
                    .ok_or(ConversionError::UnknownOption(text))?;
                *value = Value::Integer(index);
            }
            Self::StringUnsignedInteger => {
                let text = value.as_text();
                let parsed = text.trim().parse::<u32>().map_err(|_| ConversionError::NotUnsigned(text))?;
                *value = Value::Integer(parsed as i32);
            }
            Self::HexstringBytearray => {
                let text = value.as_text();
                let raw = hex::decode(text.trim()).map_err(|e| ConversionError::InvalidHex(e.to_string()))?;
                *value = Value::Base64(Bytes::from(raw));
            }
            Self::StringJsonArrayFloat => {
                let text = value.as_text();
                let items = text
                    .split(';')
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| Value::Float(bits::parse_double(s)))
                    .collect();
                *value = Value::Array(items);
            }
            Self::RpcBinary => {
                *value = Value::Base64(Bytes::from(binary::encode_response(value)));
                return Ok(Flow::Done);
            }
            Self::BlindTest { value: constant } => {
                *value = Value::Integer(*constant);
            }
            Self::Toggle { .. } | Self::Cfm | Self::CcrtdnParty => {}
        }
        Ok(Flow::Continue)
    }
}

fn encode_config_time(value: f64, factors: &[f64], value_size: f64) -> std::result::Result<i32, ConversionError> {
    if value_size > 0.0 && !factors.is_empty() {
        let bits = bits::bit_width(value_size).min(30);
        let max = ((1i64 << bits) - 1) as f64;
        let mut index = 0;
        while index + 1 < factors.len() && (factors[index] == 0.0 || value / factors[index] > max) {
            index += 1;
        }
        let factor = factors[index];
        if factor == 0.0 {
            return Err(ConversionError::ZeroFactor);
        }
        let mantissa = (value / factor).round().min(max) as i32;
        return Ok(((index as i32) << bits) | mantissa);
    }

    let index = CONFIG_TIME_FACTORS
        .iter()
        .position(|f| value <= CONFIG_TIME_MAX_MANTISSA * f)
        .unwrap_or(CONFIG_TIME_FACTORS.len() - 1);
    let mantissa = (value / CONFIG_TIME_FACTORS[index]).round().min(CONFIG_TIME_MAX_MANTISSA) as i32;
    Ok(((index as i32) << 5 | mantissa) & 0xFF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::parameter::{EnumOption, LogicalType};

    fn logical() -> LogicalParameter {
        LogicalParameter::default()
    }

    fn decode(conv: &ParameterConversion, value: Value) -> Value {
        let mut value = value;
        conv.from_packet(&mut value, &logical(), &[]).unwrap();
        value
    }

    fn encode(conv: &ParameterConversion, value: Value) -> Value {
        let mut value = value;
        conv.to_packet(&mut value, &logical()).unwrap();
        value
    }

    #[test]
    fn test_float_integer_scale() {
        let conv = ParameterConversion::FloatIntegerScale { factor: 2.0, offset: 0.0 };
        assert_eq!(encode(&conv, Value::Float(10.5)), Value::Integer(21));
        assert_eq!(decode(&conv, Value::Integer(21)), Value::Float(10.5));

        let offset = ParameterConversion::FloatIntegerScale { factor: 10.0, offset: 10.0 };
        assert_eq!(encode(&offset, Value::Float(-2.5)), Value::Integer(75));
        assert_eq!(decode(&offset, Value::Integer(75)), Value::Float(-2.5));
    }

    #[test]
    fn test_zero_factor_fails() {
        let conv = ParameterConversion::FloatIntegerScale { factor: 0.0, offset: 0.0 };
        let mut value = Value::Integer(3);
        assert_eq!(conv.from_packet(&mut value, &logical(), &[]), Err(ConversionError::ZeroFactor));
    }

    #[test]
    fn test_integer_integer_scale_order() {
        let conv = ParameterConversion::IntegerIntegerScale { div: 10, mul: 4 };
        // decode multiplies by div, then divides by mul
        assert_eq!(decode(&conv, Value::Integer(6)), Value::Integer(15));
        // encode multiplies by mul, then divides by div
        assert_eq!(encode(&conv, Value::Integer(15)), Value::Integer(6));
    }

    #[test]
    fn test_value_map_passes_unmapped_through() {
        let mut map = ValueMap::default();
        map.insert(0xC8, 1);
        map.insert(0x00, 0);
        let conv = ParameterConversion::IntegerIntegerMap(map);

        assert_eq!(decode(&conv, Value::Integer(0xC8)), Value::Integer(1));
        assert_eq!(encode(&conv, Value::Integer(1)), Value::Integer(0xC8));
        assert_eq!(decode(&conv, Value::Integer(7)), Value::Integer(7));
        assert_eq!(encode(&conv, Value::Integer(7)), Value::Integer(7));
    }

    #[test]
    fn test_value_map_direction_flags() {
        let mut map = ValueMap { from_device: false, ..Default::default() };
        map.insert(5, 50);
        let conv = ParameterConversion::OptionInteger(map);
        assert_eq!(decode(&conv, Value::Integer(5)), Value::Integer(5));
        assert_eq!(encode(&conv, Value::Integer(50)), Value::Integer(5));
    }

    #[test]
    fn test_boolean_integer_threshold() {
        let conv = ParameterConversion::BooleanInteger(BooleanInteger::default());
        assert_eq!(decode(&conv, Value::Integer(0)), Value::Boolean(false));
        assert_eq!(decode(&conv, Value::Integer(200)), Value::Boolean(true));
        assert_eq!(encode(&conv, Value::Boolean(true)), Value::Integer(1));
        assert_eq!(encode(&conv, Value::from("true")), Value::Integer(1));
    }

    #[test]
    fn test_boolean_integer_sentinels_and_invert() {
        let conv = ParameterConversion::BooleanInteger(BooleanInteger {
            threshold: 100,
            value_false: 0,
            value_true: 200,
            invert: true,
        });
        assert_eq!(decode(&conv, Value::Integer(200)), Value::Boolean(false));
        assert_eq!(decode(&conv, Value::Integer(0)), Value::Boolean(true));
        assert_eq!(decode(&conv, Value::Integer(150)), Value::Boolean(false));
        assert_eq!(encode(&conv, Value::Boolean(false)), Value::Integer(200));
        assert_eq!(encode(&conv, Value::Boolean(true)), Value::Integer(0));
    }

    #[test]
    fn test_config_time_default_table_selects_smallest_index() {
        let conv = ParameterConversion::FloatConfigTime { factors: vec![], value_size: 0.0 };
        // 3.1 fits 31 * 0.1
        assert_eq!(encode(&conv, Value::Float(3.1)), Value::Integer(31));
        // 3.2 needs factor 1
        assert_eq!(encode(&conv, Value::Float(3.2)), Value::Integer(1 << 5 | 3));
        // 120 fits 31 * 5
        assert_eq!(encode(&conv, Value::Float(120.0)), Value::Integer(2 << 5 | 24));
        // beyond every range: last index, mantissa saturated
        assert_eq!(encode(&conv, Value::Float(1_000_000.0)), Value::Integer(7 << 5 | 31));
        assert_eq!(encode(&conv, Value::Float(-4.0)), Value::Integer(0));
    }

    #[test]
    fn test_config_time_decode_never_fails() {
        let conv = ParameterConversion::FloatConfigTime { factors: vec![], value_size: 0.0 };
        for raw in 0..=0xFF {
            let mut value = Value::Integer(raw);
            assert!(conv.from_packet(&mut value, &logical(), &[]).is_ok());
        }
        assert_eq!(decode(&conv, Value::Integer(3 << 5 | 12)), Value::Float(120.0));
    }

    #[test]
    fn test_config_time_custom_factors() {
        let conv = ParameterConversion::FloatConfigTime { factors: vec![0.1, 1.0, 60.0], value_size: 1.6 };
        // 14 bits of mantissa, max 16383
        assert_eq!(encode(&conv, Value::Float(10.0)), Value::Integer(100));
        assert_eq!(encode(&conv, Value::Float(2000.0)), Value::Integer(1 << 14 | 2000));
        assert_eq!(decode(&conv, Value::Integer(1 << 14 | 2000)), Value::Float(2000.0));
    }

    #[test]
    fn test_tinyfloat_roundtrip_within_precision() {
        let layout = TinyFloat::default();
        for x in 0..(1 << 16) {
            let encoded = layout.encode(x);
            let mantissa = (encoded >> 5) & 0x7FF;
            let exponent = encoded & 0x1F;
            assert!(mantissa <= 0x7FF && exponent <= 0x1F);
            let decoded = layout.decode(encoded);
            assert!(decoded <= x);
            assert!(x - decoded < (1 << exponent), "x={} decoded={}", x, decoded);
        }
        assert_eq!(layout.decode(layout.encode(2047)), 2047);
    }

    #[test]
    fn test_tinyfloat_mantissa_boundary() {
        let layout = TinyFloat::default();
        // The largest mantissa is still usable with exponent 0
        assert_eq!(layout.encode(2047), 2047 << 5);
        assert_eq!(layout.encode(2046), 2046 << 5);
        // One above it shifts once
        assert_eq!(layout.encode(2048), 1024 << 5 | 1);
        assert_eq!(layout.decode(1024 << 5 | 1), 2048);
        assert_eq!(layout.encode(4095), 2047 << 5 | 1);
        assert_eq!(layout.decode(2047 << 5 | 1), 4094);
    }

    #[test]
    fn test_tinyfloat_clamps_exponent() {
        let layout = TinyFloat { mantissa_start: 4, mantissa_size: 4, exponent_start: 0, exponent_size: 2 };
        let encoded = layout.encode(i32::MAX);
        assert_eq!(encoded, 0xF << 4 | 0x3);
    }

    #[test]
    fn test_option_string() {
        let logical = LogicalParameter::new(LogicalType::Enum {
            options: vec![
                EnumOption { id: "AUTO".into(), default: true, index: 0 },
                EnumOption { id: "MANUAL".into(), default: false, index: 1 },
            ],
            min: 0,
            max: 1,
            default: Some(0),
        });
        let conv = ParameterConversion::OptionString;

        let mut value = Value::Integer(1);
        conv.from_packet(&mut value, &logical, &[]).unwrap();
        assert_eq!(value, Value::from("MANUAL"));

        conv.to_packet(&mut value, &logical).unwrap();
        assert_eq!(value, Value::Integer(1));

        let mut unknown = Value::from("PARTY");
        assert!(conv.to_packet(&mut unknown, &logical).is_err());
    }

    #[test]
    fn test_string_unsigned_integer() {
        let conv = ParameterConversion::StringUnsignedInteger;
        assert_eq!(decode(&conv, Value::Integer(-1)), Value::from("4294967295"));
        assert_eq!(encode(&conv, Value::from("4294967295")), Value::Integer(-1));
        let mut bad = Value::from("-3");
        assert!(conv.to_packet(&mut bad, &logical()).is_err());
    }

    #[test]
    fn test_hexstring_bytearray() {
        let conv = ParameterConversion::HexstringBytearray;
        assert_eq!(
            encode(&conv, Value::from("0AFF")),
            Value::Base64(Bytes::from_static(&[0x0A, 0xFF]))
        );
        assert_eq!(decode(&conv, Value::Base64(Bytes::from_static(&[0x0A, 0xFF]))), Value::from("0AFF"));
    }

    #[test]
    fn test_string_json_array_float() {
        let conv = ParameterConversion::StringJsonArrayFloat;
        let encoded = encode(&conv, Value::from("1.5;2"));
        assert_eq!(encoded, Value::Array(vec![Value::Float(1.5), Value::Float(2.0)]));
        assert_eq!(decode(&conv, encoded), Value::from("1.5;2"));
    }

    #[test]
    fn test_rpc_binary_terminates_chain() {
        let conv = ParameterConversion::RpcBinary;
        let mut value = Value::Integer(42);
        assert_eq!(conv.to_packet(&mut value, &logical()), Ok(Flow::Done));
        let raw = value.as_bytes();

        let mut decoded = Value::Void;
        assert_eq!(conv.from_packet(&mut decoded, &logical(), &raw), Ok(Flow::Done));
        assert_eq!(decoded, Value::Integer(42));
    }

    #[test]
    fn test_blind_test_constant() {
        let conv = ParameterConversion::BlindTest { value: 0xFF };
        assert_eq!(encode(&conv, Value::Boolean(true)), Value::Integer(0xFF));
        assert_eq!(decode(&conv, Value::Integer(3)), Value::Integer(0xFF));
    }
}
