//! # Parameter Codec
//!
//! Turns raw field bytes into [`Value`]s and back for one [`Parameter`].
//! All addressing is big-endian; little-endian fields are reversed on the way
//! in and out. Problems never abort: a fallback value is produced and a
//! [`Diagnostic`](crate::diagnostics::Diagnostic) explains what happened.

use super::conversion::{Flow, ParameterConversion, TinyFloat};
use super::parameter::{Endian, LogicalType, Parameter, PhysicalType};
use crate::bits;
use crate::diagnostics::{Diagnostics, Outcome};
use crate::value::Value;

/// Parameter whose device-side value is the magnitude of a negative dBm figure
const RSSI_DEVICE: &str = "RSSI_DEVICE";

/// Byte length of the fixed chime/melody layout
const CFM_LEN: usize = 14;

/// Byte length of the fixed party-mode layout
const CCRTDN_PARTY_LEN: usize = 8;

impl Parameter {
    /// Decode the wire bytes of this parameter
    ///
    /// # Arguments
    ///
    /// * `data` - Field bytes as extracted from the packet
    /// * `is_event` - Whether the bytes came from an event frame; this is the
    ///   value of action parameters
    ///
    /// # Returns
    ///
    /// * `Outcome<Value>` - Decoded value and any codec diagnostics
    pub fn decode(&self, data: &[u8], is_event: bool) -> Outcome<Value> {
        let mut diagnostics = Diagnostics::new();
        let bytes = match self.physical.endian {
            Endian::Little => bits::reverse(data, self.physical.size),
            Endian::Big => data.to_vec(),
        };
        let no_chain = self.conversions.is_empty();

        let value = match &self.logical.kind {
            LogicalType::Enum { .. } if no_chain => Value::Integer(bits::read_be(&bytes)),
            LogicalType::Boolean { .. } if no_chain => Value::Boolean(bits::read_be(&bytes) != 0),
            LogicalType::String { .. } if no_chain => Value::String(text_from_wire(&bytes)),
            LogicalType::Action => Value::Boolean(is_event),
            _ if self.id == RSSI_DEVICE => Value::Integer(bits::read_be(&bytes).wrapping_neg()),
            _ => self.decode_chain(&bytes, &mut diagnostics),
        };
        Outcome::new(value, diagnostics)
    }

    fn decode_chain(&self, bytes: &[u8], diagnostics: &mut Diagnostics) -> Value {
        match self.fixed_layout() {
            Some(ParameterConversion::Cfm) => return Value::String(read_cfm(bytes)),
            Some(ParameterConversion::CcrtdnParty) => return Value::String(read_ccrtdn_party(bytes)),
            _ => {}
        }

        let mut value = if self.physical.kind == PhysicalType::String || bytes.len() > 4 {
            Value::Base64(bytes.to_vec().into())
        } else {
            Value::Integer(self.sign_extend(bytes))
        };

        for conversion in self.conversions.iter().rev() {
            match conversion.from_packet(&mut value, &self.logical, bytes) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Done) => break,
                Err(e) => {
                    diagnostics.codec_warning(
                        &self.id,
                        format!("{} could not decode {:02X?}: {}", conversion.name(), bytes, e),
                    );
                    return self.logical.zero_value();
                }
            }
        }

        match value {
            Value::Base64(raw) if matches!(self.logical.kind, LogicalType::String { .. }) => {
                Value::String(text_from_wire(&raw))
            }
            Value::Void => {
                diagnostics.codec_warning(&self.id, "decoding produced no value");
                self.logical.zero_value()
            }
            other => other,
        }
    }

    /// Big-endian integer, sign-extended from the declared width when signed
    fn sign_extend(&self, bytes: &[u8]) -> i32 {
        let value = bits::read_be(bytes);
        if !self.signed || bytes.is_empty() {
            return value;
        }
        let size = self.physical.size;
        let Some(byte_index) = bytes.len().checked_sub(bits::byte_len(size)) else {
            return value;
        };
        let bit_size = bits::bit_size(size);
        let sign_position = if bit_size == 0 { 7 } else { bit_size - 1 };
        if bytes[byte_index] & (1u8 << sign_position.min(7)) == 0 {
            return value;
        }
        let width = bits::bit_width(size);
        if width >= 32 {
            return value;
        }
        (value as i64 - (1i64 << width)) as i32
    }

    /// Parse text according to the logical type, then encode it
    pub fn encode_text(&self, text: &str) -> Outcome<Vec<u8>> {
        self.encode(&self.logical.parse_text(text))
    }

    /// Encode a value into wire bytes for this parameter
    ///
    /// # Arguments
    ///
    /// * `value` - Value to encode; numbers are clamped to the logical range
    ///
    /// # Returns
    ///
    /// * `Outcome<Vec<u8>>` - Field bytes ready to be copied into a packet
    pub fn encode(&self, value: &Value) -> Outcome<Vec<u8>> {
        let mut diagnostics = Diagnostics::new();
        let no_chain = self.conversions.is_empty();

        let mut value = match &self.logical.kind {
            LogicalType::String { .. } if no_chain => {
                let mut data = value.as_bytes();
                if (data.len() as f64) < self.physical.size.round() {
                    data.push(0);
                }
                return Outcome::new(data, diagnostics);
            }
            LogicalType::Enum { .. } if no_chain => self.clamped(value, &mut diagnostics),
            LogicalType::Action if no_chain => Value::Integer(value.as_bool() as i32),
            _ => value.clone(),
        };

        let fixed = match self.fixed_layout() {
            Some(ParameterConversion::Cfm) => Some(write_cfm(&value.as_text())),
            Some(ParameterConversion::CcrtdnParty) => Some(write_ccrtdn_party(&value.as_text())),
            _ => None,
        };
        if let Some(data) = fixed {
            return Outcome::new(self.apply_endian(data), diagnostics);
        }

        if !matches!(self.logical.kind, LogicalType::Enum { .. } | LogicalType::Action) || !no_chain {
            if matches!(self.logical.kind, LogicalType::Integer { .. } | LogicalType::Float { .. }) {
                value = self.clamped(&value, &mut diagnostics);
            }
            if no_chain {
                if let LogicalType::Boolean { .. } = self.logical.kind {
                    value = Value::Integer(value.as_bool() as i32);
                }
            }
            for conversion in &self.conversions {
                match conversion.to_packet(&mut value, &self.logical) {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Done) => return Outcome::new(value.as_bytes(), diagnostics),
                    Err(e) => {
                        diagnostics.codec_warning(
                            &self.id,
                            format!("{} could not encode {:?}: {}", conversion.name(), value, e),
                        );
                        value = Value::Integer(0);
                        break;
                    }
                }
            }
        }

        let data = match &value {
            Value::Base64(raw) => raw.to_vec(),
            _ if self.physical.kind == PhysicalType::String => {
                let mut data = value.as_bytes();
                if self.physical.size_defined && (data.len() as f64) < self.physical.size.round() {
                    data.push(0);
                }
                data
            }
            _ => self.pack_integer(value.as_i32()),
        };
        let data = self.apply_endian(data);
        let data = self.place_bits(data, &mut diagnostics);
        Outcome::new(data, diagnostics)
    }

    /// Fixed string layout named anywhere in the conversion chain
    fn fixed_layout(&self) -> Option<&ParameterConversion> {
        self.conversions
            .iter()
            .find(|c| matches!(c, ParameterConversion::Cfm | ParameterConversion::CcrtdnParty))
    }

    fn clamped(&self, value: &Value, diagnostics: &mut Diagnostics) -> Value {
        let (clamped, changed) = self.logical.clamp(value.clone());
        if changed {
            diagnostics.codec_warning(
                &self.id,
                format!("{:?} is out of range and was clamped to {:?}", value, clamped),
            );
        }
        clamped
    }

    /// Mask to the declared width and pack big-endian
    fn pack_integer(&self, value: i32) -> Vec<u8> {
        if !self.physical.size_defined {
            return bits::write_be_minimal(value);
        }
        let size = self.physical.size;
        let masked = (value as u32 & bits::value_mask(size)) as i32;
        bits::write_be(masked, bits::byte_len(size).min(4))
    }

    fn apply_endian(&self, data: Vec<u8>) -> Vec<u8> {
        match self.physical.endian {
            Endian::Big => data,
            Endian::Little if self.physical.size_defined => bits::reverse(&data, self.physical.size),
            Endian::Little => data.into_iter().rev().collect(),
        }
    }

    /// Move an encoded sub-byte value to its bit offset
    ///
    /// Fields with a bit offset or narrower than one byte are shifted left by
    /// the offset. Afterwards the span is left-padded with zero bytes up to the
    /// declared byte count.
    pub fn place_bits(&self, data: Vec<u8>, diagnostics: &mut Diagnostics) -> Vec<u8> {
        if data.is_empty() || data.len() > 4 || matches!(self.logical.kind, LogicalType::String { .. }) {
            return data;
        }
        let size = self.physical.size;
        if size < 0.0 {
            diagnostics.codec_warning(&self.id, "negative size");
            return data;
        }
        let index = self.physical.index;
        let bit_offset = bits::bit_index(index);
        let mut data = data;
        if bit_offset != 0 || size < 0.8 {
            if size > 1.0 {
                diagnostics.codec_warning(
                    &self.id,
                    format!("field of size {} cannot start at bit {} of a byte", size, bit_offset),
                );
                return data;
            }
            let shifted = (bits::read_be(&data) as u32).checked_shl(bit_offset).unwrap_or(0);
            data = vec![shifted as u8];
        }
        let declared = bits::byte_size(size);
        if declared > data.len() {
            let mut padded = vec![0; declared - data.len()];
            padded.extend(data);
            data = padded;
        }
        data
    }
}

/// Wire bytes to text, dropping one trailing zero terminator
fn text_from_wire(bytes: &[u8]) -> String {
    match bytes.first() {
        None | Some(0) => String::new(),
        Some(_) => {
            let end = if bytes.last() == Some(&0) { bytes.len() - 1 } else { bytes.len() };
            String::from_utf8_lossy(&bytes[..end]).into_owned()
        }
    }
}

/// "LEVEL,REPETITIONS,DURATION,MELODY..." into the 14-byte chime layout
fn write_cfm(text: &str) -> Vec<u8> {
    let mut out = vec![0u8; CFM_LEN];
    if text.is_empty() || text == "0" {
        return out;
    }
    for (i, element) in text.split(',').take(13).enumerate() {
        match i {
            0 => out[0] = (200.0 * bits::parse_double(element)).round() as u8,
            1 => out[1] = bits::parse_number(element) as u8,
            2 => {
                let tenths = (bits::parse_double(element) * 10.0).round() as i32;
                let time = bits::write_be_minimal(TinyFloat::default().encode(tenths));
                match time.as_slice() {
                    [low] => out[13] = *low,
                    [.., high, low] => {
                        out[12] = *high;
                        out[13] = *low;
                    }
                    [] => {}
                }
            }
            _ => out[i - 1] = bits::parse_number(element) as u8,
        }
    }
    out
}

fn read_cfm(bytes: &[u8]) -> String {
    let mut data = [0u8; CFM_LEN];
    for (slot, b) in data.iter_mut().zip(bytes) {
        *slot = *b;
    }
    if data.iter().all(|b| *b == 0) {
        return "0".to_string();
    }
    let time = TinyFloat::default().decode(i32::from(data[12]) << 8 | i32::from(data[13]));
    let mut fields = vec![
        (data[0] as f64 / 200.0).to_string(),
        data[1].to_string(),
        (time as f64 / 10.0).to_string(),
    ];
    let last_melody = data[2..12].iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
    fields.extend(data[2..2 + last_melody].iter().map(|b| b.to_string()));
    fields.join(",")
}

/// "TEMP,START_TIME,DAY,MONTH,YEAR,END_TIME,DAY,MONTH,YEAR" into 8 bytes
fn write_ccrtdn_party(text: &str) -> Vec<u8> {
    let mut out = vec![0u8; CCRTDN_PARTY_LEN];
    if text.is_empty() {
        return out;
    }
    for (i, element) in text.split(',').take(9).enumerate() {
        let number = bits::parse_number(element);
        match i {
            0 => out[0] = (2.0 * bits::parse_double(element)).round() as u8,
            1 => out[1] = (number / 30) as u8,
            2 => out[2] = number as u8,
            3 => out[7] = (number << 4) as u8,
            4 => out[3] = number as u8,
            5 => out[4] = (number / 30) as u8,
            6 => out[5] = number as u8,
            7 => out[7] |= (number & 0x0F) as u8,
            _ => out[6] = number as u8,
        }
    }
    out
}

fn read_ccrtdn_party(bytes: &[u8]) -> String {
    let mut data = [0u8; CCRTDN_PARTY_LEN];
    for (slot, b) in data.iter_mut().zip(bytes) {
        *slot = *b;
    }
    format!(
        "{},{},{},{},{},{},{},{},{}",
        data[0] as f64 / 2.0,
        data[1] as u32 * 30,
        data[2],
        data[7] >> 4,
        data[3],
        data[4] as u32 * 30,
        data[5],
        data[7] & 0x0F,
        data[6]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::conversion::{BooleanInteger, ValueMap};
    use crate::description::parameter::{EnumOption, LogicalParameter, PhysicalParameter};

    fn parameter(logical: LogicalType, index: f64, size: f64) -> Parameter {
        let mut physical = PhysicalParameter {
            kind: PhysicalType::Integer,
            index,
            size,
            size_defined: true,
            ..Default::default()
        };
        physical.update_range();
        Parameter {
            id: "TEST".into(),
            logical: LogicalParameter::new(logical),
            physical,
            ..Default::default()
        }
    }

    fn int_range(min: i32, max: i32) -> LogicalType {
        LogicalType::Integer { min, max, default: None, special_values: Default::default() }
    }

    #[test]
    fn test_float_scale_single_byte() {
        let mut param = parameter(LogicalType::float(), 1.0, 1.0);
        param.conversions.push(ParameterConversion::FloatIntegerScale { factor: 2.0, offset: 0.0 });

        let encoded = param.encode(&Value::Float(10.5));
        assert_eq!(encoded.value, vec![0x15]);
        assert!(encoded.diagnostics.is_empty());
        assert_eq!(param.decode(&[0x15], false).value, Value::Float(10.5));
    }

    #[test]
    fn test_little_endian_integer() {
        let mut param = parameter(int_range(0, 65535), 0.0, 2.0);
        param.physical.endian = Endian::Little;

        assert_eq!(param.encode(&Value::Integer(300)).value, vec![0x2C, 0x01]);
        assert_eq!(param.decode(&[0x2C, 0x01], false).value, Value::Integer(300));
    }

    #[test]
    fn test_bit_placement() {
        let param = parameter(int_range(0, 7), 10.5, 0.3);
        assert_eq!(param.encode(&Value::Integer(0b101)).value, vec![0b1010_0000]);
    }

    #[test]
    fn test_bit_placement_pads_to_declared_bytes() {
        let param = parameter(int_range(0, 255), 3.0, 2.0);
        assert_eq!(param.encode(&Value::Integer(5)).value, vec![0x00, 0x05]);
    }

    #[test]
    fn test_wide_field_at_bit_offset_rejected() {
        let param = parameter(int_range(0, 4095), 3.4, 1.4);
        let encoded = param.encode(&Value::Integer(0x123));
        assert_eq!(encoded.value, vec![0x01, 0x23]);
        assert_eq!(encoded.diagnostics.len(), 1);
    }

    #[test]
    fn test_roundtrip_without_conversions() {
        let param = parameter(int_range(0, 1000), 0.0, 2.0);
        for v in [0, 1, 255, 256, 999, 1000] {
            let bytes = param.encode(&Value::Integer(v)).value;
            assert_eq!(param.decode(&bytes, false).value, Value::Integer(v));
        }
    }

    #[test]
    fn test_encode_clamps_but_decode_does_not() {
        let param = parameter(int_range(0, 100), 0.0, 1.0);
        let encoded = param.encode(&Value::Integer(150));
        assert_eq!(encoded.value, vec![100]);
        assert_eq!(encoded.diagnostics.len(), 1);
        assert_eq!(param.decode(&[150], false).value, Value::Integer(150));
    }

    #[test]
    fn test_special_value_not_clamped() {
        let mut specials = std::collections::BTreeMap::new();
        specials.insert("OFF".to_string(), 255);
        let param = parameter(
            LogicalType::Integer { min: 0, max: 100, default: None, special_values: specials },
            0.0,
            1.0,
        );
        assert_eq!(param.encode(&Value::Integer(255)).value, vec![255]);
    }

    #[test]
    fn test_signed_decode_uses_declared_width() {
        let mut param = parameter(int_range(-8, 7), 0.0, 0.4);
        param.signed = true;
        assert_eq!(param.decode(&[0x0F], false).value, Value::Integer(-1));
        assert_eq!(param.decode(&[0x07], false).value, Value::Integer(7));

        let mut wide = parameter(int_range(-32768, 32767), 0.0, 2.0);
        wide.signed = true;
        assert_eq!(wide.decode(&[0xFF, 0x38], false).value, Value::Integer(-200));
    }

    #[test]
    fn test_negative_value_masked_to_width() {
        let mut param = parameter(int_range(-128, 127), 0.0, 1.0);
        param.signed = true;
        assert_eq!(param.encode(&Value::Integer(-2)).value, vec![0xFE]);
        assert_eq!(param.decode(&[0xFE], false).value, Value::Integer(-2));
    }

    #[test]
    fn test_enum_and_boolean_without_chain() {
        let options = vec![
            EnumOption { id: "A".into(), default: true, index: 0 },
            EnumOption { id: "B".into(), default: false, index: 1 },
        ];
        let param = parameter(LogicalType::Enum { options, min: 0, max: 1, default: Some(0) }, 0.0, 1.0);
        assert_eq!(param.decode(&[1], false).value, Value::Integer(1));
        assert_eq!(param.encode(&Value::Integer(9)).value, vec![1]);
        assert_eq!(param.encode_text("B").value, vec![1]);

        let flag = parameter(LogicalType::Boolean { default: None }, 0.0, 0.1);
        assert_eq!(flag.decode(&[1], false).value, Value::Boolean(true));
        assert_eq!(flag.encode(&Value::Boolean(true)).value, vec![1]);
        assert_eq!(flag.encode_text("TRUE").value, vec![1]);
    }

    #[test]
    fn test_action_returns_event_flag() {
        let param = parameter(LogicalType::Action, 0.0, 1.0);
        assert_eq!(param.decode(&[0xFF], true).value, Value::Boolean(true));
        assert_eq!(param.decode(&[0xFF], false).value, Value::Boolean(false));
        assert_eq!(param.encode(&Value::Boolean(true)).value, vec![1]);
    }

    #[test]
    fn test_rssi_is_negated() {
        let mut param = parameter(LogicalType::integer(), 0.0, 1.0);
        param.id = RSSI_DEVICE.into();
        assert_eq!(param.decode(&[0x41], false).value, Value::Integer(-65));
    }

    #[test]
    fn test_string_terminator() {
        let mut param = parameter(
            LogicalType::String { default: None, use_default_on_failure: false },
            0.0,
            8.0,
        );
        param.physical.kind = PhysicalType::String;
        assert_eq!(param.encode(&Value::from("abc")).value, b"abc\0".to_vec());
        assert_eq!(param.encode(&Value::from("abcdefgh")).value, b"abcdefgh".to_vec());
        assert_eq!(param.decode(b"abc\0", false).value, Value::from("abc"));
        assert_eq!(param.decode(b"\0abc", false).value, Value::from(""));
    }

    #[test]
    fn test_chain_runs_in_reverse_on_decode() {
        let mut param = parameter(LogicalType::float(), 0.0, 1.0);
        let mut map = ValueMap::default();
        map.insert(1, 10);
        param.conversions.push(ParameterConversion::FloatIntegerScale { factor: 2.0, offset: 0.0 });
        param.conversions.push(ParameterConversion::IntegerIntegerMap(map));

        // encode: 5.0 -> 10 -> mapped to device value 1
        assert_eq!(param.encode(&Value::Float(5.0)).value, vec![1]);
        // decode: 1 -> mapped to 10 -> 5.0
        assert_eq!(param.decode(&[1], false).value, Value::Float(5.0));
    }

    #[test]
    fn test_failed_conversion_falls_back_to_zero() {
        let mut param = parameter(LogicalType::float(), 0.0, 1.0);
        param.conversions.push(ParameterConversion::FloatIntegerScale { factor: 0.0, offset: 0.0 });
        let decoded = param.decode(&[3], false);
        assert_eq!(decoded.value, Value::Float(0.0));
        assert_eq!(decoded.diagnostics.len(), 1);
    }

    #[test]
    fn test_boolean_integer_with_invert() {
        let mut param = parameter(LogicalType::Boolean { default: None }, 0.0, 1.0);
        param.conversions.push(ParameterConversion::BooleanInteger(BooleanInteger {
            invert: true,
            ..Default::default()
        }));
        assert_eq!(param.encode(&Value::Boolean(true)).value, vec![0]);
        assert_eq!(param.decode(&[0], false).value, Value::Boolean(true));
    }

    #[test]
    fn test_rpc_binary_parameter() {
        let mut param = parameter(LogicalType::String { default: None, use_default_on_failure: false }, 0.0, 0.0);
        param.physical.kind = PhysicalType::String;
        param.physical.size_defined = false;
        param.conversions.push(ParameterConversion::RpcBinary);

        let value = Value::Array(vec![Value::Integer(1), Value::from("x")]);
        let bytes = param.encode(&value).value;
        assert_eq!(&bytes[..3], b"Bin");
        assert_eq!(param.decode(&bytes, false).value, value);
    }

    /// A parameter without its own size that learned sign and width from an event frame
    fn frame_sized(logical: LogicalType, signed: bool, size: f64) -> Parameter {
        let mut param = parameter(logical, 0.0, 0.0);
        param.physical.size_defined = false;
        param.adopt_frame_field(signed, size);
        param
    }

    #[test]
    fn test_frame_sized_signed_integer() {
        let param = frame_sized(int_range(-2048, 2047), true, 1.4);
        assert!(param.physical.size_defined);

        let encoded = param.encode(&Value::Integer(-100));
        assert!(encoded.diagnostics.is_empty(), "{:?}", encoded.diagnostics);
        assert_eq!(encoded.value, vec![0x0F, 0x9C]);
        assert_eq!(param.decode(&encoded.value, true).value, Value::Integer(-100));

        let encoded = param.encode(&Value::Integer(2047)).value;
        assert_eq!(encoded, vec![0x07, 0xFF]);
        assert_eq!(param.decode(&encoded, true).value, Value::Integer(2047));
    }

    #[test]
    fn test_frame_sized_scaled_float() {
        let mut param = frame_sized(
            LogicalType::Float { min: -40.0, max: 80.0, default: None, special_values: Default::default() },
            true,
            1.7,
        );
        param.conversions.push(ParameterConversion::FloatIntegerScale { factor: 10.0, offset: 0.0 });

        let encoded = param.encode(&Value::Float(-5.0)).value;
        assert_eq!(encoded, vec![0x7F, 0xCE]);
        assert_eq!(param.decode(&encoded, true).value, Value::Float(-5.0));
    }

    #[test]
    fn test_frame_sized_little_endian() {
        let mut param = frame_sized(int_range(0, 65535), false, 2.0);
        param.physical.endian = Endian::Little;

        let encoded = param.encode(&Value::Integer(300)).value;
        assert_eq!(encoded, vec![0x2C, 0x01]);
        assert_eq!(param.decode(&encoded, true).value, Value::Integer(300));

        // Small values still fill the frame field
        let encoded = param.encode(&Value::Integer(5)).value;
        assert_eq!(encoded, vec![0x05, 0x00]);
        assert_eq!(param.decode(&encoded, true).value, Value::Integer(5));
    }

    #[test]
    fn test_binary_chain_output_is_emitted() {
        let mut param = parameter(
            LogicalType::String { default: None, use_default_on_failure: false },
            0.0,
            5.0,
        );
        param.conversions.push(ParameterConversion::HexstringBytearray);

        let encoded = param.encode(&Value::from("0A0B0C0D0E"));
        assert!(encoded.diagnostics.is_empty(), "{:?}", encoded.diagnostics);
        assert_eq!(encoded.value, vec![0x0A, 0x0B, 0x0C, 0x0D, 0x0E]);
        assert_eq!(param.decode(&encoded.value, false).value, Value::from("0A0B0C0D0E"));
    }

    #[test]
    fn test_cfm_layout() {
        let mut param = parameter(LogicalType::String { default: None, use_default_on_failure: false }, 0.0, 14.0);
        param.physical.kind = PhysicalType::String;
        param.conversions.push(ParameterConversion::Cfm);

        let bytes = param.encode(&Value::from("0.5,3,10.8,2,5")).value;
        assert_eq!(bytes.len(), 14);
        assert_eq!(bytes[0], 100);
        assert_eq!(bytes[1], 3);
        assert_eq!(bytes[2], 2);
        assert_eq!(bytes[3], 5);
        // 108 tenths = mantissa 108, exponent 0
        assert_eq!(&bytes[12..], &[0x0D, 0x80]);
        assert_eq!(param.decode(&bytes, false).value, Value::from("0.5,3,10.8,2,5"));

        assert_eq!(param.encode(&Value::from("0")).value, vec![0; 14]);
    }

    #[test]
    fn test_ccrtdn_party_layout() {
        let mut param = parameter(LogicalType::String { default: None, use_default_on_failure: false }, 0.0, 8.0);
        param.physical.kind = PhysicalType::String;
        param.conversions.push(ParameterConversion::CcrtdnParty);

        let text = "21.5,480,24,12,13,1320,26,12,13";
        let bytes = param.encode(&Value::from(text)).value;
        assert_eq!(bytes, vec![43, 16, 24, 13, 44, 26, 13, 0xCC]);
        assert_eq!(param.decode(&bytes, false).value, Value::from(text));
    }

    #[test]
    fn test_fixed_layouts_found_anywhere_in_chain() {
        let mut param = parameter(LogicalType::String { default: None, use_default_on_failure: false }, 0.0, 8.0);
        param.physical.kind = PhysicalType::String;
        param.conversions.push(ParameterConversion::Toggle { on: 200, off: 0 });
        param.conversions.push(ParameterConversion::CcrtdnParty);

        let text = "21.5,480,24,12,13,1320,26,12,13";
        assert_eq!(param.encode(&Value::from(text)).value, vec![43, 16, 24, 13, 44, 26, 13, 0xCC]);
        assert_eq!(param.decode(&[43, 16, 24, 13, 44, 26, 13, 0xCC], false).value, Value::from(text));
    }

    #[test]
    fn test_fixed_layouts_respect_endian() {
        let mut party = parameter(LogicalType::String { default: None, use_default_on_failure: false }, 0.0, 8.0);
        party.physical.kind = PhysicalType::String;
        party.physical.endian = Endian::Little;
        party.conversions.push(ParameterConversion::CcrtdnParty);

        let text = "21.5,480,24,12,13,1320,26,12,13";
        let bytes = party.encode(&Value::from(text)).value;
        assert_eq!(bytes, vec![0xCC, 13, 26, 44, 13, 24, 16, 43]);
        assert_eq!(party.decode(&bytes, false).value, Value::from(text));

        let mut chime = parameter(LogicalType::String { default: None, use_default_on_failure: false }, 0.0, 14.0);
        chime.physical.kind = PhysicalType::String;
        chime.physical.endian = Endian::Little;
        chime.conversions.push(ParameterConversion::Cfm);

        let bytes = chime.encode(&Value::from("0.5,3,10.8,2,5")).value;
        assert_eq!(bytes[13], 100);
        assert_eq!(&bytes[..2], &[0x80, 0x0D]);
        assert_eq!(chime.decode(&bytes, false).value, Value::from("0.5,3,10.8,2,5"));
    }
}
