//! # Binary RPC Codec
//!
//! Encodes and decodes [`Value`]s in the binary RPC format:
//!
//! ```text
//! "Bin" | kind (1) | length (u32 BE) | type (u32 BE) | data ...
//! ```
//!
//! All integers are big-endian. Floats travel as a normalised mantissa and a
//! power-of-two exponent.

use base64::Engine as _;
use bytes::{Buf, BufMut, Bytes};
use std::collections::BTreeMap;

use crate::error::{Result, SchemaError};
use crate::value::Value;

/// Packet start marker
pub const BINARY_MAGIC: &[u8; 3] = b"Bin";

/// Kind byte of a request packet
pub const KIND_REQUEST: u8 = 0x00;

/// Kind byte of a response packet
pub const KIND_RESPONSE: u8 = 0x01;

/// Kind byte of an error response
pub const KIND_ERROR: u8 = 0xFF;

/// Header length: magic, kind and payload length
pub const HEADER_SIZE: usize = 8;

const TYPE_INTEGER: u32 = 0x01;
const TYPE_BOOLEAN: u32 = 0x02;
const TYPE_STRING: u32 = 0x03;
const TYPE_FLOAT: u32 = 0x04;
const TYPE_BASE64: u32 = 0x11;
const TYPE_ARRAY: u32 = 0x100;
const TYPE_STRUCT: u32 = 0x101;

/// Mantissa scale of the float encoding (2^30)
const FLOAT_MANTISSA_SCALE: f64 = 0x4000_0000 as f64;

/// Encode a successful response carrying `value`
///
/// # Arguments
///
/// * `value` - Value to encode
///
/// # Returns
///
/// * `Vec<u8>` - Complete packet including header
pub fn encode_response(value: &Value) -> Vec<u8> {
    let mut body = Vec::new();
    encode_value(&mut body, value);
    frame(KIND_RESPONSE, body)
}

/// Encode an error response with the usual `faultCode`/`faultString` struct
pub fn encode_error(code: i32, message: &str) -> Vec<u8> {
    let mut fault = BTreeMap::new();
    fault.insert("faultCode".to_string(), Value::Integer(code));
    fault.insert("faultString".to_string(), Value::String(message.to_string()));
    let mut body = Vec::new();
    encode_value(&mut body, &Value::Struct(fault));
    frame(KIND_ERROR, body)
}

fn frame(kind: u8, body: Vec<u8>) -> Vec<u8> {
    let mut packet = Vec::with_capacity(HEADER_SIZE + body.len());
    packet.put_slice(BINARY_MAGIC);
    packet.put_u8(kind);
    packet.put_u32(body.len() as u32);
    packet.extend_from_slice(&body);
    packet
}

fn encode_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Void => {
            out.put_u32(TYPE_STRING);
            put_string(out, b"");
        }
        Value::Boolean(b) => {
            out.put_u32(TYPE_BOOLEAN);
            out.put_u8(*b as u8);
        }
        Value::Integer(i) => {
            out.put_u32(TYPE_INTEGER);
            out.put_i32(*i);
        }
        Value::Float(f) => {
            out.put_u32(TYPE_FLOAT);
            let (mantissa, exponent) = split_float(*f);
            out.put_i32(mantissa);
            out.put_i32(exponent);
        }
        Value::String(s) => {
            out.put_u32(TYPE_STRING);
            put_string(out, s.as_bytes());
        }
        Value::Base64(b) => {
            out.put_u32(TYPE_BASE64);
            let text = base64::engine::general_purpose::STANDARD.encode(b.as_ref());
            put_string(out, text.as_bytes());
        }
        Value::Array(items) => {
            out.put_u32(TYPE_ARRAY);
            out.put_u32(items.len() as u32);
            for item in items {
                encode_value(out, item);
            }
        }
        Value::Struct(fields) => {
            out.put_u32(TYPE_STRUCT);
            out.put_u32(fields.len() as u32);
            for (name, item) in fields {
                put_string(out, name.as_bytes());
                encode_value(out, item);
            }
        }
    }
}

fn put_string(out: &mut Vec<u8>, data: &[u8]) {
    out.put_u32(data.len() as u32);
    out.put_slice(data);
}

/// Split a float into a mantissa in [0.5, 1) scaled by 2^30 and an exponent
fn split_float(value: f64) -> (i32, i32) {
    if value == 0.0 || !value.is_finite() {
        return (0, 0);
    }
    let mut temp = value.abs();
    let mut exponent = 0;
    if temp < 0.5 {
        while temp < 0.5 {
            temp *= 2.0;
            exponent -= 1;
        }
    } else {
        while temp >= 1.0 {
            temp /= 2.0;
            exponent += 1;
        }
    }
    if value < 0.0 {
        temp = -temp;
    }
    ((temp * FLOAT_MANTISSA_SCALE).round() as i32, exponent)
}

fn join_float(mantissa: i32, exponent: i32) -> f64 {
    let value = mantissa as f64 / FLOAT_MANTISSA_SCALE * 2f64.powi(exponent);
    if value == 0.0 {
        return value;
    }
    // Nine significant digits
    let digits = (value.abs().log10() + 1.0).floor() as i32;
    let factor = 10f64.powi(9 - digits);
    (value * factor + 0.5).floor() / factor
}

/// Decode a response packet starting at `offset`
///
/// # Arguments
///
/// * `data` - Buffer containing the packet
/// * `offset` - Position of the `Bin` marker inside `data`
///
/// # Returns
///
/// * `Result<Value>` - The carried value; error responses decode to their
///   fault struct
///
/// # Errors
///
/// Returns error if:
/// - The header is missing or malformed
/// - The payload is truncated
/// - An unknown type code is encountered
pub fn decode_response(data: &[u8], offset: usize) -> Result<Value> {
    let packet = data
        .get(offset..)
        .filter(|p| p.len() >= HEADER_SIZE)
        .ok_or_else(|| SchemaError::Rpc("packet shorter than header".to_string()))?;
    if &packet[..3] != BINARY_MAGIC {
        return Err(SchemaError::Rpc("missing Bin marker".to_string()));
    }
    let mut body = &packet[HEADER_SIZE..];
    if body.is_empty() {
        return Ok(Value::Void);
    }
    decode_value(&mut body, 0)
}

/// Nesting limit for arrays and structs
const MAX_DEPTH: usize = 64;

fn decode_value(buf: &mut &[u8], depth: usize) -> Result<Value> {
    if depth > MAX_DEPTH {
        return Err(SchemaError::Rpc("nesting too deep".to_string()));
    }
    let value = match take_u32(buf)? {
        TYPE_INTEGER => Value::Integer(take_u32(buf)? as i32),
        TYPE_BOOLEAN => {
            need(buf, 1)?;
            Value::Boolean(buf.get_u8() != 0)
        }
        TYPE_STRING => Value::String(String::from_utf8_lossy(&take_string(buf)?).into_owned()),
        TYPE_FLOAT => {
            let mantissa = take_u32(buf)? as i32;
            let exponent = take_u32(buf)? as i32;
            Value::Float(join_float(mantissa, exponent))
        }
        TYPE_BASE64 => {
            let text = take_string(buf)?;
            let raw = base64::engine::general_purpose::STANDARD
                .decode(&text)
                .map_err(|e| SchemaError::Rpc(format!("invalid base64: {}", e)))?;
            Value::Base64(Bytes::from(raw))
        }
        TYPE_ARRAY => {
            let count = take_u32(buf)? as usize;
            let mut items = Vec::with_capacity(count.min(buf.remaining()));
            for _ in 0..count {
                items.push(decode_value(buf, depth + 1)?);
            }
            Value::Array(items)
        }
        TYPE_STRUCT => {
            let count = take_u32(buf)? as usize;
            let mut fields = BTreeMap::new();
            for _ in 0..count {
                let name = String::from_utf8_lossy(&take_string(buf)?).into_owned();
                fields.insert(name, decode_value(buf, depth + 1)?);
            }
            Value::Struct(fields)
        }
        other => {
            return Err(SchemaError::Rpc(format!("unknown type code 0x{:X}", other)));
        }
    };
    Ok(value)
}

fn need(buf: &&[u8], len: usize) -> Result<()> {
    if buf.remaining() < len {
        return Err(SchemaError::Rpc(format!(
            "truncated payload: need {} bytes, have {}",
            len,
            buf.remaining()
        )));
    }
    Ok(())
}

fn take_u32(buf: &mut &[u8]) -> Result<u32> {
    need(buf, 4)?;
    Ok(buf.get_u32())
}

fn take_string(buf: &mut &[u8]) -> Result<Vec<u8>> {
    let len = take_u32(buf)? as usize;
    need(buf, len)?;
    let data = buf[..len].to_vec();
    buf.advance(len);
    Ok(data)
}
