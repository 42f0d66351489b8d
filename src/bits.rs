//! # Bit Utilities
//!
//! Fractional `byte.bit` addressing and big-endian packing helpers.
//!
//! Descriptions address fields as decimals: the integer part is a byte offset
//! (or count) and the first fractional digit is a bit offset (or count), so
//! `12.3` means byte 12, bit 3. The fraction is scaled by ten and rounded to
//! the nearest integer bit count, which must be reproduced exactly.

/// Byte part of a `byte.bit` index
pub fn byte_index(index: f64) -> usize {
    if index <= 0.0 {
        return 0;
    }
    index.floor() as usize
}

/// Bit part of a `byte.bit` index
pub fn bit_index(index: f64) -> u32 {
    ((index * 10.0).round() as i64).rem_euclid(10) as u32
}

/// Whole bytes of a `byte.bit` size
pub fn byte_size(size: f64) -> usize {
    byte_index(size)
}

/// Extra bits of a `byte.bit` size
pub fn bit_size(size: f64) -> u32 {
    bit_index(size)
}

/// Total width in bits of a `byte.bit` size
pub fn bit_width(size: f64) -> u32 {
    byte_size(size) as u32 * 8 + bit_size(size)
}

/// Number of bytes a field of `size` occupies on the wire, at least one
pub fn byte_len(size: f64) -> usize {
    let len = size.ceil();
    if len < 1.0 {
        1
    } else {
        len as usize
    }
}

/// `true` when the bit component of a size stays within one byte
///
/// A bit count of 8 or 9 written as `x.8` or `x.9` is accepted by the grammar
/// but has no meaning.
pub fn is_valid_bit_size(size: f64) -> bool {
    bit_size(size) < 8
}

/// Value mask for a field of `size`, capped at 32 bits
pub fn value_mask(size: f64) -> u32 {
    let (bytes, bits) = match byte_size(size) {
        b if b >= 4 => (4u32, 0u32),
        b => (b as u32, bit_size(size)),
    };
    let shift = ((4 - bytes) * 8).saturating_sub(bits);
    u32::MAX.checked_shr(shift).unwrap_or(0)
}

/// Interpret up to the last four bytes as a big-endian integer
pub fn read_be(data: &[u8]) -> i32 {
    let start = data.len().saturating_sub(4);
    data[start..]
        .iter()
        .fold(0u32, |acc, &b| (acc << 8) | b as u32) as i32
}

/// Big-endian bytes of `value`, keeping the `len` least significant bytes
///
/// # Arguments
///
/// * `value` - Integer to pack
/// * `len` - Output length, clamped to 1..=4
pub fn write_be(value: i32, len: usize) -> Vec<u8> {
    let len = len.clamp(1, 4);
    let bytes = (value as u32).to_be_bytes();
    bytes[4 - len..].to_vec()
}

/// Big-endian bytes of `value` using as few bytes as the value needs
pub fn write_be_minimal(value: i32) -> Vec<u8> {
    let len = if value < 0 {
        4
    } else if value < 0x100 {
        1
    } else if value < 0x1_0000 {
        2
    } else if value < 0x100_0000 {
        3
    } else {
        4
    };
    write_be(value, len)
}

/// Reverse a byte span for a field of `size`
///
/// The output always has `byte_len(size)` bytes. Bytes are taken from the tail
/// of `data`; missing bytes become zero.
pub fn reverse(data: &[u8], size: f64) -> Vec<u8> {
    let len = byte_len(size);
    (0..len)
        .map(|i| {
            data.len()
                .checked_sub(i + 1)
                .map(|j| data[j])
                .unwrap_or(0)
        })
        .collect()
}

/// Parse a decimal or `0x` hexadecimal integer
pub fn try_parse_number(text: &str) -> Option<i32> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16).ok().map(|v| v as i32);
    }
    if let Ok(v) = text.parse::<i64>() {
        return Some(v as i32);
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v as i32)
}

/// Like [`try_parse_number`], falling back to zero
pub fn parse_number(text: &str) -> i32 {
    try_parse_number(text).unwrap_or(0)
}

/// Parse a floating point number, falling back to zero
pub fn parse_double(text: &str) -> f64 {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Parse `true`/`false` the way description attributes spell them
pub fn parse_bool(text: &str) -> bool {
    let text = text.trim();
    text.eq_ignore_ascii_case("true") || text == "1"
}

/// Split at the last occurrence of `delimiter`
pub fn split_last(text: &str, delimiter: char) -> (&str, &str) {
    text.rsplit_once(delimiter).unwrap_or((text, ""))
}
