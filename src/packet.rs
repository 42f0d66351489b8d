//! # Wire Packet
//!
//! The packet boundary the matcher needs: header fields plus an addressable
//! payload. [`position`] extracts a field by `byte.bit` index and size, where
//! indices below 9 address the header and 9 onwards the payload.

use crate::bits;

/// Masks for sub-byte reads, indexed by bit count
const BITMASK: [u8; 9] = [0xFF, 0x01, 0x03, 0x07, 0x0F, 0x1F, 0x3F, 0x7F, 0xFF];

/// First index that addresses the payload
pub const PAYLOAD_OFFSET: usize = 9;

/// Read access to a received packet
#[cfg_attr(test, mockall::automock)]
pub trait WirePacket {
    fn message_counter(&self) -> u8;

    fn control_byte(&self) -> u8;

    fn message_type(&self) -> u8;

    /// 24-bit sender address
    fn sender_address(&self) -> u32;

    /// 24-bit destination address
    fn destination_address(&self) -> u32;

    fn payload_len(&self) -> usize;

    fn payload_byte(&self, index: usize) -> Option<u8>;
}

/// A BidCoS radio packet
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BidCosPacket {
    pub length: u8,
    pub message_counter: u8,
    pub control_byte: u8,
    pub message_type: u8,
    pub sender_address: u32,
    pub destination_address: u32,
    pub payload: Vec<u8>,
    pub rssi: Option<u8>,
}

impl BidCosPacket {
    /// Import a packet as received from the radio
    ///
    /// # Arguments
    ///
    /// * `data` - Raw packet starting with the length byte
    /// * `rssi_byte` - `true` if the last byte carries the signal strength
    ///
    /// # Returns
    ///
    /// * `Option<BidCosPacket>` - `None` if the packet is shorter than its header
    pub fn from_bytes(data: &[u8], rssi_byte: bool) -> Option<Self> {
        if data.len() < 10 {
            return None;
        }
        let address = |i: usize| (data[i] as u32) << 16 | (data[i + 1] as u32) << 8 | data[i + 2] as u32;
        let (payload, rssi) = match data.len() {
            10 => (Vec::new(), None),
            _ if rssi_byte => (data[10..data.len() - 1].to_vec(), data.last().copied()),
            _ => (data[10..].to_vec(), None),
        };
        Some(Self {
            length: data[0],
            message_counter: data[1],
            control_byte: data[2],
            message_type: data[3],
            sender_address: address(4),
            destination_address: address(7),
            payload,
            rssi,
        })
    }

    /// Serialize back into wire order, without the signal strength byte
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(10 + self.payload.len());
        out.push((9 + self.payload.len()) as u8);
        out.push(self.message_counter);
        out.push(self.control_byte);
        out.push(self.message_type);
        out.extend_from_slice(&self.sender_address.to_be_bytes()[1..]);
        out.extend_from_slice(&self.destination_address.to_be_bytes()[1..]);
        out.extend_from_slice(&self.payload);
        out
    }
}

impl WirePacket for BidCosPacket {
    fn message_counter(&self) -> u8 {
        self.message_counter
    }

    fn control_byte(&self) -> u8 {
        self.control_byte
    }

    fn message_type(&self) -> u8 {
        self.message_type
    }

    fn sender_address(&self) -> u32 {
        self.sender_address
    }

    fn destination_address(&self) -> u32 {
        self.destination_address
    }

    fn payload_len(&self) -> usize {
        self.payload.len()
    }

    fn payload_byte(&self, index: usize) -> Option<u8> {
        self.payload.get(index).copied()
    }
}

fn header_byte<P: WirePacket + ?Sized>(packet: &P, index: usize) -> u8 {
    let sender = packet.sender_address();
    let destination = packet.destination_address();
    match index {
        0 => packet.message_counter(),
        1 => packet.control_byte(),
        2 => packet.message_type(),
        3 => (sender >> 16) as u8,
        4 => (sender >> 8) as u8,
        5 => sender as u8,
        6 => (destination >> 16) as u8,
        7 => (destination >> 8) as u8,
        _ => destination as u8,
    }
}

/// Extract the field at `index`/`size` from a packet
///
/// Impossible requests (negative index or size, multi-byte header reads,
/// sub-byte reads wider than one byte, reads past the payload) yield `[0]`.
///
/// # Arguments
///
/// * `packet` - Packet to read from
/// * `index` - `byte.bit` position; 0..9 is the header
/// * `size` - `byte.bit` length
/// * `mask` - Optional value mask applied to whole-byte reads
pub fn position<P: WirePacket + ?Sized>(packet: &P, index: f64, size: f64, mask: Option<u32>) -> Vec<u8> {
    if size < 0.0 || index < 0.0 {
        return vec![0];
    }
    let bit_offset = bits::bit_index(index);
    let sub_byte_mask = BITMASK[((size * 10.0).round() as usize).min(8)];
    if index < PAYLOAD_OFFSET as f64 {
        if size > 0.8 {
            return vec![0];
        }
        let byte = header_byte(packet, bits::byte_index(index));
        return vec![byte.checked_shr(bit_offset).unwrap_or(0) & sub_byte_mask];
    }

    let index = index - PAYLOAD_OFFSET as f64;
    let byte_index = bits::byte_index(index);
    let Some(first) = packet.payload_byte(byte_index) else {
        return vec![0];
    };
    if index.floor() != index || size < 0.8 {
        if size > 1.0 {
            return vec![0];
        }
        return vec![first.checked_shr(bit_offset).unwrap_or(0) & sub_byte_mask];
    }

    let len = bits::byte_len(size);
    let lead_mask = BITMASK[bits::bit_size(size).min(8) as usize];
    let mask_byte = |i: usize| match mask {
        Some(m) if len <= 4 => (m >> ((len - i - 1) * 8)) as u8,
        _ => 0xFF,
    };
    (0..len)
        .map(|i| {
            let byte = packet.payload_byte(byte_index + i).unwrap_or(0);
            let byte = if i == 0 { byte & lead_mask } else { byte };
            byte & mask_byte(i)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairing_packet() -> BidCosPacket {
        // Device info: firmware 0x18, type 0x006C, serial, class, channels
        BidCosPacket::from_bytes(
            &[
                0x1A, 0x01, 0x84, 0x00, 0x1F, 0xA6, 0x5C, 0x00, 0x00, 0x00, 0x18, 0x00, 0x6C,
                0x4B, 0x45, 0x51, 0x30, 0x32, 0x33, 0x37, 0x33, 0x39, 0x38, 0x10, 0x41, 0x01,
                0x00, 0xC8,
            ],
            true,
        )
        .unwrap()
    }

    #[test]
    fn test_import() {
        let packet = pairing_packet();
        assert_eq!(packet.message_counter, 0x01);
        assert_eq!(packet.control_byte, 0x84);
        assert_eq!(packet.message_type, 0x00);
        assert_eq!(packet.sender_address, 0x1FA65C);
        assert_eq!(packet.destination_address, 0);
        assert_eq!(packet.payload.len(), 17);
        assert_eq!(packet.rssi, Some(0xC8));
        assert!(BidCosPacket::from_bytes(&[1, 2, 3], false).is_none());
    }

    #[test]
    fn test_to_bytes_roundtrip() {
        let packet = BidCosPacket::from_bytes(&[0x0B, 0x05, 0xA0, 0x11, 1, 2, 3, 4, 5, 6, 0x02], false).unwrap();
        assert_eq!(packet.to_bytes(), vec![0x0A, 0x05, 0xA0, 0x11, 1, 2, 3, 4, 5, 6, 0x02]);
    }

    #[test]
    fn test_payload_position() {
        let packet = pairing_packet();
        // Firmware byte
        assert_eq!(position(&packet, 9.0, 1.0, None), vec![0x18]);
        // Device type, two bytes
        assert_eq!(position(&packet, 10.0, 2.0, None), vec![0x00, 0x6C]);
        // Past the end
        assert_eq!(position(&packet, 40.0, 1.0, None), vec![0]);
    }

    #[test]
    fn test_sub_byte_position() {
        let packet = BidCosPacket::from_bytes(&[0x0B, 0, 0, 0x10, 0, 0, 0, 0, 0, 0, 0b1011_0110], false).unwrap();
        assert_eq!(position(&packet, 9.5, 0.3, None), vec![0b101]);
        assert_eq!(position(&packet, 9.0, 0.4, None), vec![0b0110]);
        // Wider than a byte at a bit offset is rejected
        assert_eq!(position(&packet, 9.4, 1.2, None), vec![0]);
    }

    #[test]
    fn test_header_position() {
        let packet = pairing_packet();
        assert_eq!(position(&packet, 2.0, 0.8, None), vec![0x00]);
        assert_eq!(position(&packet, 1.7, 0.1, None), vec![1]);
        assert_eq!(position(&packet, 5.0, 0.8, None), vec![0x5C]);
        assert_eq!(position(&packet, 3.0, 2.0, None), vec![0]);
    }

    #[test]
    fn test_masked_position() {
        let packet = pairing_packet();
        assert_eq!(position(&packet, 10.0, 2.0, Some(0x00FF)), vec![0x00, 0x6C]);
        assert_eq!(position(&packet, 10.0, 2.0, Some(0x0F00)), vec![0x00, 0x00]);
    }

    #[test]
    fn test_works_through_mock() {
        let mut mock = MockWirePacket::new();
        mock.expect_payload_byte().returning(|i| [0x42u8, 0x07].get(i).copied());
        assert_eq!(position(&mock, 10.0, 1.0, None), vec![0x07]);
    }
}
