//! # Device Frame
//!
//! The shape of one kind of wire packet and how its target channel is found.

use super::parameter::Parameter;
use super::ParameterId;
use crate::bits;
use crate::packet::{self, WirePacket};

/// `fixed_channel` value meaning "any channel"
pub const ANY_CHANNEL: i32 = -2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameDirection {
    #[default]
    None,
    FromDevice,
    ToDevice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AllowedReceivers {
    pub broadcast: bool,
    pub central: bool,
    pub other: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceFrame {
    pub id: String,
    pub direction: FrameDirection,
    pub allowed_receivers: AllowedReceivers,
    pub is_event: bool,
    /// Message type byte
    pub kind: u32,
    pub subtype: i32,
    pub subtype_index: i32,
    pub subtype_field_size: f64,
    pub response_type: i32,
    pub response_subtype: i32,
    pub channel_field: i32,
    pub channel_field_size: f64,
    /// Set from the channel whose values this frame carries
    pub channel_index_offset: i32,
    /// Fixed channel number, [`ANY_CHANNEL`] or -1 when the packet says
    pub fixed_channel: i32,
    pub size: i32,
    pub double_send: bool,
    pub max_packets: i32,
    pub split_after: i32,
    /// Constant-valued template fields, used for matching only
    pub parameters: Vec<Parameter>,
    /// Real parameters this frame can populate
    pub associated_values: Vec<ParameterId>,
}

impl Default for DeviceFrame {
    fn default() -> Self {
        Self {
            id: String::new(),
            direction: FrameDirection::None,
            allowed_receivers: AllowedReceivers::default(),
            is_event: false,
            kind: 0,
            subtype: -1,
            subtype_index: -1,
            subtype_field_size: 1.0,
            response_type: -1,
            response_subtype: -1,
            channel_field: -1,
            channel_field_size: 1.0,
            channel_index_offset: 0,
            fixed_channel: -1,
            size: 0,
            double_send: false,
            max_packets: 1,
            split_after: -1,
            parameters: Vec::new(),
            associated_values: Vec::new(),
        }
    }
}

impl DeviceFrame {
    /// Template parameter feeding the value called `name`
    pub fn template_for(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.refers_to(name))
    }

    /// `true` if the packet's type, subtype and constant fields fit this frame
    pub fn matches<P: WirePacket + ?Sized>(&self, packet: &P) -> bool {
        if u32::from(packet.message_type()) != self.kind {
            return false;
        }
        if self.subtype > -1 && self.subtype_index >= 9 {
            let field = packet::position(packet, self.subtype_index as f64, self.subtype_field_size, None);
            if bits::read_be(&field) != self.subtype {
                return false;
            }
        }
        self.parameters
            .iter()
            .filter(|p| p.const_value > -1)
            .all(|p| {
                let field = packet::position(packet, p.index, p.size, p.mask);
                p.check_condition(bits::read_be(&field))
            })
    }

    /// Channel a packet of this frame is addressed to
    ///
    /// # Returns
    ///
    /// * `Option<i32>` - The channel, `Some(ANY_CHANNEL)` for wildcard frames
    ///   or `None` if the frame carries no channel
    pub fn channel<P: WirePacket + ?Sized>(&self, packet: &P) -> Option<i32> {
        if self.fixed_channel != -1 {
            return Some(self.fixed_channel);
        }
        if self.channel_field < 0 {
            return None;
        }
        let field = packet::position(packet, self.channel_field as f64, self.channel_field_size, None);
        Some(bits::read_be(&field) - self.channel_index_offset)
    }
}
