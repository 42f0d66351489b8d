//! # Device Type
//!
//! A rule recognising which description applies to a physical device.

use super::parameter::{BooleanOperator, Parameter};
use crate::bits;
use crate::packet::{self, WirePacket};

/// Pairing packet positions with a fixed meaning for type-code matching
const INDEX_TYPE_CODE: f64 = 10.0;
const INDEX_FIRMWARE: f64 = 9.0;
const INDEX_TYPE_HIGH: f64 = 0.0;
const INDEX_TYPE_LOW: f64 = 1.0;
const INDEX_FIRMWARE_ALT: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceType {
    pub name: String,
    pub id: String,
    pub priority: i32,
    pub updatable: bool,
    /// Explicit numeric type code, takes precedence over the constants
    pub type_id: Option<i32>,
    /// Firmware version gate for `type_id`
    pub firmware: Option<i32>,
    pub firmware_operator: BooleanOperator,
    /// Constant-valued fields, all of which must match
    pub parameters: Vec<Parameter>,
}

impl Default for DeviceType {
    fn default() -> Self {
        Self {
            name: String::new(),
            id: String::new(),
            priority: 0,
            updatable: false,
            type_id: None,
            firmware: None,
            firmware_operator: BooleanOperator::Equal,
            parameters: Vec::new(),
        }
    }
}

impl DeviceType {
    fn check_firmware(&self, version: i32) -> bool {
        match self.firmware {
            Some(firmware) => self.firmware_operator.evaluate(version, firmware),
            None => true,
        }
    }

    /// Match against a numeric type code and firmware version
    ///
    /// Without an explicit `type_id`, the constants are read by their fixed
    /// pairing packet position: 10 is the full type code, 0 and 1 its high and
    /// low byte, 9 and 2 the firmware version. Any other position fails.
    pub fn matches_type(&self, type_code: i32, firmware: i32) -> bool {
        if let Some(type_id) = self.type_id {
            return type_id == type_code && self.check_firmware(firmware);
        }
        if self.parameters.is_empty() {
            return false;
        }
        self.parameters.iter().all(|p| match p.index {
            i if i == INDEX_TYPE_CODE => p.const_value == type_code,
            i if i == INDEX_FIRMWARE || i == INDEX_FIRMWARE_ALT => p.check_condition(firmware),
            i if i == INDEX_TYPE_HIGH => type_code >> 8 == p.const_value,
            i if i == INDEX_TYPE_LOW => type_code & 0xFF == p.const_value,
            _ => false,
        })
    }

    /// Match by string type id
    pub fn matches_id(&self, id: &str) -> bool {
        self.id == id
    }

    /// Match every constant against the field it addresses in `packet`
    pub fn matches_packet<P: WirePacket + ?Sized>(&self, packet: &P) -> bool {
        if self.parameters.is_empty() {
            return false;
        }
        self.parameters.iter().all(|p| {
            let field = packet::position(packet, p.index, p.size, None);
            p.check_condition(bits::read_be(&field))
        })
    }
}
