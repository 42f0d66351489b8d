//! # Channel
//!
//! An addressable functional unit of a device. One channel definition may
//! cover several consecutive indices (`count`); every covered slot refers to
//! the same [`Channel`].

use std::collections::BTreeMap;

use super::parameter::{LogicalParameter, Parameter};
use super::parameter_set::ParameterSetKind;
use super::{ChannelId, ParameterSetId};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelUiFlags {
    pub visible: bool,
    pub internal: bool,
    pub dont_delete: bool,
}

impl ChannelUiFlags {
    /// Set the flag named `name`, returning `false` if the name is unknown
    pub fn set(&mut self, name: &str) -> bool {
        match name {
            "visible" => self.visible = true,
            "internal" => self.internal = true,
            "dontdelete" => self.dont_delete = true,
            _ => return false,
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelDirection {
    pub sender: bool,
    pub receiver: bool,
}

/// Named roles a channel can take in a peer link
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinkRole {
    pub source_names: Vec<String>,
    pub target_names: Vec<String>,
}

/// A link parameter value forced on every new peer link
#[derive(Debug, Clone, PartialEq)]
pub struct EnforceLink {
    pub id: String,
    pub value: String,
}

impl EnforceLink {
    /// The enforced value typed after the link parameter it targets
    pub fn value(&self, logical: &LogicalParameter) -> Value {
        logical.parse_text(&self.value)
    }
}

/// Packet position of the device-reported channel count
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SysinfoCount {
    /// Packet index, always at a byte boundary and at least 9
    pub index: f64,
    /// Field size, at most one byte
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub start_index: u32,
    pub count: u32,
    pub physical_index_offset: i32,
    pub ui_flags: ChannelUiFlags,
    pub direction: ChannelDirection,
    pub channel_class: String,
    pub kind: String,
    pub hidden: bool,
    pub autoregister: bool,
    pub has_team: bool,
    pub aes_default: bool,
    pub aes_always: bool,
    pub aes_cbc: bool,
    pub team_tag: String,
    pub paired: bool,
    pub function: String,
    pub pair_function: Option<(char, char)>,
    pub count_from_sysinfo: Option<SysinfoCount>,
    pub parameter_sets: BTreeMap<ParameterSetKind, ParameterSetId>,
    pub link_roles: Option<LinkRole>,
    pub enforce_links: Vec<EnforceLink>,
    /// Physical override merged into the same-named master parameter
    pub special_parameter: Option<Box<Parameter>>,
    pub subconfig: Option<ChannelId>,
}

impl Default for Channel {
    fn default() -> Self {
        Self {
            start_index: 0,
            count: 1,
            physical_index_offset: 0,
            ui_flags: ChannelUiFlags::default(),
            direction: ChannelDirection::default(),
            channel_class: String::new(),
            kind: String::new(),
            hidden: false,
            autoregister: false,
            has_team: false,
            aes_default: false,
            aes_always: false,
            aes_cbc: false,
            team_tag: String::new(),
            paired: false,
            function: String::new(),
            pair_function: None,
            count_from_sysinfo: None,
            parameter_sets: BTreeMap::new(),
            link_roles: None,
            enforce_links: Vec::new(),
            special_parameter: None,
            subconfig: None,
        }
    }
}

impl Channel {
    pub fn parameter_set(&self, kind: ParameterSetKind) -> Option<ParameterSetId> {
        self.parameter_sets.get(&kind).copied()
    }

    /// Channel indices covered by this definition
    pub fn indices(&self) -> std::ops::Range<u32> {
        self.start_index..self.start_index.saturating_add(self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::parameter::LogicalType;

    #[test]
    fn test_ui_flags() {
        let mut flags = ChannelUiFlags::default();
        assert!(flags.set("dontdelete"));
        assert!(!flags.set("sticky"));
        assert!(flags.dont_delete && !flags.visible);
    }

    #[test]
    fn test_replicated_indices() {
        let channel = Channel { start_index: 3, count: 4, ..Default::default() };
        assert_eq!(channel.indices().collect::<Vec<_>>(), vec![3, 4, 5, 6]);
        assert_eq!(Channel::default().indices().count(), 1);
    }

    #[test]
    fn test_enforce_link_typed_by_target() {
        let link = EnforceLink { id: "SHORT_ON_LEVEL".into(), value: "0.5".into() };
        assert_eq!(link.value(&LogicalParameter::new(LogicalType::float())), Value::Float(0.5));
        let flag = EnforceLink { id: "UI_HINT".into(), value: "true".into() };
        assert_eq!(
            flag.value(&LogicalParameter::new(LogicalType::Boolean { default: None })),
            Value::Boolean(true)
        );
    }
}
