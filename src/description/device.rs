//! # Device Description
//!
//! The root of the entity graph and owner of every arena. Built once by the
//! loader; afterwards only [`DeviceDescription::with_sysinfo_count`] derives
//! new descriptions from it, always as a fresh clone.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::channel::{Channel, ChannelUiFlags};
use super::device_type::DeviceType;
use super::frame::DeviceFrame;
use super::parameter::Parameter;
use super::parameter_set::{ParameterSet, ParameterSetKind};
use super::{ChannelId, FrameId, ParameterId, ParameterSetId};
use crate::diagnostics::{Diagnostics, Outcome};
use crate::packet::{WirePacket, PAYLOAD_OFFSET};

/// Device families sharing the description engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceFamily {
    #[serde(rename = "homematic_bidcos")]
    HomeMaticBidCos,
    #[serde(rename = "homematic_wired")]
    HomeMaticWired,
    #[serde(rename = "insteon")]
    Insteon,
    #[serde(rename = "max")]
    Max,
    #[serde(rename = "fs20")]
    Fs20,
}

impl fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::HomeMaticBidCos => "homematic_bidcos",
            Self::HomeMaticWired => "homematic_wired",
            Self::Insteon => "insteon",
            Self::Max => "max",
            Self::Fs20 => "fs20",
        };
        f.write_str(name)
    }
}

/// Numeric device type code within a family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogicalDeviceType {
    pub family: DeviceFamily,
    pub type_code: i32,
}

impl LogicalDeviceType {
    pub fn new(family: DeviceFamily, type_code: i32) -> Self {
        Self { family, type_code }
    }
}

/// When the device listens for packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxModes {
    pub always: bool,
    pub burst: bool,
    pub config: bool,
    pub wake_up: bool,
    pub wake_up2: bool,
    pub lazy_config: bool,
}

impl Default for RxModes {
    fn default() -> Self {
        Self { always: true, burst: false, config: false, wake_up: false, wake_up2: false, lazy_config: false }
    }
}

impl RxModes {
    /// Parse a comma separated mode list
    ///
    /// Unknown names are returned so the caller can report them. An empty
    /// result falls back to `always`.
    pub fn parse(text: &str) -> (Self, Vec<String>) {
        let mut modes = Self { always: false, ..Default::default() };
        let mut unknown = Vec::new();
        for element in text.split(',').map(|e| e.trim().to_ascii_lowercase()) {
            match element.as_str() {
                "always" => modes.always = true,
                "burst" => modes.burst = true,
                "config" => modes.config = true,
                "wakeup" => modes.wake_up = true,
                "wakeup2" => modes.wake_up2 = true,
                "lazy_config" => modes.lazy_config = true,
                "" => {}
                _ => unknown.push(element),
            }
        }
        if modes == (Self { always: false, ..Default::default() }) {
            modes.always = true;
        }
        (modes, unknown)
    }

    /// Any mode besides `always` means the device sleeps, so runs on battery
    pub fn implies_battery(&self) -> bool {
        *self != Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartType {
    #[default]
    None,
    Once,
    Interval,
    Permanent,
}

/// External program started for script-driven devices
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunProgram {
    pub path: String,
    pub arguments: Vec<String>,
    pub start_type: StartType,
    pub interval: u32,
}

/// Parsed schema of one device model
#[derive(Debug, Clone)]
pub struct DeviceDescription {
    pub family: DeviceFamily,
    pub version: u32,
    pub device_class: String,
    pub rx_modes: RxModes,
    pub ui_flags: ChannelUiFlags,
    pub supports_aes: bool,
    /// Seconds without contact before the device counts as unreachable
    pub cyclic_timeout: u32,
    pub eep_size: i32,
    pub has_battery: bool,
    pub peering_sysinfo_expect_channel: bool,
    pub needs_time: bool,
    /// Packet index of the channel count byte, -1 if the count is fixed
    pub count_from_sysinfo_index: i32,
    pub count_from_sysinfo_size: f64,
    /// Channel count this description was resolved for, -1 if unresolved
    pub count_from_sysinfo: i32,
    pub supported_types: Vec<DeviceType>,
    pub run_program: Option<RunProgram>,
    /// Grouped devices carry a second description of the same shape
    pub team: Option<Box<DeviceDescription>>,
    /// Channel index to channel; replicated slots share a handle
    pub channels: BTreeMap<u32, ChannelId>,
    /// Get-request frames of each channel, keyed by frame id
    pub value_request_frames: BTreeMap<u32, BTreeMap<String, FrameId>>,
    parameters: Vec<Parameter>,
    parameter_sets: Vec<ParameterSet>,
    channel_store: Vec<Channel>,
    frames: Vec<DeviceFrame>,
    frames_by_type: BTreeMap<u32, Vec<FrameId>>,
    frames_by_id: HashMap<String, FrameId>,
}

impl DeviceDescription {
    pub fn new(family: DeviceFamily) -> Self {
        Self {
            family,
            version: 0,
            device_class: String::new(),
            rx_modes: RxModes::default(),
            ui_flags: ChannelUiFlags::default(),
            supports_aes: false,
            cyclic_timeout: 0,
            eep_size: 1024,
            has_battery: false,
            peering_sysinfo_expect_channel: true,
            needs_time: false,
            count_from_sysinfo_index: -1,
            count_from_sysinfo_size: 1.0,
            count_from_sysinfo: -1,
            supported_types: Vec::new(),
            run_program: None,
            team: None,
            channels: BTreeMap::new(),
            value_request_frames: BTreeMap::new(),
            parameters: Vec::new(),
            parameter_sets: Vec::new(),
            channel_store: Vec::new(),
            frames: Vec::new(),
            frames_by_type: BTreeMap::new(),
            frames_by_id: HashMap::new(),
        }
    }

    // Arena construction

    pub fn add_parameter(&mut self, parameter: Parameter) -> ParameterId {
        self.parameters.push(parameter);
        ParameterId(self.parameters.len() - 1)
    }

    pub fn add_parameter_set(&mut self, set: ParameterSet) -> ParameterSetId {
        self.parameter_sets.push(set);
        ParameterSetId(self.parameter_sets.len() - 1)
    }

    pub fn add_channel(&mut self, channel: Channel) -> ChannelId {
        self.channel_store.push(channel);
        ChannelId(self.channel_store.len() - 1)
    }

    /// Register a frame under its message type and id
    ///
    /// A later frame with the same id replaces the earlier one in the id
    /// index; both stay reachable by message type.
    pub fn add_frame(&mut self, frame: DeviceFrame) -> FrameId {
        let id = FrameId(self.frames.len());
        self.frames_by_type.entry(frame.kind).or_default().push(id);
        self.frames_by_id.insert(frame.id.clone(), id);
        self.frames.push(frame);
        id
    }

    /// Create a parameter owned by `set`
    pub fn push_parameter(&mut self, set: ParameterSetId, mut parameter: Parameter) -> ParameterId {
        parameter.parent = Some(set);
        let list = parameter.physical.list;
        let id = self.add_parameter(parameter);
        self.parameter_sets[set.0].push(id, list);
        id
    }

    // Arena access

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameter(&self, id: ParameterId) -> &Parameter {
        &self.parameters[id.0]
    }

    pub fn parameter_mut(&mut self, id: ParameterId) -> &mut Parameter {
        &mut self.parameters[id.0]
    }

    pub fn parameter_set(&self, id: ParameterSetId) -> &ParameterSet {
        &self.parameter_sets[id.0]
    }

    pub fn parameter_set_mut(&mut self, id: ParameterSetId) -> &mut ParameterSet {
        &mut self.parameter_sets[id.0]
    }

    pub fn channel_by_id(&self, id: ChannelId) -> &Channel {
        &self.channel_store[id.0]
    }

    pub fn channel_by_id_mut(&mut self, id: ChannelId) -> &mut Channel {
        &mut self.channel_store[id.0]
    }

    pub fn frame(&self, id: FrameId) -> &DeviceFrame {
        &self.frames[id.0]
    }

    pub fn frame_mut(&mut self, id: FrameId) -> &mut DeviceFrame {
        &mut self.frames[id.0]
    }

    // Queries

    /// The channel at slot `index`
    pub fn channel(&self, index: u32) -> Option<&Channel> {
        self.channels.get(&index).map(|id| self.channel_by_id(*id))
    }

    /// The `kind` parameter set of channel `index`
    pub fn channel_parameter_set(&self, index: u32, kind: ParameterSetKind) -> Option<&ParameterSet> {
        self.channel(index)?.parameter_set(kind).map(|id| self.parameter_set(id))
    }

    /// Parameter `name` in the `kind` set of channel `index`
    pub fn channel_parameter(&self, index: u32, kind: ParameterSetKind, name: &str) -> Option<&Parameter> {
        self.channel_parameter_set(index, kind)?.parameter(&self.parameters, name)
    }

    pub fn frame_by_id(&self, id: &str) -> Option<&DeviceFrame> {
        self.frame_handle(id).map(|id| self.frame(id))
    }

    pub fn frame_handle(&self, id: &str) -> Option<FrameId> {
        self.frames_by_id.get(id).copied()
    }

    /// All frames with message type `kind`
    pub fn frames_of_type(&self, kind: u32) -> impl Iterator<Item = &DeviceFrame> + '_ {
        self.frames_by_type
            .get(&kind)
            .into_iter()
            .flatten()
            .map(move |id| self.frame(*id))
    }

    /// Get-request frame `frame_id` registered for channel `channel`
    pub fn value_request_frame(&self, channel: u32, frame_id: &str) -> Option<&DeviceFrame> {
        self.value_request_frames
            .get(&channel)?
            .get(frame_id)
            .map(|id| self.frame(*id))
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// First supported type matching a numeric type code
    pub fn device_type(&self, ty: &LogicalDeviceType, firmware: i32) -> Option<&DeviceType> {
        if ty.family != self.family {
            return None;
        }
        self.supported_types.iter().find(|t| t.matches_type(ty.type_code, firmware))
    }

    /// Read the device-reported channel count from a pairing packet
    ///
    /// # Returns
    ///
    /// * `i32` - The masked count byte, or -1 when the description has no
    ///   count position or the packet is too short
    pub fn count_from_packet<P: WirePacket + ?Sized>(&self, packet: Option<&P>) -> i32 {
        let Some(packet) = packet else {
            return -1;
        };
        if self.count_from_sysinfo_index < PAYLOAD_OFFSET as i32 {
            return -1;
        }
        let bits = if self.count_from_sysinfo_size < 1.0 {
            ((self.count_from_sysinfo_size * 10.0).round() as u32).min(8)
        } else {
            8
        };
        let mask = ((1u32 << bits) - 1) as u8;
        let offset = self.count_from_sysinfo_index as usize - PAYLOAD_OFFSET;
        match packet.payload_byte(offset) {
            Some(byte) => i32::from(byte & mask),
            None => -1,
        }
    }

    /// Clone this description and replicate its sysinfo channel
    ///
    /// The channel marked with `count_from_sysinfo` is made to cover
    /// `count` consecutive slots starting at its own index. New slots share
    /// the channel handle and the get-request frames of the original slot.
    /// `self` is never modified.
    ///
    /// # Arguments
    ///
    /// * `count` - Channel count reported by the device
    ///
    /// # Returns
    ///
    /// * `Outcome<DeviceDescription>` - The resolved clone; occupied slots are
    ///   reported and left alone
    pub fn with_sysinfo_count(&self, count: i32) -> Outcome<DeviceDescription> {
        let mut clone = self.clone();
        let mut diagnostics = Diagnostics::new();
        clone.count_from_sysinfo = count;

        let source = self
            .channels
            .iter()
            .find(|(_, id)| self.channel_by_id(**id).count_from_sysinfo.is_some())
            .map(|(index, id)| (*index, *id));
        let Some((base, channel)) = source else {
            return Outcome::new(clone, diagnostics);
        };

        let request_frames = self.value_request_frames.get(&base).cloned().unwrap_or_default();
        let end = base.saturating_add(count.max(0) as u32);
        for index in base + 1..end {
            if clone.channels.contains_key(&index) {
                diagnostics.schema_error(
                    &format!("channels/{}", index),
                    "replicated channel collides with an existing channel",
                );
                continue;
            }
            clone.channels.insert(index, channel);
            if !request_frames.is_empty() {
                clone.value_request_frames.insert(index, request_frames.clone());
            }
        }
        Outcome::new(clone, diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::channel::SysinfoCount;
    use crate::description::parameter::PhysicalParameter;
    use crate::packet::{BidCosPacket, MockWirePacket};

    fn sysinfo_description() -> DeviceDescription {
        let mut desc = DeviceDescription::new(DeviceFamily::HomeMaticBidCos);
        desc.count_from_sysinfo_index = 23;
        desc.count_from_sysinfo_size = 0.6;

        let master = desc.add_parameter_set(ParameterSet::new(ParameterSetKind::Master));
        let root = desc.add_channel(Channel { parameter_sets: [(ParameterSetKind::Master, master)].into(), ..Default::default() });
        desc.channels.insert(0, root);

        let values = desc.add_parameter_set(ParameterSet::new(ParameterSetKind::Values));
        let mut state = Parameter::new("STATE");
        state.physical = PhysicalParameter { get_request: "LEVEL_GET".into(), ..Default::default() };
        desc.push_parameter(values, state);
        let switch = desc.add_channel(Channel {
            start_index: 1,
            count_from_sysinfo: Some(SysinfoCount { index: 23.0, size: 0.6 }),
            parameter_sets: [(ParameterSetKind::Values, values)].into(),
            ..Default::default()
        });
        desc.channels.insert(1, switch);

        let frame = desc.add_frame(DeviceFrame { id: "LEVEL_GET".into(), kind: 0x01, ..Default::default() });
        desc.value_request_frames.entry(1).or_default().insert("LEVEL_GET".into(), frame);
        desc
    }

    #[test]
    fn test_rx_modes() {
        let (modes, unknown) = RxModes::parse("config, wakeup,bogus");
        assert!(modes.config && modes.wake_up && !modes.always);
        assert!(modes.implies_battery());
        assert_eq!(unknown, vec!["bogus".to_string()]);

        let (modes, _) = RxModes::parse("");
        assert_eq!(modes, RxModes::default());
        assert!(!modes.implies_battery());
    }

    #[test]
    fn test_family_serde_names() {
        let family: DeviceFamily = serde_json::from_str("\"homematic_bidcos\"").unwrap();
        assert_eq!(family, DeviceFamily::HomeMaticBidCos);
        assert_eq!(DeviceFamily::Fs20.to_string(), "fs20");
    }

    #[test]
    fn test_count_from_packet() {
        let desc = sysinfo_description();
        let mut payload = vec![0u8; 17];
        payload[14] = 0b1100_0100;
        let packet = BidCosPacket { message_type: 0x00, payload, ..Default::default() };
        // six bit mask
        assert_eq!(desc.count_from_packet(Some(&packet)), 4);
        assert_eq!(desc.count_from_packet::<BidCosPacket>(None), -1);

        let short = BidCosPacket { payload: vec![0; 3], ..Default::default() };
        assert_eq!(desc.count_from_packet(Some(&short)), -1);

        let fixed = DeviceDescription::new(DeviceFamily::HomeMaticBidCos);
        assert_eq!(fixed.count_from_packet(Some(&packet)), -1);
    }

    #[test]
    fn test_count_from_mock_packet() {
        let desc = sysinfo_description();
        let mut mock = MockWirePacket::new();
        mock.expect_payload_byte().withf(|i| *i == 14).return_const(Some(0x02u8));
        assert_eq!(desc.count_from_packet(Some(&mock)), 2);
    }

    #[test]
    fn test_sysinfo_replication() {
        let base = sysinfo_description();
        let outcome = base.with_sysinfo_count(4);
        assert!(outcome.diagnostics.is_empty());
        let resolved = outcome.value;

        assert_eq!(resolved.count_from_sysinfo, 4);
        assert_eq!(resolved.channels.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
        assert_eq!(resolved.channels[&4], resolved.channels[&1]);
        assert_eq!(resolved.value_request_frame(3, "LEVEL_GET").map(|f| f.id.as_str()), Some("LEVEL_GET"));
        assert!(resolved.channel_parameter(4, ParameterSetKind::Values, "STATE").is_some());

        // the source is untouched
        assert_eq!(base.count_from_sysinfo, -1);
        assert_eq!(base.channels.len(), 2);
    }

    #[test]
    fn test_replication_reports_collisions() {
        let mut base = sysinfo_description();
        let other = base.add_channel(Channel { start_index: 3, ..Default::default() });
        base.channels.insert(3, other);

        let outcome = base.with_sysinfo_count(3);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.value.channels[&3], other);
        assert_eq!(outcome.value.channels[&2], base.channels[&1]);
    }

    #[test]
    fn test_frame_registry() {
        let mut desc = DeviceDescription::new(DeviceFamily::HomeMaticBidCos);
        desc.add_frame(DeviceFrame { id: "A".into(), kind: 0x10, ..Default::default() });
        desc.add_frame(DeviceFrame { id: "B".into(), kind: 0x10, ..Default::default() });
        desc.add_frame(DeviceFrame { id: "C".into(), kind: 0x11, ..Default::default() });
        assert_eq!(desc.frames_of_type(0x10).count(), 2);
        assert_eq!(desc.frames_of_type(0x12).count(), 0);
        assert_eq!(desc.frame_by_id("C").map(|f| f.kind), Some(0x11));
        assert_eq!(desc.frame_count(), 3);
    }
}
