//! # Description Loader
//!
//! Turns a device description XML document into a [`DeviceDescription`].
//!
//! Loading is tolerant: unknown attributes, elements and enum values are
//! reported as schema diagnostics and skipped. Only an unparseable document
//! or a missing `device` root fails the whole file.
//!
//! After the element tree is read, a fixed sequence of passes resolves it:
//!
//! 1. `paramset_defs` subsets are spliced into the sets that reference them
//! 2. Channel 0 is guaranteed to exist with a master set
//! 3. Values parameters are registered with the frames that carry them
//! 4. Internal pairing parameters (and `AES_ACTIVE`) are injected

mod channel;
mod frame;
mod parameter;

use roxmltree::Node;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::debug;

use self::channel::{parse_channel, parse_parameter_set, ParsedSet};
use self::frame::{parse_device_type, parse_frame, parse_run_program};
use crate::bits;
use crate::description::conversion::{BooleanInteger, ParameterConversion};
use crate::description::parameter::{Interface, ParameterUiFlags, PhysicalParameter, PhysicalType};
use crate::description::{
    Channel, ChannelId, DeviceDescription, DeviceFamily, FrameId, LogicalParameter, LogicalType, Parameter,
    ParameterId, ParameterSet, ParameterSetKind, RxModes,
};
use crate::diagnostics::{Diagnostics, Outcome};
use crate::error::{Result, SchemaError};

/// Diagnostic sink that knows where in the document it is
pub(crate) struct Scope<'a> {
    path: String,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Scope<'a> {
    pub fn new(path: impl Into<String>, diagnostics: &'a mut Diagnostics) -> Self {
        Self { path: path.into(), diagnostics }
    }

    /// A scope for a nested element
    pub fn child(&mut self, segment: &str) -> Scope<'_> {
        Scope { path: format!("{}/{}", self.path, segment), diagnostics: &mut *self.diagnostics }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.diagnostics.schema_warning(&self.path, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.diagnostics.schema_error(&self.path, message);
    }

    pub fn unknown_attribute(&mut self, name: &str) {
        self.warn(format!("unknown attribute \"{}\"", name));
    }

    pub fn unknown_element(&mut self, name: &str) {
        self.warn(format!("unknown element \"{}\"", name));
    }

    pub fn unknown_value(&mut self, attribute: &str, value: &str) {
        self.warn(format!("unknown value \"{}\" for \"{}\"", value, attribute));
    }
}

/// Child elements of `node`, skipping text and comments
pub(crate) fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

/// Parse a `byte.bit` position such as `12.3`
pub(crate) fn parse_byte_bit(text: &str) -> f64 {
    bits::parse_double(text)
}

/// Load a description file
///
/// # Arguments
///
/// * `path` - Path to the XML file
/// * `family` - Device family the description belongs to
///
/// # Returns
///
/// * `Result<Outcome<DeviceDescription>>` - The resolved description with
///   every schema diagnostic found while reading it
///
/// # Errors
///
/// Returns error if:
/// - The file cannot be read
/// - The document is not well-formed XML
/// - The root element is not `device`
pub fn load_file<P: AsRef<Path>>(path: P, family: DeviceFamily) -> Result<Outcome<DeviceDescription>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    debug!("Parsing device description {}", path.display());
    load_document(&text, family, path)
}

/// Load a description from an in-memory document
///
/// # Errors
///
/// Returns error if the document is not well-formed or has no `device` root
pub fn load_str(xml: &str, family: DeviceFamily) -> Result<Outcome<DeviceDescription>> {
    load_document(xml, family, Path::new("<memory>"))
}

fn load_document(xml: &str, family: DeviceFamily, origin: &Path) -> Result<Outcome<DeviceDescription>> {
    let document = roxmltree::Document::parse(xml)?;
    let root = document.root_element();
    if root.tag_name().name() != "device" {
        return Err(SchemaError::MissingRoot { path: origin.to_path_buf() });
    }

    let mut diagnostics = Diagnostics::new();
    let mut desc = parse_device(root, family, &mut Scope::new("device", &mut diagnostics));
    inject_pairing_parameters(&mut desc);
    if desc.supports_aes {
        inject_aes_parameters(&mut desc);
    }
    Ok(Outcome::new(desc, diagnostics))
}

/// Read a `device` element and run the resolution passes
///
/// Used for the document root and for `team` elements.
fn parse_device(node: Node, family: DeviceFamily, scope: &mut Scope) -> DeviceDescription {
    let mut desc = DeviceDescription::new(family);

    for attr in node.attributes() {
        let value = attr.value();
        match attr.name() {
            "version" => desc.version = bits::parse_number(value).max(0) as u32,
            "rx_modes" => {
                let (modes, unknown) = RxModes::parse(value);
                for mode in unknown {
                    scope.unknown_value("rx_modes", &mode);
                }
                desc.rx_modes = modes;
                desc.has_battery = modes.implies_battery();
            }
            "class" => desc.device_class = value.to_string(),
            "eep_size" => desc.eep_size = bits::parse_number(value),
            "rx_default" => {}
            "ui_flags" => {
                if !desc.ui_flags.set(value) {
                    scope.unknown_value("ui_flags", value);
                }
            }
            "cyclic_timeout" => desc.cyclic_timeout = bits::parse_number(value).max(0) as u32,
            "supports_aes" => desc.supports_aes = value == "true",
            "peering_sysinfo_expect_channel" => desc.peering_sysinfo_expect_channel = value != "false",
            "needs_time" => desc.needs_time = value == "true",
            other => scope.unknown_attribute(other),
        }
    }

    let mut device_set = None;
    let mut definitions: HashMap<String, ParsedSet> = HashMap::new();
    for child in elements(node) {
        match child.tag_name().name() {
            "types" | "supported_types" => {
                for type_node in elements(child) {
                    if type_node.tag_name().name() == "type" {
                        desc.supported_types.push(parse_device_type(type_node, scope));
                    } else {
                        scope.unknown_element(type_node.tag_name().name());
                    }
                }
            }
            "paramset" | "parameters" => {
                let parsed = parse_parameter_set(child, scope);
                if parsed.kind == Some(ParameterSetKind::Master) {
                    device_set = Some(parsed);
                } else {
                    scope.error("the device parameter set must be of type master");
                }
            }
            "paramset_defs" => {
                for attr in child.attributes() {
                    scope.unknown_attribute(attr.name());
                }
                for set_node in elements(child) {
                    match set_node.tag_name().name() {
                        "paramset" | "parameters" => {
                            let parsed = parse_parameter_set(set_node, scope);
                            definitions.insert(parsed.set.id.clone(), parsed);
                        }
                        other => scope.unknown_element(other),
                    }
                }
            }
            "channels" => {
                for channel_node in elements(child) {
                    if channel_node.tag_name().name() == "channel" {
                        add_channel(&mut desc, channel_node, scope);
                    } else {
                        scope.unknown_element(channel_node.tag_name().name());
                    }
                }
            }
            "packets" | "frames" => {
                for frame_node in elements(child) {
                    match frame_node.tag_name().name() {
                        "frame" | "packet" => {
                            desc.add_frame(parse_frame(frame_node, scope));
                        }
                        other => scope.unknown_element(other),
                    }
                }
            }
            "run_program" => desc.run_program = Some(parse_run_program(child, scope)),
            "team" => {
                let mut team_scope = scope.child("team");
                desc.team = Some(Box::new(parse_device(child, family, &mut team_scope)));
            }
            other => scope.unknown_element(other),
        }
    }

    splice_subsets(&mut desc, &definitions);
    ensure_root_master(&mut desc, device_set, scope);
    associate_frames(&mut desc);
    desc
}

/// Parse a channel, occupy its slots and record its sysinfo count position
fn add_channel(desc: &mut DeviceDescription, node: Node, scope: &mut Scope) {
    let mut channel = parse_channel(node, desc, scope);

    if let Some(sysinfo) = channel.count_from_sysinfo {
        if desc.count_from_sysinfo_index > -1 {
            scope.error("count_from_sysinfo is defined for two channels");
        }
        if sysinfo.index.fract() != 0.0 {
            scope.error("count_from_sysinfo must start at bit 0 of a byte");
            channel.count_from_sysinfo = None;
        } else {
            desc.count_from_sysinfo_index = sysinfo.index as i32;
            desc.count_from_sysinfo_size = if sysinfo.size <= 0.0 { 1.0 } else { sysinfo.size };
        }
    }

    let slots = channel.indices();
    let handle = desc.add_channel(channel);
    for index in slots {
        if desc.channels.contains_key(&index) {
            scope.error(format!("channel index {} is defined twice", index));
        } else {
            desc.channels.insert(index, handle);
        }
    }
}

/// Distinct channel handles in slot order
fn channel_handles(desc: &DeviceDescription) -> Vec<ChannelId> {
    let mut seen = BTreeSet::new();
    desc.channels.values().copied().filter(|id| seen.insert(*id)).collect()
}

/// Replace every set that references a definition with definition + own parameters
fn splice_subsets(desc: &mut DeviceDescription, definitions: &HashMap<String, ParsedSet>) {
    if definitions.is_empty() {
        return;
    }
    for channel_id in channel_handles(desc) {
        let sets: Vec<_> = desc.channel_by_id(channel_id).parameter_sets.iter().map(|(k, v)| (*k, *v)).collect();
        for (kind, set_id) in sets {
            let own = desc.parameter_set(set_id).clone();
            let Some(definition) = definitions.get(&own.subset_reference) else {
                continue;
            };

            let mut spliced = definition.set.clone();
            spliced.kind = kind;
            spliced.id = own.id.clone();
            spliced.parameters = Vec::new();
            let handle = desc.add_parameter_set(spliced);
            for parameter in &definition.parameters {
                desc.push_parameter(handle, parameter.clone());
            }
            for parameter_id in own.parameters {
                let parameter = desc.parameter_mut(parameter_id);
                parameter.parent = Some(handle);
                let list = parameter.physical.list;
                desc.parameter_set_mut(handle).push(parameter_id, list);
            }
            desc.channel_by_id_mut(channel_id).parameter_sets.insert(kind, handle);
        }
    }
}

/// Guarantee channel 0 with a master set; a device level set becomes that set
fn ensure_root_master(desc: &mut DeviceDescription, device_set: Option<ParsedSet>, scope: &mut Scope) {
    let root = match desc.channels.get(&0) {
        Some(root) => *root,
        None => {
            let root = desc.add_channel(Channel::default());
            desc.channels.insert(0, root);
            root
        }
    };
    let master = match desc.channel_by_id(root).parameter_set(ParameterSetKind::Master) {
        Some(master) => master,
        None => {
            let master = desc.add_parameter_set(ParameterSet::new(ParameterSetKind::Master));
            desc.channel_by_id_mut(root).parameter_sets.insert(ParameterSetKind::Master, master);
            master
        }
    };

    let Some(device_set) = device_set.filter(|s| !s.parameters.is_empty()) else {
        return;
    };
    if !desc.parameter_set(master).parameters.is_empty() {
        scope.error("the master parameter set of channel 0 has to be empty");
    }
    let handle = device_set.install(desc, ParameterSetKind::Master);
    desc.channel_by_id_mut(root).parameter_sets.insert(ParameterSetKind::Master, handle);
}

fn associate(desc: &mut DeviceDescription, frame: FrameId, parameter: ParameterId) {
    let values = &mut desc.frame_mut(frame).associated_values;
    if !values.contains(&parameter) {
        values.push(parameter);
    }
}

/// Register each values parameter with its get, set and event frames
fn associate_frames(desc: &mut DeviceDescription) {
    let slots: Vec<(u32, ChannelId)> = desc.channels.iter().map(|(i, c)| (*i, *c)).collect();
    for (index, channel_id) in slots {
        let channel = desc.channel_by_id(channel_id);
        let Some(values) = channel.parameter_set(ParameterSetKind::Values) else {
            continue;
        };
        let offset = channel.physical_index_offset;

        for parameter_id in desc.parameter_set(values).parameters.clone() {
            let parameter = desc.parameter(parameter_id);
            let id = parameter.id.clone();
            let get_request = parameter.physical.get_request.clone();
            let set_request = parameter.physical.set_request.clone();
            let events: Vec<String> = parameter.physical.events.iter().map(|e| e.frame.clone()).collect();

            if let Some(frame) = desc.frame_handle(&get_request) {
                associate(desc, frame, parameter_id);
                desc.value_request_frames.entry(index).or_default().insert(get_request, frame);
            }
            if let Some(frame) = desc.frame_handle(&set_request) {
                associate(desc, frame, parameter_id);
            }
            for event in events {
                let Some(frame) = desc.frame_handle(&event) else {
                    continue;
                };
                associate(desc, frame, parameter_id);
                desc.frame_mut(frame).channel_index_offset = offset;

                // Float values only learn their signedness from the frame
                let templates: Vec<(bool, f64)> = desc
                    .frame(frame)
                    .parameters
                    .iter()
                    .filter(|t| t.refers_to(&id))
                    .map(|t| (t.signed, t.size))
                    .collect();
                let parameter = desc.parameter_mut(parameter_id);
                for (signed, size) in templates {
                    parameter.adopt_frame_field(signed, size);
                }
            }
        }
    }
}

/// Invisible internal parameter stored in list 0 of channel 0
fn pairing_parameter(id: &str, logical: LogicalType, kind: PhysicalType, index: f64) -> Parameter {
    let mut physical = PhysicalParameter {
        kind,
        interface: Interface::Internal,
        value_id: id.to_string(),
        list: 0,
        index,
        ..Default::default()
    };
    physical.update_range();
    Parameter {
        id: id.to_string(),
        ui_flags: ParameterUiFlags { visible: false, invisible: true, ..Default::default() },
        logical: LogicalParameter::new(logical),
        physical,
        ..Default::default()
    }
}

fn inject_pairing_parameters(desc: &mut DeviceDescription) {
    let Some(master) = desc.channel(0).and_then(|c| c.parameter_set(ParameterSetKind::Master)) else {
        return;
    };
    let injected = [
        pairing_parameter("PAIRED_TO_CENTRAL", LogicalType::Boolean { default: None }, PhysicalType::Boolean, 2.0),
        pairing_parameter("CENTRAL_ADDRESS_BYTE_1", LogicalType::integer(), PhysicalType::Integer, 10.0),
        pairing_parameter("CENTRAL_ADDRESS_BYTE_2", LogicalType::integer(), PhysicalType::Integer, 11.0),
        pairing_parameter("CENTRAL_ADDRESS_BYTE_3", LogicalType::integer(), PhysicalType::Integer, 12.0),
    ];
    for parameter in injected {
        desc.push_parameter(master, parameter);
    }
}

/// Give every channel but 0 an `AES_ACTIVE` switch defaulting to off
fn inject_aes_parameters(desc: &mut DeviceDescription) {
    let channels: BTreeSet<ChannelId> = desc
        .channels
        .iter()
        .filter(|(index, _)| **index != 0)
        .map(|(_, id)| *id)
        .collect();

    for channel_id in channels {
        let Some(master) = desc.channel_by_id(channel_id).parameter_set(ParameterSetKind::Master) else {
            continue;
        };
        let existing = desc.parameter_set(master).find(desc.parameters(), "AES_ACTIVE");
        let parameter_id = match existing {
            Some(id) => id,
            None => desc.push_parameter(master, Parameter::new("AES_ACTIVE")),
        };

        let parameter = desc.parameter_mut(parameter_id);
        parameter.ui_flags = ParameterUiFlags { visible: false, internal: true, ..Default::default() };
        parameter.conversions = vec![ParameterConversion::BooleanInteger(BooleanInteger::default())];
        parameter.logical = LogicalParameter::new(LogicalType::Boolean { default: Some(false) });
        parameter.physical.interface = Interface::Config;
        parameter.physical.kind = PhysicalType::Integer;
        parameter.physical.value_id = "AES_ACTIVE".to_string();
        parameter.physical.list = 1;
        parameter.physical.index = 8.0;
        parameter.physical.update_range();
        desc.parameter_set_mut(master).lists.insert(1);
    }
}
