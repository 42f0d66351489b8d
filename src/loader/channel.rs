//! # Channel and Parameter Set Parsing
//!
//! Parameter sets are parsed into a detached [`ParsedSet`] first, because
//! `paramset_defs` entries never enter the arena themselves; only the sets
//! built from them do.

use roxmltree::Node;

use super::parameter::parse_parameter;
use super::{elements, Scope};
use crate::bits;
use crate::description::channel::{Channel, EnforceLink, LinkRole, SysinfoCount};
use crate::description::parameter::{Parameter, NO_LIST};
use crate::description::parameter_set::{ParameterSet, ParameterSetKind};
use crate::description::{DeviceDescription, ParameterSetId};
use crate::packet::PAYLOAD_OFFSET;

/// A parameter set that is not yet owned by a description
#[derive(Debug, Clone)]
pub(crate) struct ParsedSet {
    /// `None` when the `type` attribute is missing or unknown
    pub kind: Option<ParameterSetKind>,
    /// Set attributes; `parameters` stays empty until installed
    pub set: ParameterSet,
    pub parameters: Vec<Parameter>,
}

impl ParsedSet {
    pub fn parameter_mut(&mut self, id: &str) -> Option<&mut Parameter> {
        self.parameters.iter_mut().find(|p| p.id == id)
    }

    /// Move the set and its parameters into the arena of `desc`
    pub fn install(self, desc: &mut DeviceDescription, kind: ParameterSetKind) -> ParameterSetId {
        let mut set = self.set;
        set.kind = kind;
        let handle = desc.add_parameter_set(set);
        for parameter in self.parameters {
            desc.push_parameter(handle, parameter);
        }
        handle
    }
}

/// Parse a `paramset` or `parameters` element
pub(crate) fn parse_parameter_set(node: Node, scope: &mut Scope) -> ParsedSet {
    let label = format!("paramset[{}]", node.attribute("id").unwrap_or_default());
    let mut scope = scope.child(&label);
    let mut parsed = ParsedSet { kind: None, set: ParameterSet::new(ParameterSetKind::Master), parameters: Vec::new() };
    let set = &mut parsed.set;

    for attr in node.attributes() {
        let value = attr.value();
        match attr.name() {
            "id" => set.id = value.to_string(),
            "type" => {
                parsed.kind = ParameterSetKind::parse(value);
                if parsed.kind.is_none() {
                    scope.unknown_value("type", value);
                }
            }
            "address_start" => set.address_start = bits::parse_number(value),
            "address_step" => set.address_step = bits::parse_number(value),
            "count" => set.count = bits::parse_number(value),
            "channel_offset" => set.channel_offset = bits::parse_number(value),
            "peer_address_offset" => set.peer_address_offset = bits::parse_number(value),
            "peer_channel_offset" => set.peer_channel_offset = bits::parse_number(value),
            "link" => {}
            other => scope.unknown_attribute(other),
        }
    }

    let mut enforced = Vec::new();
    for child in elements(node) {
        match child.tag_name().name() {
            "parameter" => {
                let parameter = parse_parameter(child, true, &mut scope);
                if !parameter.id.is_empty() {
                    parsed.parameters.push(parameter);
                }
            }
            "enforce" => match (child.attribute("id"), child.attribute("value")) {
                (Some(id), Some(value)) => enforced.push((id.to_string(), value.to_string())),
                _ => scope.warn("enforce needs an id and a value"),
            },
            "subset" => match child.attribute("ref") {
                Some(reference) => parsed.set.subset_reference = reference.to_string(),
                None => scope.warn("subset needs a ref"),
            },
            "default_values" => parse_default_values(child, &mut parsed.set, &mut scope),
            other => scope.unknown_element(other),
        }
    }

    for (id, value) in enforced {
        if id.is_empty() || value.is_empty() {
            continue;
        }
        match parsed.parameter_mut(&id) {
            Some(parameter) => {
                let enforced = parameter.logical.parse_text(&value);
                parameter.logical.enforce = Some(enforced);
            }
            None => scope.warn(format!("enforce names unknown parameter {}", id)),
        }
    }
    parsed
}

fn parse_default_values(node: Node, set: &mut ParameterSet, scope: &mut Scope) {
    let Some(function) = node.attribute("function") else {
        scope.warn("default_values needs a function");
        return;
    };
    if function.is_empty() {
        return;
    }
    for child in elements(node) {
        if child.tag_name().name() != "value" {
            scope.unknown_element(child.tag_name().name());
            continue;
        }
        match (child.attribute("id"), child.attribute("value")) {
            (Some(id), Some(value)) => set
                .default_values
                .entry(function.to_string())
                .or_default()
                .push((id.to_string(), value.to_string())),
            _ => scope.warn("default value needs an id and a value"),
        }
    }
}

/// Parse a `channel` or `subconfig` element and install its sets
///
/// The channel itself is returned, not installed, so the caller decides
/// which slots it occupies. A channel always leaves with a master set.
pub(crate) fn parse_channel(node: Node, desc: &mut DeviceDescription, scope: &mut Scope) -> Channel {
    let label = format!("channel[{}]", node.attribute("index").unwrap_or_default());
    let mut scope = scope.child(&label);
    let mut channel = Channel::default();

    for attr in node.attributes() {
        let value = attr.value();
        match attr.name() {
            "index" => channel.start_index = bits::parse_number(value).max(0) as u32,
            "physical_index_offset" => channel.physical_index_offset = bits::parse_number(value),
            "ui_flags" => {
                if !channel.ui_flags.set(value) {
                    scope.unknown_value("ui_flags", value);
                }
            }
            "direction" => match value {
                "sender" => channel.direction.sender = true,
                "receiver" => channel.direction.receiver = true,
                _ => scope.unknown_value("direction", value),
            },
            "class" => channel.channel_class = value.to_string(),
            "type" => channel.kind = value.to_string(),
            "hidden" => channel.hidden = value == "true",
            "autoregister" => channel.autoregister = value == "true",
            "count" => channel.count = bits::parse_number(value).max(0) as u32,
            "has_team" => channel.has_team = value == "true",
            "aes_default" => channel.aes_default |= value == "true",
            "aes_always" => {
                if value == "true" {
                    channel.aes_always = true;
                    channel.aes_default = true;
                }
            }
            "aes_cbc" => channel.aes_cbc = value == "true",
            "team_tag" => channel.team_tag = value.to_string(),
            "paired" => channel.paired = value == "true",
            "function" => channel.function = value.to_string(),
            "pair_function" => {
                let mut chars = value.chars();
                match (chars.next(), chars.next(), chars.next()) {
                    (Some(first), Some(second), None) => channel.pair_function = Some((first, second)),
                    _ => scope.warn(format!("pair_function \"{}\" is not two functions", value)),
                }
            }
            "count_from_sysinfo" => channel.count_from_sysinfo = parse_sysinfo_count(value, &mut scope),
            other => scope.unknown_attribute(other),
        }
    }

    let mut subconfig = None;
    for child in elements(node) {
        match child.tag_name().name() {
            "paramset" | "parameters" => {
                let parsed = parse_parameter_set(child, &mut scope);
                let Some(kind) = parsed.kind else {
                    continue;
                };
                if channel.parameter_sets.contains_key(&kind) {
                    scope.error(format!("second {} parameter set", kind.type_name()));
                    continue;
                }
                let handle = parsed.install(desc, kind);
                channel.parameter_sets.insert(kind, handle);
            }
            "link_roles" => {
                if channel.link_roles.is_some() {
                    scope.warn("link_roles defined more than once");
                }
                channel.link_roles = Some(parse_link_roles(child, &mut scope));
            }
            "enforce_link" => {
                for value in elements(child).filter(|n| n.tag_name().name() == "value") {
                    channel.enforce_links.push(EnforceLink {
                        id: value.attribute("id").unwrap_or_default().to_string(),
                        value: value.attribute("value").unwrap_or_default().to_string(),
                    });
                }
            }
            "special_parameter" => {
                channel.special_parameter = Some(Box::new(parse_parameter(child, true, &mut scope)));
            }
            "subconfig" => {
                let nested = parse_channel(child, desc, &mut scope);
                subconfig = Some(nested);
            }
            other => scope.unknown_element(other),
        }
    }

    if channel.parameter_set(ParameterSetKind::Master).is_none() {
        let handle = desc.add_parameter_set(ParameterSet::new(ParameterSetKind::Master));
        channel.parameter_sets.insert(ParameterSetKind::Master, handle);
    }

    if let Some(special) = channel.special_parameter.as_deref() {
        let mut masters = vec![channel.parameter_set(ParameterSetKind::Master)];
        masters.push(subconfig.as_ref().and_then(|c: &Channel| c.parameter_set(ParameterSetKind::Master)));
        for master in masters.into_iter().flatten() {
            apply_special_parameter(desc, master, special);
        }
    }
    if let Some(nested) = subconfig {
        channel.subconfig = Some(desc.add_channel(nested));
    }
    channel
}

/// Parse `index:size`; the index must be a payload position, the size at most one byte
fn parse_sysinfo_count(text: &str, scope: &mut Scope) -> Option<SysinfoCount> {
    let (index, size) = text.split_once(':').unwrap_or((text, ""));
    if index.is_empty() {
        return None;
    }
    let index = bits::parse_double(index);
    if index < PAYLOAD_OFFSET as f64 {
        scope.error(format!("count_from_sysinfo index {} is below {}", index, PAYLOAD_OFFSET));
        return None;
    }
    let mut size = if size.is_empty() { 1.0 } else { bits::parse_double(size) };
    if size > 1.0 {
        scope.error(format!("count_from_sysinfo size {} exceeds one byte", size));
        size = 1.0;
    }
    Some(SysinfoCount { index, size })
}

fn parse_link_roles(node: Node, scope: &mut Scope) -> LinkRole {
    let mut roles = LinkRole::default();
    for child in elements(node) {
        let name = child.attribute("name").map(str::to_string);
        match (child.tag_name().name(), name) {
            ("source", Some(name)) => roles.source_names.push(name),
            ("target", Some(name)) => roles.target_names.push(name),
            ("source" | "target", None) => {}
            (other, _) => scope.unknown_element(other),
        }
    }
    roles
}

/// Replace the physical part of the same-named master parameter, keeping its value id
fn apply_special_parameter(desc: &mut DeviceDescription, master: ParameterSetId, special: &Parameter) {
    let Some(handle) = desc.parameter_set(master).find(desc.parameters(), &special.id) else {
        return;
    };
    let parameter = desc.parameter_mut(handle);
    let value_id = std::mem::take(&mut parameter.physical.value_id);
    parameter.physical = special.physical.clone();
    parameter.physical.value_id = value_id;
    let list = parameter.physical.list;
    if list < NO_LIST {
        desc.parameter_set_mut(master).lists.insert(list);
    }
}
