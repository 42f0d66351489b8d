//! # Parameter Parsing
//!
//! Builds [`Parameter`]s and their logical, physical and conversion parts
//! from `parameter` elements.

use roxmltree::Node;
use std::collections::BTreeMap;

use super::{elements, parse_byte_bit, Scope};
use crate::bits;
use crate::description::conversion::{BooleanInteger, ParameterConversion, TinyFloat, ValueMap};
use crate::description::parameter::{
    AddressOperation, BooleanOperator, DescriptionField, DominoEvent, Endian, EnumOption, Interface,
    LogicalParameter, LogicalType, Parameter, PhysicalAddress, PhysicalEvent, PhysicalParameter, PhysicalType,
    NO_LIST,
};

/// Parse a `parameter` element
///
/// # Arguments
///
/// * `node` - The `parameter` element
/// * `require_id` - Report a missing `id` as an error (set members need one,
///   frame and device type templates do not)
/// * `scope` - Diagnostic sink of the enclosing element
pub(crate) fn parse_parameter(node: Node, require_id: bool, scope: &mut Scope) -> Parameter {
    let label = match node.attribute("id") {
        Some(id) => format!("parameter[{}]", id),
        None => "parameter".to_string(),
    };
    let mut scope = scope.child(&label);
    let mut parameter = Parameter::default();
    let mut omit_if = None;

    for attr in node.attributes() {
        let value = attr.value();
        match attr.name() {
            "index" => parameter.index = bits::parse_double(value),
            "size" => parameter.size = bits::parse_double(value),
            "index2" => parameter.index2 = bits::parse_double(value),
            "size2" => parameter.size2 = bits::parse_double(value),
            "index2_offset" => parameter.index2_offset = bits::parse_number(value),
            "signed" => parameter.signed = value == "true",
            "cond_op" => match BooleanOperator::parse(value.trim()) {
                Some(op) => parameter.boolean_operator = op,
                None => scope.unknown_value("cond_op", value),
            },
            "const_value" => {
                parameter.const_value = bits::parse_number(value);
                parameter.const_value_string = value.to_string();
            }
            "id" => parameter.id = value.to_string(),
            "param" => parameter.param = value.to_string(),
            "PARAM" => parameter.additional_parameter = value.to_string(),
            "control" => parameter.control = value.to_string(),
            "loopback" => parameter.loopback = value == "true",
            "hidden" => parameter.hidden = value == "true",
            "default" => {}
            "burst_suppression" => match value {
                "0" => {}
                "1" => parameter.burst_suppression = true,
                _ => scope.unknown_value("burst_suppression", value),
            },
            "type" => match physical_type(value) {
                Some(kind) => parameter.kind = kind,
                None => scope.unknown_value("type", value),
            },
            "omit_if" => omit_if = Some(bits::parse_number(value)),
            "operations" => {
                parameter.operations.read = false;
                parameter.operations.write = false;
                parameter.operations.event = false;
                for element in value.split(',').map(|e| e.trim().to_ascii_lowercase()) {
                    match element.as_str() {
                        "read" => parameter.operations.read = true,
                        "write" => parameter.operations.write = true,
                        "event" => parameter.operations.event = true,
                        _ => scope.unknown_value("operations", &element),
                    }
                }
            }
            "ui_flags" => {
                parameter.ui_flags.visible = false;
                for element in value.split(',').map(|e| e.trim().to_ascii_lowercase()) {
                    let flags = &mut parameter.ui_flags;
                    match element.as_str() {
                        "visible" => flags.visible = true,
                        "internal" => flags.internal = true,
                        "transform" => flags.transform = true,
                        "service" => flags.service = true,
                        "sticky" => flags.sticky = true,
                        "invisible" => flags.invisible = true,
                        _ => scope.unknown_value("ui_flags", &element),
                    }
                }
            }
            "mask" => parameter.mask = Some(bits::parse_number(value) as u32),
            "field" => parameter.field = value.to_string(),
            "subfield" => parameter.subfield = value.to_string(),
            other => scope.unknown_attribute(other),
        }
    }

    if let Some(omit) = omit_if {
        if parameter.kind == PhysicalType::Integer {
            parameter.omit_if = Some(omit);
        } else {
            scope.warn("omit_if is only supported for integer parameters");
        }
    }
    if require_id && parameter.id.is_empty() {
        scope.error(format!("parameter at index {} has no id", parameter.index));
    }

    for child in elements(node) {
        match child.tag_name().name() {
            "logical" => parameter.logical = parse_logical(child, &mut scope),
            "physical" => {
                parameter.physical = parse_physical(child, &mut scope);
                parameter.has_domino_events = parameter.physical.events.iter().any(|e| e.domino.is_some());
            }
            "conversion" => {
                if let Some(conversion) = parse_conversion(child, &mut scope) {
                    parameter.conversions.push(conversion);
                }
            }
            "description" => parameter.description = parse_description(child, &mut scope),
            other => scope.unknown_element(other),
        }
    }

    match parameter.logical.kind {
        LogicalType::Integer { min, .. } if min < 0 && min != i32::MIN => parameter.signed = true,
        LogicalType::Float { min, .. } if min < 0.0 => parameter.signed = true,
        _ => {}
    }
    parameter
}

fn physical_type(text: &str) -> Option<PhysicalType> {
    match text {
        "integer" => Some(PhysicalType::Integer),
        "boolean" => Some(PhysicalType::Boolean),
        "string" => Some(PhysicalType::String),
        _ => None,
    }
}

fn parse_description(node: Node, scope: &mut Scope) -> Vec<DescriptionField> {
    let mut fields = Vec::new();
    for child in elements(node) {
        if child.tag_name().name() != "field" {
            scope.unknown_element(child.tag_name().name());
            continue;
        }
        fields.push(DescriptionField {
            id: child.attribute("id").unwrap_or_default().to_string(),
            value: child.attribute("value").unwrap_or_default().to_string(),
        });
    }
    fields
}

/// Parse a `logical` element; a missing or unknown type means integer
pub(crate) fn parse_logical(node: Node, scope: &mut Scope) -> LogicalParameter {
    let mut scope = scope.child("logical");
    let type_name = node.attribute("type").unwrap_or("integer");
    let mut logical = LogicalParameter::default();

    logical.kind = match type_name {
        "option" => parse_enum(node, &mut logical, &mut scope),
        "integer" => parse_integer(node, &mut logical, &mut scope),
        "float" => parse_float(node, &mut logical, &mut scope),
        "boolean" | "string" | "action" => parse_simple(type_name, node, &mut logical, &mut scope),
        other => {
            scope.unknown_value("type", other);
            parse_integer(node, &mut logical, &mut scope)
        }
    };
    logical
}

fn parse_enum(node: Node, logical: &mut LogicalParameter, scope: &mut Scope) -> LogicalType {
    for attr in node.attributes() {
        match attr.name() {
            "type" => {}
            "unit" => logical.unit = attr.value().to_string(),
            other => scope.unknown_attribute(other),
        }
    }

    let mut options: Vec<EnumOption> = Vec::new();
    let mut default = None;
    let mut index = 0;
    for child in elements(node) {
        if child.tag_name().name() != "option" {
            scope.unknown_element(child.tag_name().name());
            continue;
        }
        let explicit = child.attribute("index").map(bits::parse_number).filter(|i| *i > -1);
        if let Some(explicit) = explicit {
            // Gaps become placeholder options without an id
            while (options.len() as i32) < explicit {
                let position = options.len() as i32;
                options.push(EnumOption { id: String::new(), default: false, index: position });
            }
            index = explicit;
        }
        let is_default = child.attribute("default") == Some("true");
        options.push(EnumOption {
            id: child.attribute("id").unwrap_or_default().to_string(),
            default: is_default,
            index,
        });
        if is_default {
            default = Some(index);
        }
        index += 1;
    }
    LogicalType::Enum { options, min: 0, max: index - 1, default }
}

fn parse_integer(node: Node, logical: &mut LogicalParameter, scope: &mut Scope) -> LogicalType {
    let (mut min, mut max, mut default) = (i32::MIN, i32::MAX, None);
    for attr in node.attributes() {
        let value = attr.value();
        match attr.name() {
            "type" => {}
            "min" => min = bits::parse_number(value),
            "max" => max = bits::parse_number(value),
            "default" => default = Some(bits::parse_number(value)),
            "unit" => logical.unit = value.to_string(),
            other => scope.unknown_attribute(other),
        }
    }
    let special_values = special_values(node, scope, bits::parse_number);
    LogicalType::Integer { min, max, default, special_values }
}

fn parse_float(node: Node, logical: &mut LogicalParameter, scope: &mut Scope) -> LogicalType {
    let (mut min, mut max, mut default) = (f32::MIN_POSITIVE as f64, f32::MAX as f64, None);
    for attr in node.attributes() {
        let value = attr.value();
        match attr.name() {
            "type" => {}
            "min" => min = bits::parse_double(value),
            "max" => max = bits::parse_double(value),
            "default" => default = Some(bits::parse_double(value)),
            "unit" => logical.unit = value.to_string(),
            other => scope.unknown_attribute(other),
        }
    }
    let special_values = special_values(node, scope, bits::parse_double);
    LogicalType::Float { min, max, default, special_values }
}

fn special_values<T>(node: Node, scope: &mut Scope, parse: fn(&str) -> T) -> BTreeMap<String, T> {
    let mut values = BTreeMap::new();
    for child in elements(node) {
        if child.tag_name().name() != "special_value" {
            scope.unknown_element(child.tag_name().name());
            continue;
        }
        match (child.attribute("id"), child.attribute("value")) {
            (Some(id), Some(value)) => {
                values.insert(id.to_string(), parse(value));
            }
            _ => scope.warn("special_value needs an id and a value"),
        }
    }
    values
}

fn parse_simple(type_name: &str, node: Node, logical: &mut LogicalParameter, scope: &mut Scope) -> LogicalType {
    let mut default = None;
    let mut use_default_on_failure = false;
    for attr in node.attributes() {
        let value = attr.value();
        match (type_name, attr.name()) {
            (_, "type") => {}
            ("boolean" | "string", "unit") => logical.unit = value.to_string(),
            ("boolean" | "string", "default") => default = Some(value.to_string()),
            ("string", "use_default_on_failure") => use_default_on_failure = value == "true",
            (_, other) => scope.unknown_attribute(other),
        }
    }
    match type_name {
        "boolean" => LogicalType::Boolean { default: default.map(|d| d == "true") },
        "string" => LogicalType::String { default, use_default_on_failure },
        _ => LogicalType::Action,
    }
}

/// Parse a `physical` element
pub(crate) fn parse_physical(node: Node, scope: &mut Scope) -> PhysicalParameter {
    let mut scope = scope.child("physical");
    let mut physical = PhysicalParameter::default();

    for attr in node.attributes() {
        let value = attr.value();
        match attr.name() {
            "type" => match physical_type(value) {
                Some(kind) => physical.kind = kind,
                None => scope.unknown_value("type", value),
            },
            "interface" => match interface(value) {
                Some(i) => physical.interface = i,
                None => scope.unknown_value("interface", value),
            },
            "endian" => match value {
                "little" => physical.endian = Endian::Little,
                "big" => physical.endian = Endian::Big,
                _ => scope.unknown_value("endian", value),
            },
            "value_id" => physical.value_id = value.to_string(),
            "no_init" => physical.no_init = value == "true",
            "list" => physical.list = u32::try_from(bits::parse_number(value)).unwrap_or(NO_LIST),
            "index" => physical.index = parse_byte_bit(value),
            "size" => {
                physical.size = parse_byte_bit(value);
                physical.size_defined = true;
            }
            "read_size" => physical.read_size = bits::parse_number(value),
            "counter" => physical.counter = value.to_string(),
            "volatile" => physical.is_volatile = value == "true",
            "id" => physical.id = value.to_string(),
            "save_on_change" => {}
            "mask" => physical.mask = Some(bits::parse_number(value) as u32),
            other => scope.unknown_attribute(other),
        }
    }

    if physical.mask.is_some() && physical.index.fract() != 0.0 {
        scope.warn("mask combined with an unaligned index is not supported");
    }
    if !bits::is_valid_bit_size(physical.size) {
        scope.warn(format!("size {} has a bit component of 8 or more", physical.size));
    }

    for child in elements(node) {
        match child.tag_name().name() {
            "set" => {
                if let Some(request) = child.attribute("request") {
                    physical.set_request = request.to_string();
                }
            }
            "get" => {
                if let Some(request) = child.attribute("request") {
                    physical.get_request = request.to_string();
                }
                if let Some(response) = child.attribute("response") {
                    physical.get_response = response.to_string();
                }
            }
            "event" => {
                if let Some(event) = parse_event(child, physical.kind, &mut scope) {
                    physical.events.push(event);
                }
            }
            "setEx" => {}
            "address" => {
                let address = parse_address(child, &mut scope);
                physical.index = address.index;
                physical.address = Some(address);
            }
            "reset_after_send" => {
                if let Some(param) = child.attribute("param") {
                    physical.reset_after_send.push(param.to_string());
                }
            }
            other => scope.unknown_element(other),
        }
    }

    physical.update_range();
    physical
}

fn interface(text: &str) -> Option<Interface> {
    match text {
        "command" => Some(Interface::Command),
        "central_command" => Some(Interface::CentralCommand),
        "internal" => Some(Interface::Internal),
        "config" => Some(Interface::Config),
        "config_string" => Some(Interface::ConfigString),
        "store" => Some(Interface::Store),
        "eeprom" => Some(Interface::Eeprom),
        _ => None,
    }
}

fn parse_event(node: Node, kind: PhysicalType, scope: &mut Scope) -> Option<PhysicalEvent> {
    let frame = node.attribute("frame")?.to_string();
    let mut event = PhysicalEvent { frame, domino: None };
    for child in elements(node) {
        if child.tag_name().name() != "domino_event" {
            scope.unknown_element(child.tag_name().name());
            continue;
        }
        if kind != PhysicalType::Integer {
            scope.warn("domino_event is only supported for integer physical types");
            continue;
        }
        if let (Some(value), Some(delay_id)) = (child.attribute("value"), child.attribute("delay_id")) {
            event.domino = Some(DominoEvent { value: bits::parse_number(value), delay_id: delay_id.to_string() });
        }
    }
    Some(event)
}

fn parse_address(node: Node, scope: &mut Scope) -> PhysicalAddress {
    let mut address = PhysicalAddress::default();
    for attr in node.attributes() {
        let value = attr.value();
        match attr.name() {
            "index" => {
                let text = if let Some(rest) = value.strip_prefix('+') {
                    address.operation = AddressOperation::Addition;
                    rest
                } else if let Some(rest) = value.strip_prefix('-') {
                    address.operation = AddressOperation::Subtraction;
                    rest
                } else {
                    value
                };
                address.index = parse_byte_bit(text);
                // x.8 and x.9 carry into the next byte
                if bits::bit_index(address.index) >= 8 {
                    address.index += 0.2;
                }
            }
            "step" => address.step = bits::parse_double(value),
            other => scope.unknown_attribute(other),
        }
    }
    address
}

/// Conversion types that are accepted but need no work
const IGNORED_CONVERSIONS: [&str; 3] = ["action_key_counter", "action_key_same_counter", "rc19display"];

/// Parse a `conversion` element
///
/// # Returns
///
/// * `Option<ParameterConversion>` - The step, or `None` for ignored and
///   unknown types
pub(crate) fn parse_conversion(node: Node, scope: &mut Scope) -> Option<ParameterConversion> {
    let type_name = node.attribute("type").unwrap_or_default();
    let mut scope = scope.child(&format!("conversion[{}]", type_name));

    let mut factor = 0.0;
    let mut factors = Vec::new();
    let mut value_size = 0.0;
    let mut boolean = BooleanInteger::default();
    let (mut div, mut mul) = (0, 0);
    let mut offset = 0.0;
    let mut constant = String::new();
    let mut tiny = TinyFloat::default();
    let (mut on, mut off) = (200, 0);

    for attr in node.attributes() {
        let value = attr.value();
        match attr.name() {
            "type" | "sim_counter" | "counter_size" => {}
            "factor" => factor = bits::parse_double(value),
            "factors" => factors = value.split(',').map(bits::parse_double).collect(),
            "value_size" => value_size = bits::parse_double(value),
            "threshold" => boolean.threshold = bits::parse_number(value),
            "false" => boolean.value_false = bits::parse_number(value),
            "true" => boolean.value_true = bits::parse_number(value),
            "div" => div = bits::parse_number(value),
            "mul" => mul = bits::parse_number(value),
            "offset" => offset = bits::parse_double(value),
            "value" => constant = value.to_string(),
            "mantissa_start" => tiny.mantissa_start = bits::parse_number(value).max(0) as u32,
            "mantissa_size" => tiny.mantissa_size = bits::parse_number(value).max(0) as u32,
            "exponent_start" => tiny.exponent_start = bits::parse_number(value).max(0) as u32,
            "exponent_size" => tiny.exponent_size = bits::parse_number(value).max(0) as u32,
            "on" => on = bits::parse_number(value),
            "off" => off = bits::parse_number(value),
            "invert" => boolean.invert = value == "true",
            other => scope.unknown_attribute(other),
        }
    }

    let mapped = matches!(type_name, "integer_integer_map" | "option_integer");
    let mut map = ValueMap::default();
    for child in elements(node) {
        if mapped && child.tag_name().name() == "value_map" {
            parse_value_map(child, &mut map, &mut scope);
        } else {
            scope.unknown_element(child.tag_name().name());
        }
    }

    let conversion = match type_name {
        "float_integer_scale" => ParameterConversion::FloatIntegerScale { factor, offset },
        "integer_integer_scale" => ParameterConversion::IntegerIntegerScale { div, mul },
        "integer_integer_map" => ParameterConversion::IntegerIntegerMap(map),
        "option_integer" => ParameterConversion::OptionInteger(map),
        "boolean_integer" => ParameterConversion::BooleanInteger(boolean),
        "float_configtime" => ParameterConversion::FloatConfigTime { factors, value_size },
        "integer_tinyfloat" => ParameterConversion::IntegerTinyFloat(tiny),
        "toggle" => ParameterConversion::Toggle { on, off },
        "string_unsigned_integer" => ParameterConversion::StringUnsignedInteger,
        "blind_test" => ParameterConversion::BlindTest { value: bits::parse_number(&constant) },
        "cfm" => ParameterConversion::Cfm,
        "ccrtdn_party" => ParameterConversion::CcrtdnParty,
        "rpc_binary" => ParameterConversion::RpcBinary,
        "option_string" => ParameterConversion::OptionString,
        "string_json_array_float" => ParameterConversion::StringJsonArrayFloat,
        "hexstring_bytearray" => ParameterConversion::HexstringBytearray,
        ignored if IGNORED_CONVERSIONS.contains(&ignored) => return None,
        other => {
            scope.unknown_value("type", other);
            return None;
        }
    };
    Some(conversion)
}

fn parse_value_map(node: Node, map: &mut ValueMap, scope: &mut Scope) {
    let (mut device_value, mut parameter_value) = (0, 0);
    for attr in node.attributes() {
        let value = attr.value();
        match attr.name() {
            "device_value" => device_value = bits::parse_number(value),
            "parameter_value" => parameter_value = bits::parse_number(value),
            "from_device" => {
                if value == "false" {
                    map.from_device = false;
                }
            }
            "to_device" => {
                if value == "false" {
                    map.to_device = false;
                }
            }
            "mask" => {}
            other => scope.unknown_attribute(other),
        }
    }
    map.insert(device_value, parameter_value);
}
