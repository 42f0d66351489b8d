//! # Frame, Type and Program Parsing

use roxmltree::Node;

use super::parameter::parse_parameter;
use super::{elements, Scope};
use crate::bits;
use crate::description::device::{RunProgram, StartType};
use crate::description::device_type::DeviceType;
use crate::description::frame::{DeviceFrame, FrameDirection, ANY_CHANNEL};
use crate::description::parameter::BooleanOperator;

/// Split an `index:size` pair; the size is `None` when absent
fn field_position(text: &str) -> (i32, Option<f64>) {
    match text.split_once(':') {
        Some((index, size)) if !size.is_empty() => (bits::parse_number(index), Some(bits::parse_double(size))),
        Some((index, _)) => (bits::parse_number(index), None),
        None => (bits::parse_number(text), None),
    }
}

/// Parse a `frame` or `packet` element
pub(crate) fn parse_frame(node: Node, scope: &mut Scope) -> DeviceFrame {
    let label = format!("frame[{}]", node.attribute("id").unwrap_or_default());
    let mut scope = scope.child(&label);
    let mut frame = DeviceFrame::default();

    for attr in node.attributes() {
        let value = attr.value();
        match attr.name() {
            "direction" => match value {
                "from_device" => frame.direction = FrameDirection::FromDevice,
                "to_device" => frame.direction = FrameDirection::ToDevice,
                _ => scope.unknown_value("direction", value),
            },
            "allowed_receivers" => {
                for element in value.split(',').map(|e| e.trim().to_ascii_lowercase()) {
                    let receivers = &mut frame.allowed_receivers;
                    match element.as_str() {
                        "broadcast" => receivers.broadcast = true,
                        "central" => receivers.central = true,
                        "other" => receivers.other = true,
                        _ => scope.unknown_value("allowed_receivers", &element),
                    }
                }
            }
            "id" => frame.id = value.to_string(),
            "event" => frame.is_event = value == "true",
            "type" => {
                // "#A" names the message type by its character
                let mut chars = value.chars();
                frame.kind = match (chars.next(), chars.next(), chars.next()) {
                    (Some('#'), Some(c), None) => c as u32,
                    _ => bits::parse_number(value) as u32,
                };
            }
            "subtype" => frame.subtype = bits::parse_number(value),
            "subtype_index" => {
                let (index, size) = field_position(value);
                frame.subtype_index = index;
                if let Some(size) = size {
                    frame.subtype_field_size = size;
                }
            }
            "response_type" => frame.response_type = bits::parse_number(value),
            "response_subtype" => frame.response_subtype = bits::parse_number(value),
            // receiver_channel_field wins over channel_field when both are present
            "channel_field" if frame.channel_field != -1 => {}
            "channel_field" | "receiver_channel_field" => {
                let (index, size) = field_position(value);
                frame.channel_field = index;
                if let Some(size) = size {
                    frame.channel_field_size = size;
                }
            }
            "fixed_channel" => {
                frame.fixed_channel = if value == "*" { ANY_CHANNEL } else { bits::parse_number(value) };
            }
            "size" => frame.size = bits::parse_number(value),
            "double_send" => frame.double_send = value == "true",
            "max_packets" => frame.max_packets = bits::parse_number(value),
            "split_after" => frame.split_after = bits::parse_number(value),
            other => scope.unknown_attribute(other),
        }
    }

    for child in elements(node) {
        if child.tag_name().name() == "parameter" {
            frame.parameters.push(parse_parameter(child, false, &mut scope));
        } else {
            scope.unknown_element(child.tag_name().name());
        }
    }
    frame
}

/// Parse a `type` element of `supported_types`
pub(crate) fn parse_device_type(node: Node, scope: &mut Scope) -> DeviceType {
    let label = format!("type[{}]", node.attribute("id").unwrap_or_default());
    let mut scope = scope.child(&label);
    let mut device_type = DeviceType::default();

    for attr in node.attributes() {
        let value = attr.value();
        match attr.name() {
            "name" => device_type.name = value.to_string(),
            "id" => device_type.id = value.to_string(),
            "priority" => device_type.priority = bits::parse_number(value),
            "updatable" => device_type.updatable = value == "true",
            other => scope.unknown_attribute(other),
        }
    }

    for child in elements(node) {
        match child.tag_name().name() {
            "parameter" => device_type.parameters.push(parse_parameter(child, false, &mut scope)),
            "type_id" => {
                let text = child.text().unwrap_or_default().trim();
                if !text.is_empty() {
                    device_type.type_id = Some(bits::parse_number(text));
                }
            }
            "firmware" => {
                for attr in child.attributes() {
                    match attr.name() {
                        "cond_op" => match BooleanOperator::parse(attr.value().trim()) {
                            Some(op) => device_type.firmware_operator = op,
                            None => scope.unknown_value("cond_op", attr.value()),
                        },
                        other => scope.unknown_attribute(other),
                    }
                }
                let text = child.text().unwrap_or_default().trim();
                if !text.is_empty() {
                    device_type.firmware = Some(bits::parse_number(text));
                }
            }
            other => scope.unknown_element(other),
        }
    }
    device_type
}

/// Parse a `run_program` element
pub(crate) fn parse_run_program(node: Node, scope: &mut Scope) -> RunProgram {
    let mut scope = scope.child("run_program");
    let mut program = RunProgram::default();
    for attr in node.attributes() {
        scope.unknown_attribute(attr.name());
    }

    for child in elements(node) {
        let text = child.text().unwrap_or_default().trim();
        match child.tag_name().name() {
            "path" => program.path = text.to_string(),
            "arguments" => {
                for argument in elements(child) {
                    if argument.tag_name().name() == "argument" {
                        program.arguments.push(argument.text().unwrap_or_default().to_string());
                    } else {
                        scope.unknown_element(argument.tag_name().name());
                    }
                }
            }
            "start_type" => match text.to_ascii_lowercase().as_str() {
                "once" => program.start_type = StartType::Once,
                "interval" => program.start_type = StartType::Interval,
                "permanent" => program.start_type = StartType::Permanent,
                _ => scope.unknown_value("start_type", text),
            },
            "interval" => program.interval = text.parse().unwrap_or(0),
            other => scope.unknown_element(other),
        }
    }
    program
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;

    fn parse<T>(xml: &str, f: impl FnOnce(Node, &mut Scope) -> T) -> (T, Diagnostics) {
        let doc = roxmltree::Document::parse(xml).unwrap();
        let mut diagnostics = Diagnostics::new();
        let value = f(doc.root_element(), &mut Scope::new("test", &mut diagnostics));
        (value, diagnostics)
    }

    #[test]
    fn test_frame_attributes() {
        let xml = r##"
            <frame id="INFO_LEVEL" direction="from_device" allowed_receivers="central,broadcast" event="true"
                   type="0x10" subtype="6" subtype_index="9:0.5" channel_field="10" fixed_channel="*" double_send="true">
                <parameter type="integer" index="11.0" size="1.0" param="LEVEL"/>
            </frame>"##;
        let (frame, diagnostics) = parse(xml, parse_frame);
        assert!(diagnostics.is_empty());
        assert_eq!(frame.id, "INFO_LEVEL");
        assert_eq!(frame.direction, FrameDirection::FromDevice);
        assert!(frame.allowed_receivers.central && frame.allowed_receivers.broadcast);
        assert!(frame.is_event && frame.double_send);
        assert_eq!((frame.kind, frame.subtype, frame.subtype_index), (0x10, 6, 9));
        assert_eq!(frame.subtype_field_size, 0.5);
        assert_eq!(frame.channel_field, 10);
        assert_eq!(frame.fixed_channel, ANY_CHANNEL);
        assert_eq!(frame.parameters.len(), 1);
        assert_eq!(frame.parameters[0].param, "LEVEL");
    }

    #[test]
    fn test_character_message_type() {
        let (frame, _) = parse(r##"<frame id="X" type="#A"/>"##, parse_frame);
        assert_eq!(frame.kind, 'A' as u32);
    }

    #[test]
    fn test_receiver_channel_field_not_overridden() {
        let (frame, _) = parse(r#"<frame receiver_channel_field="12:0.4" channel_field="10"/>"#, parse_frame);
        assert_eq!(frame.channel_field, 12);
        assert_eq!(frame.channel_field_size, 0.4);
        let (frame, _) = parse(r#"<frame channel_field="10" receiver_channel_field="12"/>"#, parse_frame);
        assert_eq!(frame.channel_field, 12);
    }

    #[test]
    fn test_device_type() {
        let xml = r#"
            <type name="Switch actuator" id="HM-LC-Sw1-Pl" priority="2" updatable="true">
                <parameter index="10.0" size="2.0" const_value="0x0011"/>
                <type_id>0x0011</type_id>
                <firmware cond_op="GE">0x18</firmware>
            </type>"#;
        let (ty, diagnostics) = parse(xml, parse_device_type);
        assert!(diagnostics.is_empty());
        assert_eq!(ty.id, "HM-LC-Sw1-Pl");
        assert!(ty.updatable);
        assert_eq!(ty.priority, 2);
        assert_eq!(ty.type_id, Some(0x11));
        assert_eq!(ty.firmware, Some(0x18));
        assert_eq!(ty.firmware_operator, BooleanOperator::GreaterOrEqual);
        assert_eq!(ty.parameters[0].const_value, 0x11);
        assert!(ty.matches_type(0x11, 0x20));
    }

    #[test]
    fn test_run_program() {
        let xml = r#"
            <run_program>
                <path>/usr/bin/script.sh</path>
                <arguments><argument>--verbose</argument><argument>$PEERID</argument></arguments>
                <start_type>Interval</start_type>
                <interval>60</interval>
            </run_program>"#;
        let (program, diagnostics) = parse(xml, parse_run_program);
        assert!(diagnostics.is_empty());
        assert_eq!(program.path, "/usr/bin/script.sh");
        assert_eq!(program.arguments, vec!["--verbose".to_string(), "$PEERID".to_string()]);
        assert_eq!(program.start_type, StartType::Interval);
        assert_eq!(program.interval, 60);
    }
}
