//! # Parameter
//!
//! A named field of a parameter set or frame. The logical side says what the
//! value means, the physical side says where it lives on the wire, and the
//! conversion chain translates between the two.

use std::collections::BTreeMap;

use super::conversion::ParameterConversion;
use super::ParameterSetId;
use crate::bits;
use crate::value::Value;

/// Comparison used by constant-valued parameters and firmware checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BooleanOperator {
    #[default]
    Equal,
    Greater,
    Less,
    GreaterOrEqual,
    LessOrEqual,
}

impl BooleanOperator {
    /// Parse a `cond_op` attribute value
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_lowercase().as_str() {
            "e" | "eq" => Some(Self::Equal),
            "g" => Some(Self::Greater),
            "l" => Some(Self::Less),
            "ge" => Some(Self::GreaterOrEqual),
            "le" => Some(Self::LessOrEqual),
            _ => None,
        }
    }

    /// Evaluate `lhs op rhs`
    pub fn evaluate(self, lhs: i32, rhs: i32) -> bool {
        match self {
            Self::Equal => lhs == rhs,
            Self::Greater => lhs > rhs,
            Self::Less => lhs < rhs,
            Self::GreaterOrEqual => lhs >= rhs,
            Self::LessOrEqual => lhs <= rhs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operations {
    pub read: bool,
    pub write: bool,
    pub event: bool,
}

impl Default for Operations {
    fn default() -> Self {
        Self { read: true, write: true, event: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterUiFlags {
    pub visible: bool,
    pub internal: bool,
    pub transform: bool,
    pub service: bool,
    pub sticky: bool,
    pub invisible: bool,
}

impl Default for ParameterUiFlags {
    fn default() -> Self {
        Self {
            visible: true,
            internal: false,
            transform: false,
            service: false,
            sticky: false,
            invisible: false,
        }
    }
}

/// Wire type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhysicalType {
    #[default]
    None,
    Integer,
    Boolean,
    String,
}

/// Which device mechanism carries the value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interface {
    #[default]
    None,
    Command,
    CentralCommand,
    Internal,
    Config,
    ConfigString,
    Store,
    Eeprom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Big,
    Little,
}

/// Event emitted by another parameter after this one changed
#[derive(Debug, Clone, PartialEq)]
pub struct DominoEvent {
    pub value: i32,
    pub delay_id: String,
}

/// A frame that carries this parameter as an event
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalEvent {
    pub frame: String,
    pub domino: Option<DominoEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressOperation {
    #[default]
    None,
    Addition,
    Subtraction,
}

/// Address arithmetic for parameters stored at computed positions
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PhysicalAddress {
    pub index: f64,
    pub step: f64,
    pub operation: AddressOperation,
}

/// Wire-facing descriptor of a parameter
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalParameter {
    pub kind: PhysicalType,
    pub interface: Interface,
    pub endian: Endian,
    pub value_id: String,
    pub id: String,
    pub list: u32,
    pub index: f64,
    pub size: f64,
    pub size_defined: bool,
    pub start_index: u32,
    pub end_index: u32,
    pub mask: Option<u32>,
    pub no_init: bool,
    pub read_size: i32,
    pub counter: String,
    pub is_volatile: bool,
    pub get_request: String,
    pub get_response: String,
    pub set_request: String,
    pub events: Vec<PhysicalEvent>,
    pub reset_after_send: Vec<String>,
    pub address: Option<PhysicalAddress>,
}

/// List number used when a physical parameter names no list
pub const NO_LIST: u32 = 9999;

impl Default for PhysicalParameter {
    fn default() -> Self {
        Self {
            kind: PhysicalType::None,
            interface: Interface::None,
            endian: Endian::Big,
            value_id: String::new(),
            id: String::new(),
            list: NO_LIST,
            index: 0.0,
            size: 0.0,
            size_defined: false,
            start_index: 0,
            end_index: 0,
            mask: None,
            no_init: false,
            read_size: 0,
            counter: String::new(),
            is_volatile: false,
            get_request: String::new(),
            get_response: String::new(),
            set_request: String::new(),
            events: Vec::new(),
            reset_after_send: Vec::new(),
            address: None,
        }
    }
}

impl PhysicalParameter {
    /// Recompute the byte range covered by `index` and `size`
    pub fn update_range(&mut self) {
        self.start_index = bits::byte_index(self.index) as u32;
        let extra = bits::byte_size(self.size).saturating_sub(1) as u32;
        self.end_index = self.start_index + extra;
    }
}

/// One option of an enum parameter
#[derive(Debug, Clone, PartialEq)]
pub struct EnumOption {
    pub id: String,
    pub default: bool,
    pub index: i32,
}

/// Semantic type with its range and defaults
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalType {
    Integer {
        min: i32,
        max: i32,
        default: Option<i32>,
        special_values: BTreeMap<String, i32>,
    },
    Float {
        min: f64,
        max: f64,
        default: Option<f64>,
        special_values: BTreeMap<String, f64>,
    },
    Boolean {
        default: Option<bool>,
    },
    String {
        default: Option<String>,
        use_default_on_failure: bool,
    },
    Enum {
        options: Vec<EnumOption>,
        min: i32,
        max: i32,
        default: Option<i32>,
    },
    Action,
}

impl LogicalType {
    pub fn integer() -> Self {
        LogicalType::Integer {
            min: i32::MIN,
            max: i32::MAX,
            default: None,
            special_values: BTreeMap::new(),
        }
    }

    /// Unbounded float; the lower bound is the smallest positive `f32`
    pub fn float() -> Self {
        LogicalType::Float {
            min: f32::MIN_POSITIVE as f64,
            max: f32::MAX as f64,
            default: None,
            special_values: BTreeMap::new(),
        }
    }
}

/// Semantic-facing descriptor of a parameter
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalParameter {
    pub kind: LogicalType,
    pub unit: String,
    /// Value forced onto the device, set through a parameter set `enforce` node
    pub enforce: Option<Value>,
}

impl Default for LogicalParameter {
    fn default() -> Self {
        Self { kind: LogicalType::integer(), unit: String::new(), enforce: None }
    }
}

impl LogicalParameter {
    pub fn new(kind: LogicalType) -> Self {
        Self { kind, ..Default::default() }
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            LogicalType::Integer { .. } => "integer",
            LogicalType::Float { .. } => "float",
            LogicalType::Boolean { .. } => "boolean",
            LogicalType::String { .. } => "string",
            LogicalType::Enum { .. } => "option",
            LogicalType::Action => "action",
        }
    }

    /// Fallback value used when a conversion cannot produce anything
    pub fn zero_value(&self) -> Value {
        match self.kind {
            LogicalType::Integer { .. } | LogicalType::Enum { .. } => Value::Integer(0),
            LogicalType::Float { .. } => Value::Float(0.0),
            LogicalType::Boolean { .. } | LogicalType::Action => Value::Boolean(false),
            LogicalType::String { .. } => Value::String(String::new()),
        }
    }

    /// Declared default, or the zero value if none was declared
    pub fn default_value(&self) -> Value {
        match &self.kind {
            LogicalType::Integer { default: Some(d), .. } | LogicalType::Enum { default: Some(d), .. } => {
                Value::Integer(*d)
            }
            LogicalType::Float { default: Some(d), .. } => Value::Float(*d),
            LogicalType::Boolean { default: Some(d) } => Value::Boolean(*d),
            LogicalType::String { default: Some(d), .. } => Value::String(d.clone()),
            _ => self.zero_value(),
        }
    }

    /// Index of the enum option called `id`
    pub fn option_index(&self, id: &str) -> Option<i32> {
        match &self.kind {
            LogicalType::Enum { options, .. } => options.iter().find(|o| o.id == id).map(|o| o.index),
            _ => None,
        }
    }

    /// Id of the enum option at `index`
    pub fn option_id(&self, index: i32) -> Option<&str> {
        match &self.kind {
            LogicalType::Enum { options, .. } => options
                .iter()
                .find(|o| o.index == index && !o.id.is_empty())
                .map(|o| o.id.as_str()),
            _ => None,
        }
    }

    /// Parse text into a value of this type
    ///
    /// Unparseable numbers become zero, enum text may be a number or an
    /// option id.
    pub fn parse_text(&self, text: &str) -> Value {
        match &self.kind {
            LogicalType::Integer { .. } => Value::Integer(bits::parse_number(text)),
            LogicalType::Enum { .. } => match bits::try_parse_number(text) {
                Some(n) => Value::Integer(n),
                None => Value::Integer(self.option_index(text).unwrap_or(0)),
            },
            LogicalType::Boolean { .. } | LogicalType::Action => {
                Value::Boolean(text.trim().eq_ignore_ascii_case("true"))
            }
            LogicalType::Float { .. } => Value::Float(bits::parse_double(text)),
            LogicalType::String { .. } => Value::String(text.to_string()),
        }
    }

    /// Clamp numbers into `[min, max]`
    ///
    /// The declared default and named special values pass unchanged.
    /// Returns the value and whether it was changed.
    pub fn clamp(&self, value: Value) -> (Value, bool) {
        match &self.kind {
            LogicalType::Integer { min, max, default, special_values } => {
                let v = value.as_i32();
                if Some(v) == *default || special_values.values().any(|s| *s == v) {
                    return (Value::Integer(v), false);
                }
                let clamped = v.clamp(*min, (*max).max(*min));
                (Value::Integer(clamped), clamped != v)
            }
            LogicalType::Float { min, max, default, special_values } => {
                let v = value.as_f64();
                if Some(v) == *default || special_values.values().any(|s| *s == v) {
                    return (Value::Float(v), false);
                }
                let clamped = v.clamp(*min, max.max(*min));
                (Value::Float(clamped), clamped != v)
            }
            LogicalType::Enum { min, max, .. } => {
                let v = value.as_i32();
                let clamped = v.clamp(*min, (*max).max(*min));
                (Value::Integer(clamped), clamped != v)
            }
            _ => (value, false),
        }
    }
}

/// Free-form description attached to a parameter
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptionField {
    pub id: String,
    pub value: String,
}

/// A named, addressable field
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub id: String,
    /// Owning parameter set, `None` for frame and device type templates
    pub parent: Option<ParameterSetId>,
    pub index: f64,
    pub size: f64,
    pub index2: f64,
    pub size2: f64,
    pub index2_offset: i32,
    pub signed: bool,
    pub hidden: bool,
    pub boolean_operator: BooleanOperator,
    pub operations: Operations,
    pub ui_flags: ParameterUiFlags,
    /// Wire type of frame template parameters
    pub kind: PhysicalType,
    pub const_value: i32,
    pub const_value_string: String,
    pub param: String,
    pub additional_parameter: String,
    pub control: String,
    pub logical: LogicalParameter,
    pub physical: PhysicalParameter,
    pub conversions: Vec<ParameterConversion>,
    pub description: Vec<DescriptionField>,
    pub omit_if: Option<i32>,
    pub loopback: bool,
    pub burst_suppression: bool,
    pub has_domino_events: bool,
    pub mask: Option<u32>,
    pub field: String,
    pub subfield: String,
}

impl Default for Parameter {
    fn default() -> Self {
        Self {
            id: String::new(),
            parent: None,
            index: 0.0,
            size: 0.0,
            index2: 0.0,
            size2: 0.0,
            index2_offset: -1,
            signed: false,
            hidden: false,
            boolean_operator: BooleanOperator::Equal,
            operations: Operations::default(),
            ui_flags: ParameterUiFlags::default(),
            kind: PhysicalType::None,
            const_value: -1,
            const_value_string: String::new(),
            param: String::new(),
            additional_parameter: String::new(),
            control: String::new(),
            logical: LogicalParameter::default(),
            physical: PhysicalParameter::default(),
            conversions: Vec::new(),
            description: Vec::new(),
            omit_if: None,
            loopback: false,
            burst_suppression: false,
            has_domino_events: false,
            mask: None,
            field: String::new(),
            subfield: String::new(),
        }
    }
}

impl Parameter {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), ..Default::default() }
    }

    /// Compare `value` against the constant with the declared operator
    pub fn check_condition(&self, value: i32) -> bool {
        self.boolean_operator.evaluate(value, self.const_value)
    }

    /// `true` if a frame parameter with this id or alias feeds `name`
    pub fn refers_to(&self, name: &str) -> bool {
        self.param == name || self.additional_parameter == name
    }

    /// Take sign and width from an event frame field carrying this parameter
    pub fn adopt_frame_field(&mut self, signed: bool, size: f64) {
        if signed {
            self.signed = true;
        }
        if size > 0.0 {
            self.physical.size = size;
            self.physical.size_defined = true;
            self.physical.update_range();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_operator() {
        assert_eq!(BooleanOperator::parse("ge"), Some(BooleanOperator::GreaterOrEqual));
        assert_eq!(BooleanOperator::parse("EQ"), Some(BooleanOperator::Equal));
        assert_eq!(BooleanOperator::parse("ne"), None);
        assert!(BooleanOperator::Less.evaluate(1, 2));
        assert!(!BooleanOperator::Greater.evaluate(2, 2));
    }

    #[test]
    fn test_check_condition() {
        let mut param = Parameter::new("FIRMWARE");
        param.const_value = 0x18;
        param.boolean_operator = BooleanOperator::GreaterOrEqual;
        assert!(param.check_condition(0x20));
        assert!(!param.check_condition(0x10));
    }

    #[test]
    fn test_clamp_respects_default_and_special_values() {
        let mut specials = BTreeMap::new();
        specials.insert("NOT_USED".to_string(), 255);
        let logical = LogicalParameter::new(LogicalType::Integer {
            min: 0,
            max: 100,
            default: Some(-1),
            special_values: specials,
        });
        assert_eq!(logical.clamp(Value::Integer(150)), (Value::Integer(100), true));
        assert_eq!(logical.clamp(Value::Integer(255)), (Value::Integer(255), false));
        assert_eq!(logical.clamp(Value::Integer(-1)), (Value::Integer(-1), false));
        assert_eq!(logical.clamp(Value::Integer(-5)), (Value::Integer(0), true));
    }

    #[test]
    fn test_parse_text_for_enum() {
        let logical = LogicalParameter::new(LogicalType::Enum {
            options: vec![
                EnumOption { id: "OFF".into(), default: true, index: 0 },
                EnumOption { id: "ON".into(), default: false, index: 1 },
            ],
            min: 0,
            max: 1,
            default: Some(0),
        });
        assert_eq!(logical.parse_text("ON"), Value::Integer(1));
        assert_eq!(logical.parse_text("1"), Value::Integer(1));
        assert_eq!(logical.parse_text("BOGUS"), Value::Integer(0));
        assert_eq!(logical.option_id(1), Some("ON"));
    }

    #[test]
    fn test_physical_range() {
        let mut physical = PhysicalParameter { index: 12.3, size: 2.0, ..Default::default() };
        physical.update_range();
        assert_eq!((physical.start_index, physical.end_index), (12, 13));
        physical.size = 0.4;
        physical.update_range();
        assert_eq!((physical.start_index, physical.end_index), (12, 12));
    }
}
