//! # Device Description Model
//!
//! The entity graph of one device model: channels, parameter sets,
//! parameters, frames and type-match rules.
//!
//! A [`DeviceDescription`] owns every entity in flat arenas. Cross references
//! are plain index handles into those arenas, so cloning a description for
//! channel replication is a structural copy with no pointer fixing.

pub mod channel;
pub mod codec;
pub mod conversion;
pub mod device;
pub mod device_type;
pub mod frame;
pub mod parameter;
pub mod parameter_set;

pub use channel::{Channel, ChannelDirection, ChannelUiFlags, EnforceLink, LinkRole, SysinfoCount};
pub use conversion::{ConversionError, Flow, ParameterConversion};
pub use device::{DeviceDescription, DeviceFamily, LogicalDeviceType, RunProgram, RxModes, StartType};
pub use device_type::DeviceType;
pub use frame::{AllowedReceivers, DeviceFrame, FrameDirection};
pub use parameter::{LogicalParameter, LogicalType, Parameter, PhysicalParameter, PhysicalType};
pub use parameter_set::{ParameterSet, ParameterSetKind};

/// Handle of a [`Parameter`] inside its description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParameterId(pub(crate) usize);

/// Handle of a [`ParameterSet`] inside its description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParameterSetId(pub(crate) usize);

/// Handle of a [`Channel`] inside its description
///
/// Replicated channel slots share one handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub(crate) usize);

/// Handle of a [`DeviceFrame`] inside its description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub(crate) usize);
