//! # HM Device Schema Library
//!
//! XML-driven device descriptions and parameter codec for HomeMatic BidCoS
//! devices.
//!
//! A description file tells the engine which channels a device model has,
//! which parameters live in each channel and how every parameter is laid out
//! inside the radio packets. The [`loader`] turns such files into
//! [`DeviceDescription`]s, the [`pool`] matches devices to descriptions and
//! [`description::codec`] translates between packet bytes and [`Value`]s.

pub mod bits;
pub mod config;
pub mod description;
pub mod diagnostics;
pub mod error;
pub mod loader;
pub mod packet;
pub mod pool;
pub mod rpc;
pub mod value;

pub use description::{DeviceDescription, DeviceFamily};
pub use diagnostics::{Diagnostic, Diagnostics, Outcome};
pub use error::{Result, SchemaError};
pub use pool::DescriptionPool;
pub use value::Value;
