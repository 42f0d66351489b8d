//! # RPC Module
//!
//! Wire shape of [`Value`](crate::value::Value) on the binary RPC transport.
//!
//! The transport itself lives elsewhere. The codec is needed here because the
//! `rpc_binary` conversion stores a whole encoded response inside a parameter.

pub mod binary;
