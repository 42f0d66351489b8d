//! # Error Types
//!
//! Custom error types for the description engine using `thiserror`.
//!
//! Only failures that stop a whole file or a whole device family end up here.
//! Recoverable schema and codec problems are reported as
//! [`Diagnostic`](crate::diagnostics::Diagnostic)s instead.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the description engine
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The XML document could not be parsed at all
    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// The document has no `device` root element
    #[error("{} has no device root element", path.display())]
    MissingRoot { path: PathBuf },

    /// Not a single description could be loaded for a device family
    #[error("no loadable device descriptions in {}", path.display())]
    NoDescriptions { path: PathBuf },

    /// Malformed binary RPC payload
    #[error("binary RPC error: {0}")]
    Rpc(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// JSON export errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the description engine
pub type Result<T> = std::result::Result<T, SchemaError>;
