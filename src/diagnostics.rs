//! # Diagnostics
//!
//! Structured, non-fatal findings produced while loading descriptions or
//! running the codec. They travel back to the caller next to the result so the
//! caller decides whether to log, count or surface them.

use std::fmt;
use tracing::{error, warn};

/// Where a diagnostic came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Unknown or malformed attribute, element or enum value in a description
    Schema,
    /// A value could not be represented and a fallback was applied
    Codec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// One finding, with a path to the offending schema node or parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    pub path: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Accumulator for diagnostics
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_warning(&mut self, path: &str, message: impl Into<String>) {
        self.push(DiagnosticKind::Schema, Severity::Warning, path, message);
    }

    pub fn schema_error(&mut self, path: &str, message: impl Into<String>) {
        self.push(DiagnosticKind::Schema, Severity::Error, path, message);
    }

    pub fn codec_warning(&mut self, path: &str, message: impl Into<String>) {
        self.push(DiagnosticKind::Codec, Severity::Warning, path, message);
    }

    fn push(&mut self, kind: DiagnosticKind, severity: Severity, path: &str, message: impl Into<String>) {
        self.entries.push(Diagnostic {
            kind,
            severity,
            message: message.into(),
            path: path.to_string(),
        });
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

/// A result value together with everything noticed while producing it
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub diagnostics: Diagnostics,
}

impl<T> Outcome<T> {
    pub fn new(value: T, diagnostics: Diagnostics) -> Self {
        Self { value, diagnostics }
    }

    pub fn clean(value: T) -> Self {
        Self { value, diagnostics: Diagnostics::new() }
    }

    /// Forward every diagnostic to `tracing` and return the value
    ///
    /// # Arguments
    ///
    /// * `context` - Prefix for each log line, usually a file name or parameter id
    pub fn log(self, context: &str) -> T {
        for d in self.diagnostics.iter() {
            match d.severity {
                Severity::Warning => warn!("{}: {}", context, d),
                Severity::Error => error!("{}: {}", context, d),
            }
        }
        self.value
    }
}
