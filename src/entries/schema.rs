//! Trace entry definitions shared by every reader and writer.
//!
//! Entries carry no producer identity: matching an end to its begin is
//! positional once an entry reaches this form.

use super::kind::EntryKind;
use serde::Serialize;
use std::fmt;

/// Position in a source file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

/// Rendered as `file|line|column` in all textual formats
impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.file, self.line, self.column)
    }
}

/// Opening marker of one unit of instantiation work
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BeginEntry {
    pub kind: EntryKind,
    pub name: String,
    pub location: SourceLocation,
    pub timestamp: f64,

    /// Zero means not measured
    pub memory_usage: u64,

    /// Declaration of the template being instantiated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<SourceLocation>,
}

impl BeginEntry {
    pub fn new(kind: EntryKind, name: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind,
            name: name.into(),
            location,
            ..Default::default()
        }
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_memory_usage(mut self, memory_usage: u64) -> Self {
        self.memory_usage = memory_usage;
        self
    }

    pub fn with_origin(mut self, origin: SourceLocation) -> Self {
        self.origin = Some(origin);
        self
    }
}

/// Closing marker, matched to the most recent open begin
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EndEntry {
    pub timestamp: f64,
    pub memory_usage: u64,
}

impl EndEntry {
    pub fn new(timestamp: f64, memory_usage: u64) -> Self {
        Self {
            timestamp,
            memory_usage,
        }
    }
}

/// Per-trace header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceHeader {
    pub version: u32,
    pub source_name: Option<String>,
}

/// A begin or end entry, in stream order
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEntry {
    Begin(BeginEntry),
    End(EndEntry),
}

impl TraceEntry {
    pub fn is_begin(&self) -> bool {
        matches!(self, Self::Begin(_))
    }
}
