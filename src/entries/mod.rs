//! Trace entry model.
//!
//! This module defines:
//! - The closed set of entry kinds and their wire ordinals
//! - Begin/End entries with source locations
//! - The per-trace header

pub mod kind;
pub mod schema;

// Re-export main types
pub use kind::EntryKind;
pub use schema::{BeginEntry, EndEntry, SourceLocation, TraceEntry, TraceHeader};
