//! Trace capture.
//!
//! This module provides:
//! - Blacklist rules excluding whole subtrees
//! - The entry printer that applies skipping in front of a writer
//! - The producer-facing tracer with begin/end matching and buffering

pub mod blacklist;
pub mod capture;
pub mod printer;

// Re-export main types
pub use blacklist::Blacklist;
pub use capture::{EntityId, RawEntry, Tracer};
pub use printer::EntryPrinter;
