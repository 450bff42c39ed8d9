//! Aggregation of trace entries into summary statistics.
//!
//! This module turns reconstructed instantiation trees into:
//! - Entry, root and depth counts
//! - Per-kind counts and inclusive time
//! - The slowest instantiations

pub mod stats;

// Re-export main types
pub use stats::{KindSummary, SlowEntry, StatsCollector, TraceStats};
