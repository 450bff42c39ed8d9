//! Trace statistics computed from reconstructed forests.
//!
//! The slowest instantiations are the first place to look when a build is
//! dominated by template work.

use crate::entries::{BeginEntry, EndEntry};
use crate::output::{EntryForest, TraceWriter, TraversalTask};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;

/// Summary of one or more traces
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceStats {
    /// Tool version that produced the summary
    pub version: String,

    /// Source file named by each trace header
    pub sources: Vec<String>,

    pub trace_count: usize,

    /// Number of begin entries
    pub entry_count: usize,

    /// Top-level instantiations
    pub root_count: usize,

    pub max_depth: usize,

    /// Ends that arrived with nothing open
    pub unmatched_ends: usize,

    /// Begins still open when their trace ended
    pub unclosed_entries: usize,

    /// Sum of root durations, seconds
    pub total_time: f64,

    /// Per kind name
    pub by_kind: BTreeMap<String, KindSummary>,

    /// Slowest entries, sorted by duration (descending)
    pub slowest: Vec<SlowEntry>,

    /// RFC 3339 timestamp
    pub generated_at: String,
}

/// Count and inclusive time of one entry kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KindSummary {
    pub count: usize,
    pub total_time: f64,
}

/// One instantiation in the top-N list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlowEntry {
    pub kind: String,
    pub name: String,
    pub location: String,
    pub duration: f64,
    pub memory_delta: u64,
    pub depth: usize,
}

impl SlowEntry {
    fn from_task(task: &TraversalTask, depth: usize) -> Self {
        Self {
            kind: task.begin.kind.name().to_string(),
            name: task.begin.name.clone(),
            location: task.begin.location.to_string(),
            duration: task.duration(),
            memory_delta: task.memory_delta(),
            depth,
        }
    }
}

impl TraceStats {
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            ..Self::default()
        }
    }

    /// Fold one reconstructed trace into the summary
    ///
    /// **Public** - called once per trace
    ///
    /// # Arguments
    /// * `forest` - Reconstructed trace
    /// * `top_n` - Size of the slowest-entries list to keep
    pub fn add_forest(&mut self, forest: &EntryForest, top_n: usize) {
        let depths = forest.depths();

        self.trace_count += 1;
        self.entry_count += forest.len();
        self.unmatched_ends += forest.unmatched_ends();
        self.unclosed_entries += forest.unclosed();
        self.max_depth = self
            .max_depth
            .max(depths.iter().copied().max().unwrap_or(0));

        for (task, &depth) in forest.tasks().iter().zip(&depths) {
            if task.is_root() {
                self.root_count += 1;
                self.total_time += task.duration();
            }
            let kind = self
                .by_kind
                .entry(task.begin.kind.name().to_string())
                .or_default();
            kind.count += 1;
            kind.total_time += task.duration();

            self.slowest.push(SlowEntry::from_task(task, depth));
        }

        self.slowest
            .sort_by(|a, b| b.duration.total_cmp(&a.duration));
        self.slowest.truncate(top_n);
    }

    /// Stamp the summary with the current time
    pub fn mark_generated(&mut self) {
        self.generated_at = chrono::Utc::now().to_rfc3339();
    }

    /// Human-readable one-line summary
    ///
    /// **Public** - for logging
    pub fn summary(&self) -> String {
        format!(
            "Traces: {} | Entries: {} | Roots: {} | Max depth: {} | Total: {:.3}s",
            self.trace_count, self.entry_count, self.root_count, self.max_depth, self.total_time
        )
    }
}

/// Trace writer building [`TraceStats`] from the entries it receives
pub struct StatsCollector {
    stats: TraceStats,
    forest: EntryForest,
    top_n: usize,
}

impl StatsCollector {
    pub fn new(top_n: usize) -> Self {
        Self {
            stats: TraceStats::new(),
            forest: EntryForest::new(),
            top_n,
        }
    }

    pub fn stats(&self) -> &TraceStats {
        &self.stats
    }

    pub fn into_stats(self) -> TraceStats {
        self.stats
    }
}

impl TraceWriter for StatsCollector {
    fn begin_trace(&mut self, source_name: Option<&str>) -> io::Result<()> {
        self.forest.clear();
        if let Some(source) = source_name {
            self.stats.sources.push(source.to_string());
        }
        Ok(())
    }

    fn end_trace(&mut self) -> io::Result<()> {
        self.stats.add_forest(&self.forest, self.top_n);
        self.forest.clear();
        Ok(())
    }

    fn write_begin(&mut self, entry: &BeginEntry) -> io::Result<()> {
        self.forest.push_begin(entry.clone());
        Ok(())
    }

    fn write_end(&mut self, entry: &EndEntry) -> io::Result<()> {
        self.forest.push_end(*entry);
        Ok(())
    }
}
