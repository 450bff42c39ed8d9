//! In-process tracer fed by a producer (a compiler front end).
//!
//! The producer reports each begin and end of instantiation work together
//! with an opaque [`EntityId`]. The tracer:
//! - drops ends that do not close the currently open begin
//! - collapses repeated memoization reports of the same entity
//! - buffers each top-level subtree and writes it when it closes, or writes
//!   every entry immediately in safe mode
//! - skips system-header subtrees and blacklisted subtrees
//!
//! A tracer that cannot open or write its output logs the failure and
//! disables itself; later calls are no-ops.

use super::printer::EntryPrinter;
use crate::entries::{BeginEntry, EndEntry, EntryKind, SourceLocation};
use crate::output::{create_writer, OutputFormat, TraceWriter};
use crate::utils::config::TracerConfig;
use log::{debug, error, info, warn};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::time::Instant;

/// Producer-supplied identity of the entity being instantiated
///
/// Only compared for equality; never written to a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(pub u64);

/// One begin or end as reported by the producer
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    pub is_begin: bool,
    pub kind: EntryKind,
    pub entity: EntityId,
    pub name: String,
    pub location: SourceLocation,
    pub origin: Option<SourceLocation>,

    /// Seconds; taken from the tracer clock when `None`
    pub timestamp: Option<f64>,
    pub memory_usage: u64,

    /// The point of instantiation lies in a system header
    pub in_system_header: bool,

    parent: Option<usize>,
}

impl RawEntry {
    pub fn begin(
        kind: EntryKind,
        entity: EntityId,
        name: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        Self {
            is_begin: true,
            kind,
            entity,
            name: name.into(),
            location,
            origin: None,
            timestamp: None,
            memory_usage: 0,
            in_system_header: false,
            parent: None,
        }
    }

    pub fn end(kind: EntryKind, entity: EntityId) -> Self {
        Self {
            is_begin: false,
            ..Self::begin(kind, entity, String::new(), SourceLocation::default())
        }
    }

    pub fn with_origin(mut self, origin: SourceLocation) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_memory_usage(mut self, memory_usage: u64) -> Self {
        self.memory_usage = memory_usage;
        self
    }

    pub fn in_system_header(mut self, in_system_header: bool) -> Self {
        self.in_system_header = in_system_header;
        self
    }

    fn to_begin(&self) -> BeginEntry {
        BeginEntry {
            kind: self.kind,
            name: self.name.clone(),
            location: self.location.clone(),
            timestamp: self.timestamp.unwrap_or_default(),
            memory_usage: self.memory_usage,
            origin: self.origin.clone(),
        }
    }

    fn to_end(&self) -> EndEntry {
        EndEntry::new(self.timestamp.unwrap_or_default(), self.memory_usage)
    }
}

/// Producer-facing trace recorder
pub struct Tracer {
    printer: Option<EntryPrinter<Box<dyn TraceWriter>>>,
    safe_mode: bool,
    ignore_system: bool,
    entries: Vec<RawEntry>,
    current_parent: Option<usize>,
    last_closed_memoization: Option<EntityId>,
    clock: Instant,
}

impl Tracer {
    /// Open the configured output and build the tracer
    ///
    /// **Public** - main entry point for producers
    ///
    /// Never fails: an output that cannot be opened or an unknown format
    /// yields a disabled tracer.
    pub fn new(config: &TracerConfig) -> Self {
        let writer = match open_writer(config) {
            Ok(writer) => Some(writer),
            Err(e) => {
                error!("Failed to create template trace output: {}", e);
                info!("Template trace has been disabled");
                None
            }
        };
        let mut tracer = Self::build(writer, config);

        if let (Some(printer), Some(path)) = (tracer.printer.as_mut(), &config.blacklist) {
            if let Err(e) = printer.read_blacklist(path) {
                error!("Could not load blacklist {}: {}", path.display(), e);
            }
        }
        tracer
    }

    /// Tracer writing to an already constructed writer
    pub fn with_writer(writer: Box<dyn TraceWriter>, config: &TracerConfig) -> Self {
        Self::build(Some(writer), config)
    }

    fn build(writer: Option<Box<dyn TraceWriter>>, config: &TracerConfig) -> Self {
        Self {
            printer: writer.map(EntryPrinter::new),
            safe_mode: config.safe_mode,
            ignore_system: config.ignore_system,
            entries: Vec::new(),
            current_parent: None,
            last_closed_memoization: None,
            clock: Instant::now(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.printer.is_some()
    }

    /// Number of entries cached for the open top-level subtree
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    pub fn start_trace(&mut self, source_name: &str) {
        debug!("Starting trace of {}", source_name);
        self.with_printer(|printer| printer.initialize(Some(source_name)));
    }

    /// Write whatever is still cached, close the trace and the document
    ///
    /// In safe mode every entry was already written when it arrived; the
    /// open-begin stack is only dropped.
    pub fn end_trace(&mut self) {
        if !self.entries.is_empty() {
            warn!(
                "Trace ended with {} entries of an unfinished subtree",
                self.entries.len()
            );
        }
        if self.safe_mode {
            self.entries.clear();
            self.current_parent = None;
        } else {
            self.print_cached_entries();
        }
        self.with_printer(|printer| {
            printer.finalize()?;
            printer.finish()
        });
    }

    pub fn at_template_begin(&mut self, entry: RawEntry) {
        self.record(RawEntry {
            is_begin: true,
            ..entry
        });
    }

    pub fn at_template_end(&mut self, entry: RawEntry) {
        self.record(RawEntry {
            is_begin: false,
            ..entry
        });
    }

    fn record(&mut self, mut entry: RawEntry) {
        if self.printer.is_none() || self.should_ignore(&entry) {
            return;
        }
        if entry.timestamp.is_none() {
            entry.timestamp = Some(self.clock.elapsed().as_secs_f64());
        }

        if self.safe_mode {
            self.print_or_skip(&entry);
            self.with_printer(|printer| printer.flush());
            if self.printer.is_none() {
                return;
            }
        }

        // The open-begin stack is kept in both modes so ends can be checked.
        if entry.is_begin {
            entry.parent = self.current_parent;
            self.current_parent = Some(self.entries.len());
            self.last_closed_memoization = None;
        } else {
            entry.parent = self
                .current_parent
                .and_then(|index| self.entries[index].parent);
            self.current_parent = entry.parent;
            if entry.kind == EntryKind::Memoization {
                self.last_closed_memoization = Some(entry.entity);
            }
        }
        let closes_root = !entry.is_begin && self.current_parent.is_none();
        self.entries.push(entry);

        if closes_root {
            if self.safe_mode {
                self.entries.clear();
            } else {
                self.print_cached_entries();
            }
        }
    }

    fn should_ignore(&self, entry: &RawEntry) -> bool {
        if entry.kind == EntryKind::Memoization
            && self.last_closed_memoization == Some(entry.entity)
        {
            return true;
        }
        if entry.is_begin {
            return false;
        }
        // An end must close the currently open begin.
        let closes_open = self
            .current_parent
            .and_then(|index| self.entries.get(index))
            .is_some_and(|open| open.kind == entry.kind && open.entity == entry.entity);
        if !closes_open {
            debug!(
                "Dropping end of {} that does not match the open begin",
                entry.kind
            );
        }
        !closes_open
    }

    fn print_or_skip(&mut self, entry: &RawEntry) {
        let skip = self.ignore_system && entry.is_begin && entry.in_system_header;
        self.with_printer(|printer| {
            if skip {
                printer.skip_entry();
                Ok(())
            } else if entry.is_begin {
                printer.print_begin(&entry.to_begin())
            } else {
                printer.print_end(&entry.to_end())
            }
        });
    }

    fn print_cached_entries(&mut self) {
        let entries = std::mem::take(&mut self.entries);
        if !entries.is_empty() {
            debug!("Writing {} cached entries", entries.len());
        }
        for entry in &entries {
            self.print_or_skip(entry);
        }
        self.current_parent = None;
    }

    /// Run `op` on the printer; an I/O failure disables the tracer
    fn with_printer<F>(&mut self, op: F)
    where
        F: FnOnce(&mut EntryPrinter<Box<dyn TraceWriter>>) -> io::Result<()>,
    {
        let Some(printer) = self.printer.as_mut() else {
            return;
        };
        if let Err(e) = op(printer) {
            error!("Failed to write template trace: {}", e);
            info!("Template trace has been disabled");
            self.printer = None;
            self.entries.clear();
        }
    }
}

/// Open the output stream and construct the writer for the configured format
fn open_writer(config: &TracerConfig) -> anyhow::Result<Box<dyn TraceWriter>> {
    let format: OutputFormat = config.format.parse()?;
    let out: Box<dyn Write> = if config.is_stdout() {
        Box::new(io::stdout())
    } else {
        let file = File::create(&config.output).map_err(|e| {
            anyhow::anyhow!("cannot open {}: {}", config.output.display(), e)
        })?;
        Box::new(BufWriter::new(file))
    };
    info!(
        "Writing {} template trace to {}",
        format,
        config.output.display()
    );
    Ok(create_writer(format, out, config.compression))
}
