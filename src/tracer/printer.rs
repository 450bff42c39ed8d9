//! Entry printer: the skipping gate in front of a trace writer.
//!
//! A begin matching the blacklist (or explicitly skipped by the caller) is
//! dropped together with everything up to its matching end. Nested begins
//! inside a skipped span only deepen the skip.

use super::blacklist::Blacklist;
use crate::entries::{BeginEntry, EndEntry};
use crate::output::TraceWriter;
use crate::utils::error::BlacklistError;
use log::debug;
use std::io;
use std::path::Path;

/// Forwards entries to a writer unless they fall in a skipped subtree
pub struct EntryPrinter<W: TraceWriter> {
    writer: W,
    blacklist: Blacklist,
    skipped_endings: usize,
    skipped_entries: usize,
}

impl<W: TraceWriter> EntryPrinter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            blacklist: Blacklist::empty(),
            skipped_endings: 0,
            skipped_entries: 0,
        }
    }

    pub fn with_blacklist(mut self, blacklist: Blacklist) -> Self {
        self.blacklist = blacklist;
        self
    }

    pub fn set_blacklist(&mut self, blacklist: Blacklist) {
        self.blacklist = blacklist;
    }

    /// Replace the blacklist with the rules in `path`. On error the
    /// blacklist is cleared.
    pub fn read_blacklist(&mut self, path: impl AsRef<Path>) -> Result<(), BlacklistError> {
        match Blacklist::from_file(path) {
            Ok(blacklist) => {
                self.blacklist = blacklist;
                Ok(())
            }
            Err(e) => {
                self.blacklist = Blacklist::empty();
                Err(e)
            }
        }
    }

    /// Whether a skipped span is currently open
    pub fn is_skipping(&self) -> bool {
        self.skipped_endings > 0
    }

    /// Number of entries dropped so far
    pub fn skipped_entries(&self) -> usize {
        self.skipped_entries
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Skip the begin being processed and its whole subtree
    pub fn skip_entry(&mut self) {
        self.skipped_endings += 1;
        self.skipped_entries += 1;
    }

    fn should_ignore_begin(&mut self, entry: &BeginEntry) -> bool {
        if self.is_skipping() {
            self.skip_entry();
            return true;
        }
        if self.blacklist.matches(&entry.name) {
            debug!("Skipping blacklisted subtree: {}", entry.name);
            self.skip_entry();
            return true;
        }
        false
    }

    fn should_ignore_end(&mut self) -> bool {
        if self.is_skipping() {
            self.skipped_endings -= 1;
            self.skipped_entries += 1;
            return true;
        }
        false
    }

    /// Open a trace. A skip left open by a truncated previous trace ends here.
    pub fn initialize(&mut self, source_name: Option<&str>) -> io::Result<()> {
        if self.is_skipping() {
            debug!(
                "Previous trace ended inside a skipped subtree ({} endings missing)",
                self.skipped_endings
            );
            self.skipped_endings = 0;
        }
        self.writer.begin_trace(source_name)
    }

    pub fn finalize(&mut self) -> io::Result<()> {
        self.writer.end_trace()
    }

    pub fn print_begin(&mut self, entry: &BeginEntry) -> io::Result<()> {
        if self.should_ignore_begin(entry) {
            return Ok(());
        }
        self.writer.write_begin(entry)
    }

    pub fn print_end(&mut self, entry: &EndEntry) -> io::Result<()> {
        if self.should_ignore_end() {
            return Ok(());
        }
        self.writer.write_end(entry)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn finish(&mut self) -> io::Result<()> {
        self.writer.finish()
    }
}
