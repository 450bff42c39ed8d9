//! Flat writers.
//!
//! Each entry is rendered as soon as it arrives, in input order. Nothing is
//! buffered beyond the underlying stream.

use super::escape::{escape_xml, quote_yaml};
use super::TraceWriter;
use crate::entries::{BeginEntry, EndEntry};
use std::io::{self, Write};

const XML_PROLOGUE: &str = "<?xml version=\"1.0\" standalone=\"yes\"?>\n";

/// YAML document holding one flow sequence of entry maps per trace
pub struct YamlWriter<W: Write> {
    out: W,
    entries_in_trace: usize,
    traces: usize,
}

impl<W: Write> YamlWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            entries_in_trace: 0,
            traces: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn separator(&mut self) -> io::Result<()> {
        let sep = if self.entries_in_trace == 0 { "\n" } else { ",\n" };
        self.entries_in_trace += 1;
        self.out.write_all(sep.as_bytes())
    }
}

impl<W: Write> TraceWriter for YamlWriter<W> {
    fn begin_trace(&mut self, _source_name: Option<&str>) -> io::Result<()> {
        self.entries_in_trace = 0;
        self.traces += 1;
        self.out.write_all(b"---\n[")
    }

    fn end_trace(&mut self) -> io::Result<()> {
        self.out.write_all(b"\n]\n")?;
        self.out.flush()
    }

    fn write_begin(&mut self, entry: &BeginEntry) -> io::Result<()> {
        self.separator()?;
        write!(
            self.out,
            "  {{ IsBegin: true, Kind: {}, Name: {}, Location: {}, TimeStamp: {:.9}, MemoryUsage: {}",
            entry.kind,
            quote_yaml(&entry.name),
            quote_yaml(&entry.location.to_string()),
            entry.timestamp,
            entry.memory_usage
        )?;
        if let Some(origin) = &entry.origin {
            write!(self.out, ", TemplateOrigin: {}", quote_yaml(&origin.to_string()))?;
        }
        self.out.write_all(b" }")
    }

    fn write_end(&mut self, entry: &EndEntry) -> io::Result<()> {
        self.separator()?;
        write!(
            self.out,
            "  {{ IsBegin: false, TimeStamp: {:.9}, MemoryUsage: {} }}",
            entry.timestamp, entry.memory_usage
        )
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        if self.traces > 0 {
            self.out.write_all(b"...\n")?;
        }
        self.out.flush()
    }
}

/// XML with one `<TemplateBegin>`/`<TemplateEnd>` element per entry
///
/// Every trace is a `<Trace>` element under a single `<Traces>` root.
pub struct XmlWriter<W: Write> {
    out: W,
    started: bool,
}

impl<W: Write> XmlWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            started: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TraceWriter for XmlWriter<W> {
    fn begin_trace(&mut self, _source_name: Option<&str>) -> io::Result<()> {
        if !self.started {
            self.started = true;
            self.out.write_all(XML_PROLOGUE.as_bytes())?;
            self.out.write_all(b"<Traces>\n")?;
        }
        self.out.write_all(b"<Trace>\n")
    }

    fn end_trace(&mut self) -> io::Result<()> {
        self.out.write_all(b"</Trace>\n")?;
        self.out.flush()
    }

    fn write_begin(&mut self, entry: &BeginEntry) -> io::Result<()> {
        write!(
            self.out,
            "<TemplateBegin>\n    <Kind>{}</Kind>\n    <Context context = \"{}\"/>\n    <Location>{}</Location>\n",
            entry.kind,
            escape_xml(&entry.name),
            escape_xml(&entry.location.to_string())
        )?;
        write!(
            self.out,
            "    <TimeStamp time = \"{:.9}\"/>\n    <MemoryUsage bytes = \"{}\"/>\n",
            entry.timestamp, entry.memory_usage
        )?;
        if let Some(origin) = &entry.origin {
            writeln!(
                self.out,
                "    <TemplateOrigin>{}</TemplateOrigin>",
                escape_xml(&origin.to_string())
            )?;
        }
        self.out.write_all(b"</TemplateBegin>\n")
    }

    fn write_end(&mut self, entry: &EndEntry) -> io::Result<()> {
        write!(
            self.out,
            "<TemplateEnd>\n    <TimeStamp time = \"{:.9}\"/>\n    <MemoryUsage bytes = \"{}\"/>\n</TemplateEnd>\n",
            entry.timestamp, entry.memory_usage
        )
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        if self.started {
            self.out.write_all(b"</Traces>\n")?;
        }
        self.out.flush()
    }
}

/// Human readable `Key = Value` listing
pub struct TextWriter<W: Write> {
    out: W,
}

impl<W: Write> TextWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TraceWriter for TextWriter<W> {
    fn begin_trace(&mut self, source_name: Option<&str>) -> io::Result<()> {
        writeln!(self.out, "  SourceFile = {}", source_name.unwrap_or_default())
    }

    fn end_trace(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn write_begin(&mut self, entry: &BeginEntry) -> io::Result<()> {
        write!(
            self.out,
            "TemplateBegin\n  Kind = {}\n  Name = {}\n  Location = {}\n  TimeStamp = {:.9}\n  MemoryUsage = {}\n",
            entry.kind, entry.name, entry.location, entry.timestamp, entry.memory_usage
        )?;
        if let Some(origin) = &entry.origin {
            writeln!(self.out, "  TemplateOrigin = {}", origin)?;
        }
        Ok(())
    }

    fn write_end(&mut self, entry: &EndEntry) -> io::Result<()> {
        write!(
            self.out,
            "TemplateEnd\n  TimeStamp = {:.9}\n  MemoryUsage = {}\n",
            entry.timestamp, entry.memory_usage
        )
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}
