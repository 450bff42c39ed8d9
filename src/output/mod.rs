//! Output writers for trace entries.
//!
//! This module handles rendering a trace in various formats:
//! - Flat formats rendered entry by entry (YAML, XML, text)
//! - Tree formats rendered after reconstructing parent/child edges
//!   (GraphML, Graphviz, nested XML)
//! - The binary protobuf format
//! - JSON trace summaries

pub mod escape;
pub mod flat;
pub mod json;
pub mod tree;

use crate::entries::{BeginEntry, EndEntry};
use crate::protobuf::{CompressionMode, ProtobufWriter};
use crate::utils::config::FORMAT_NAMES;
use crate::utils::error::WriterError;
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

pub use escape::{escape_xml, quote_yaml};
pub use flat::{TextWriter, XmlWriter, YamlWriter};
pub use json::write_stats;
pub use tree::{
    EntryForest, GraphMlRenderer, GraphvizRenderer, NestedXmlRenderer, TraversalTask, TreeRenderer,
    TreeWriter,
};

/// Sink for one or more traces
///
/// Calls arrive as `begin_trace`, any number of `write_begin`/`write_end`,
/// then `end_trace`, repeated per trace. `finish` closes the document once
/// the last trace is written. Implementations own their output stream.
pub trait TraceWriter {
    fn begin_trace(&mut self, source_name: Option<&str>) -> io::Result<()>;
    fn end_trace(&mut self) -> io::Result<()>;
    fn write_begin(&mut self, entry: &BeginEntry) -> io::Result<()>;
    fn write_end(&mut self, entry: &EndEntry) -> io::Result<()>;

    /// Push anything rendered so far to the underlying stream
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Write the document epilogue, if the format has one
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: TraceWriter + ?Sized> TraceWriter for Box<T> {
    fn begin_trace(&mut self, source_name: Option<&str>) -> io::Result<()> {
        (**self).begin_trace(source_name)
    }

    fn end_trace(&mut self) -> io::Result<()> {
        (**self).end_trace()
    }

    fn write_begin(&mut self, entry: &BeginEntry) -> io::Result<()> {
        (**self).write_begin(entry)
    }

    fn write_end(&mut self, entry: &EndEntry) -> io::Result<()> {
        (**self).write_end(entry)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        (**self).finish()
    }
}

/// Absent writers swallow everything
impl<T: TraceWriter> TraceWriter for Option<T> {
    fn begin_trace(&mut self, source_name: Option<&str>) -> io::Result<()> {
        self.as_mut().map_or(Ok(()), |w| w.begin_trace(source_name))
    }

    fn end_trace(&mut self) -> io::Result<()> {
        self.as_mut().map_or(Ok(()), |w| w.end_trace())
    }

    fn write_begin(&mut self, entry: &BeginEntry) -> io::Result<()> {
        self.as_mut().map_or(Ok(()), |w| w.write_begin(entry))
    }

    fn write_end(&mut self, entry: &EndEntry) -> io::Result<()> {
        self.as_mut().map_or(Ok(()), |w| w.write_end(entry))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.as_mut().map_or(Ok(()), |w| w.flush())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.as_mut().map_or(Ok(()), |w| w.finish())
    }
}

/// Sends every call to `primary`, then to `secondary`
pub struct Tee<A, B> {
    pub primary: A,
    pub secondary: B,
}

impl<A: TraceWriter, B: TraceWriter> Tee<A, B> {
    pub fn new(primary: A, secondary: B) -> Self {
        Self { primary, secondary }
    }
}

impl<A: TraceWriter, B: TraceWriter> TraceWriter for Tee<A, B> {
    fn begin_trace(&mut self, source_name: Option<&str>) -> io::Result<()> {
        self.primary.begin_trace(source_name)?;
        self.secondary.begin_trace(source_name)
    }

    fn end_trace(&mut self) -> io::Result<()> {
        self.primary.end_trace()?;
        self.secondary.end_trace()
    }

    fn write_begin(&mut self, entry: &BeginEntry) -> io::Result<()> {
        self.primary.write_begin(entry)?;
        self.secondary.write_begin(entry)
    }

    fn write_end(&mut self, entry: &EndEntry) -> io::Result<()> {
        self.primary.write_end(entry)?;
        self.secondary.write_end(entry)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.primary.flush()?;
        self.secondary.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        self.primary.finish()?;
        self.secondary.finish()
    }
}

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Yaml,
    Xml,
    Text,
    GraphMl,
    Graphviz,
    NestedXml,
    Protobuf,
}

impl OutputFormat {
    /// Canonical format name
    pub fn name(self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Xml => "xml",
            Self::Text => "text",
            Self::GraphMl => "graphml",
            Self::Graphviz => "graphviz",
            Self::NestedXml => "nestedxml",
            Self::Protobuf => "protobuf",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = WriterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "" | "yaml" => Ok(Self::Yaml),
            "xml" => Ok(Self::Xml),
            "text" => Ok(Self::Text),
            "graphml" => Ok(Self::GraphMl),
            "graphviz" => Ok(Self::Graphviz),
            "nestedxml" => Ok(Self::NestedXml),
            "protobuf" => Ok(Self::Protobuf),
            _ => Err(WriterError::UnknownFormat(format!(
                "{} (expected one of: {})",
                s,
                FORMAT_NAMES.join(", ")
            ))),
        }
    }
}

/// Build the writer for `format` over `out`
///
/// `compression` only affects the protobuf format.
pub fn create_writer<W: Write + 'static>(
    format: OutputFormat,
    out: W,
    compression: CompressionMode,
) -> Box<dyn TraceWriter> {
    match format {
        OutputFormat::Yaml => Box::new(YamlWriter::new(out)),
        OutputFormat::Xml => Box::new(XmlWriter::new(out)),
        OutputFormat::Text => Box::new(TextWriter::new(out)),
        OutputFormat::GraphMl => Box::new(TreeWriter::new(GraphMlRenderer::new(out))),
        OutputFormat::Graphviz => Box::new(TreeWriter::new(GraphvizRenderer::new(out))),
        OutputFormat::NestedXml => Box::new(TreeWriter::new(NestedXmlRenderer::new(out))),
        OutputFormat::Protobuf => Box::new(ProtobufWriter::new(out, compression)),
    }
}
