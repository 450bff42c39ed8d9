//! Binary trace writer.
//!
//! A trace is buffered in memory and emitted as one length-delimited
//! top-level frame on `end_trace`:
//!
//! ```text
//! trace (1) {
//!   header (1)           { version (1), source_file (2) }
//!   entry (2)            { begin (1) | end (2) }
//!   dictionary_entry (3) { marked_name (1), marker_ids (2, repeated) }
//! }
//! ```

use super::dictionary::NameDictionary;
use super::wire::{write_bytes, write_double, write_string, write_varint};
use crate::entries::{BeginEntry, EndEntry, SourceLocation};
use crate::output::TraceWriter;
use crate::utils::config::TRACE_FORMAT_VERSION;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::debug;
use std::collections::HashMap;
use std::io::{self, Write};

/// How template names are encoded in begin entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMode {
    /// Literal string (TemplateName field 1)
    None,
    /// zlib-compressed bytes (TemplateName field 2)
    Zlib,
    /// Name dictionary id (TemplateName field 3)
    Dictionary,
}

impl CompressionMode {
    /// Map a numeric compression level; anything above 1 selects the dictionary
    pub fn from_level(level: u32) -> Self {
        match level {
            0 => Self::None,
            1 => Self::Zlib,
            _ => Self::Dictionary,
        }
    }
}

impl Default for CompressionMode {
    fn default() -> Self {
        Self::Dictionary
    }
}

/// Writer producing the binary trace format
pub struct ProtobufWriter<W: Write> {
    out: W,
    buffer: Vec<u8>,
    file_ids: HashMap<String, u64>,
    names: NameDictionary,
    compression: CompressionMode,
}

impl<W: Write> ProtobufWriter<W> {
    pub fn new(out: W, compression: CompressionMode) -> Self {
        Self {
            out,
            buffer: Vec::new(),
            file_ids: HashMap::new(),
            names: NameDictionary::new(),
            compression,
        }
    }

    /// Number of dictionary entries created for the current trace
    pub fn dictionary_len(&self) -> usize {
        self.names.len()
    }

    /// Consume the writer, returning the output stream
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Encode a location, defining the file id inline on first use
    fn encode_location(&mut self, location: &SourceLocation) -> Vec<u8> {
        let mut buf = Vec::new();
        match self.file_ids.get(&location.file) {
            Some(&id) => write_varint(&mut buf, 2, id),
            None => {
                let id = self.file_ids.len() as u64;
                write_string(&mut buf, 1, &location.file);
                write_varint(&mut buf, 2, id);
                self.file_ids.insert(location.file.clone(), id);
            }
        }
        write_varint(&mut buf, 3, u64::from(location.line));
        write_varint(&mut buf, 4, u64::from(location.column));
        buf
    }

    /// Encode the TemplateName sub-message. Dictionary entries created for
    /// it are appended to the trace buffer first, so every id is defined
    /// before it is referenced.
    fn encode_name(&mut self, name: &str) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        match self.compression {
            CompressionMode::None => write_string(&mut buf, 1, name),
            CompressionMode::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(name.as_bytes())?;
                write_bytes(&mut buf, 2, &encoder.finish()?);
            }
            CompressionMode::Dictionary => {
                let id = self.names.intern(name);
                for entry in self.names.drain_new() {
                    let mut frame = Vec::new();
                    write_string(&mut frame, 1, &entry.marked_name);
                    for &marker in &entry.markers {
                        write_varint(&mut frame, 2, u64::from(marker));
                    }
                    write_bytes(&mut self.buffer, 3, &frame);
                }
                write_varint(&mut buf, 3, u64::from(id));
            }
        }
        Ok(buf)
    }

    /// Wrap an encoded begin (1) or end (2) in an entry frame
    fn push_entry(&mut self, field: u32, body: &[u8]) {
        let mut oneof = Vec::with_capacity(body.len() + 4);
        write_bytes(&mut oneof, field, body);
        write_bytes(&mut self.buffer, 2, &oneof);
    }
}

impl<W: Write> TraceWriter for ProtobufWriter<W> {
    fn begin_trace(&mut self, source_name: Option<&str>) -> io::Result<()> {
        self.buffer.clear();
        self.file_ids.clear();
        self.names = NameDictionary::new();

        let mut header = Vec::new();
        write_varint(&mut header, 1, u64::from(TRACE_FORMAT_VERSION));
        if let Some(source) = source_name.filter(|s| !s.is_empty()) {
            write_string(&mut header, 2, source);
        }
        write_bytes(&mut self.buffer, 1, &header);
        Ok(())
    }

    fn end_trace(&mut self) -> io::Result<()> {
        let mut frame = Vec::with_capacity(self.buffer.len() + 10);
        write_bytes(&mut frame, 1, &self.buffer);
        self.out.write_all(&frame)?;
        self.out.flush()?;
        debug!(
            "Wrote trace frame ({} bytes, {} dictionary entries, {} files)",
            frame.len(),
            self.names.len(),
            self.file_ids.len()
        );
        self.buffer.clear();
        Ok(())
    }

    fn write_begin(&mut self, entry: &BeginEntry) -> io::Result<()> {
        let name = self.encode_name(&entry.name)?;
        let location = self.encode_location(&entry.location);

        let mut body = Vec::new();
        write_varint(&mut body, 1, u64::from(entry.kind.ordinal()));
        write_bytes(&mut body, 2, &name);
        write_bytes(&mut body, 3, &location);
        write_double(&mut body, 4, entry.timestamp);
        if entry.memory_usage > 0 {
            write_varint(&mut body, 5, entry.memory_usage);
        }
        if let Some(origin) = &entry.origin {
            let origin = self.encode_location(origin);
            write_bytes(&mut body, 6, &origin);
        }

        self.push_entry(1, &body);
        Ok(())
    }

    fn write_end(&mut self, entry: &EndEntry) -> io::Result<()> {
        let mut body = Vec::new();
        write_double(&mut body, 1, entry.timestamp);
        if entry.memory_usage > 0 {
            write_varint(&mut body, 2, entry.memory_usage);
        }
        self.push_entry(2, &body);
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::EntryKind;
    use crate::protobuf::wire::{Tag, WireReader};
    use crate::utils::config::WIRE_LENGTH_DELIMITED;

    fn begin(name: &str) -> BeginEntry {
        BeginEntry::new(
            EntryKind::TemplateInstantiation,
            name,
            SourceLocation::new("t.cpp", 3, 1),
        )
        .with_timestamp(0.5)
    }

    fn trace_body(bytes: &[u8]) -> Vec<(u32, Vec<u8>)> {
        let mut outer = WireReader::new(bytes);
        assert_eq!(outer.read_tag(), Some(Tag::new(1, WIRE_LENGTH_DELIMITED)));
        let mut body = outer.read_message();
        assert!(outer.is_empty());

        let mut frames = Vec::new();
        while let Some(tag) = body.read_tag() {
            frames.push((tag.field, body.read_bytes().to_vec()));
        }
        frames
    }

    #[test]
    fn test_compression_levels() {
        assert_eq!(CompressionMode::from_level(0), CompressionMode::None);
        assert_eq!(CompressionMode::from_level(1), CompressionMode::Zlib);
        assert_eq!(CompressionMode::from_level(2), CompressionMode::Dictionary);
        assert_eq!(CompressionMode::from_level(9), CompressionMode::Dictionary);
    }

    #[test]
    fn test_header_is_first_frame() {
        let mut writer = ProtobufWriter::new(Vec::new(), CompressionMode::None);
        writer.begin_trace(Some("t.cpp")).unwrap();
        writer.end_trace().unwrap();

        let frames = trace_body(&writer.into_inner());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].0, 1);

        let mut header = WireReader::new(&frames[0].1);
        header.read_tag();
        assert_eq!(header.read_varint(), u64::from(TRACE_FORMAT_VERSION));
        header.read_tag();
        assert_eq!(header.read_string(), "t.cpp");
    }

    #[test]
    fn test_file_name_written_once() {
        let mut writer = ProtobufWriter::new(Vec::new(), CompressionMode::None);
        let first = writer.encode_location(&SourceLocation::new("a.cpp", 1, 2));
        let second = writer.encode_location(&SourceLocation::new("a.cpp", 5, 6));
        let other = writer.encode_location(&SourceLocation::new("b.cpp", 1, 1));

        let mut r = WireReader::new(&first);
        assert_eq!(r.read_tag().unwrap().field, 1);
        assert_eq!(r.read_string(), "a.cpp");

        let mut r = WireReader::new(&second);
        assert_eq!(r.read_tag().unwrap().field, 2);
        assert_eq!(r.read_varint(), 0);

        let mut r = WireReader::new(&other);
        r.read_tag();
        assert_eq!(r.read_string(), "b.cpp");
        r.read_tag();
        assert_eq!(r.read_varint(), 1);
    }

    #[test]
    fn test_dictionary_frames_precede_entry() {
        let mut writer = ProtobufWriter::new(Vec::new(), CompressionMode::Dictionary);
        writer.begin_trace(None).unwrap();
        writer.write_begin(&begin("NS::foo<int>")).unwrap();
        writer.write_end(&EndEntry::new(0.6, 0)).unwrap();
        writer.end_trace().unwrap();

        let fields: Vec<u32> = trace_body(&writer.into_inner())
            .into_iter()
            .map(|(field, _)| field)
            .collect();
        assert_eq!(fields, vec![1, 3, 3, 3, 2, 2]);
    }

    #[test]
    fn test_zero_memory_is_omitted() {
        let mut writer = ProtobufWriter::new(Vec::new(), CompressionMode::None);
        writer.begin_trace(None).unwrap();
        writer.write_end(&EndEntry::new(1.0, 0)).unwrap();
        writer.end_trace().unwrap();

        let frames = trace_body(&writer.into_inner());
        let mut entry = WireReader::new(&frames[1].1);
        assert_eq!(entry.read_tag().unwrap().field, 2);
        let mut end = entry.read_message();
        assert_eq!(end.read_tag().unwrap().field, 1);
        end.read_double();
        assert!(end.is_empty());
    }
}
