//! Binary trace reader.
//!
//! Decodes the format produced by [`ProtobufWriter`](super::ProtobufWriter)
//! one chunk at a time. File and name tables are rebuilt per trace; a file
//! holding several concatenated traces is read trace after trace.

use super::dictionary::{DictionaryEntry, NameDictionary};
use super::wire::WireReader;
use crate::entries::{BeginEntry, EndEntry, EntryKind, SourceLocation, TraceHeader};
use crate::utils::config::{WIRE_FIXED64, WIRE_LENGTH_DELIMITED, WIRE_VARINT};
use crate::utils::error::ReadError;
use flate2::read::ZlibDecoder;
use log::debug;
use std::collections::HashMap;
use std::io::Read;

/// One decoded top-level frame
#[derive(Debug, Clone, PartialEq)]
pub enum TraceChunk {
    Header(TraceHeader),
    Begin(BeginEntry),
    End(EndEntry),
    /// Dictionary entry or a frame this reader does not know
    Other,
}

/// Pull reader over an in-memory trace file
pub struct TraceReader<'a> {
    trace: WireReader<'a>,
    remainder: &'a [u8],
    files: HashMap<u64, String>,
    names: NameDictionary,
    traces_opened: usize,
}

impl<'a> TraceReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            trace: WireReader::new(&[]),
            remainder: data,
            files: HashMap::new(),
            names: NameDictionary::new(),
            traces_opened: 0,
        }
    }

    /// Number of trace wrappers entered so far
    pub fn traces_opened(&self) -> usize {
        self.traces_opened
    }

    /// Decode the next chunk, or `Ok(None)` at end of stream.
    ///
    /// After an error the rest of the current trace is abandoned; the next
    /// call resumes at the following trace, if any.
    pub fn next_chunk(&mut self) -> Result<Option<TraceChunk>, ReadError> {
        loop {
            if self.trace.is_empty() && !self.open_next_trace() {
                return Ok(None);
            }
            let Some(tag) = self.trace.read_tag() else {
                continue;
            };

            if tag.wire_type != WIRE_LENGTH_DELIMITED {
                self.trace.skip_field(tag.wire_type);
                return Ok(Some(TraceChunk::Other));
            }
            let frame = self.trace.read_message();
            let chunk = match tag.field {
                1 => Ok(TraceChunk::Header(decode_header(frame))),
                2 => self.decode_entry(frame),
                3 => {
                    self.names.insert(decode_dictionary_entry(frame));
                    Ok(TraceChunk::Other)
                }
                _ => Ok(TraceChunk::Other),
            };
            if chunk.is_err() {
                self.trace = WireReader::new(&[]);
            }
            return chunk.map(Some);
        }
    }

    /// Enter the next trace wrapper. A stream that does not continue with
    /// a trace frame is treated as ended.
    fn open_next_trace(&mut self) -> bool {
        if self.remainder.is_empty() {
            return false;
        }
        let mut outer = WireReader::new(self.remainder);
        match outer.read_tag() {
            Some(tag) if tag.field == 1 && tag.wire_type == WIRE_LENGTH_DELIMITED => {
                self.trace = outer.read_message();
                self.remainder = outer.remaining();
                self.files.clear();
                self.names = NameDictionary::new();
                self.traces_opened += 1;
                debug!(
                    "Opened trace #{} ({} bytes remain after it)",
                    self.traces_opened,
                    self.remainder.len()
                );
                true
            }
            _ => {
                debug!("Stream does not continue with a trace frame, stopping");
                self.remainder = &[];
                false
            }
        }
    }

    fn decode_entry(&mut self, mut frame: WireReader<'a>) -> Result<TraceChunk, ReadError> {
        while let Some(tag) = frame.read_tag() {
            match (tag.field, tag.wire_type) {
                (1, WIRE_LENGTH_DELIMITED) => {
                    return self.decode_begin(frame.read_message()).map(TraceChunk::Begin);
                }
                (2, WIRE_LENGTH_DELIMITED) => {
                    return Ok(TraceChunk::End(decode_end(frame.read_message())));
                }
                _ => frame.skip_field(tag.wire_type),
            }
        }
        Ok(TraceChunk::Other)
    }

    fn decode_begin(&mut self, mut body: WireReader<'a>) -> Result<BeginEntry, ReadError> {
        let mut entry = BeginEntry::default();
        while let Some(tag) = body.read_tag() {
            match (tag.field, tag.wire_type) {
                (1, WIRE_VARINT) => {
                    entry.kind = EntryKind::from_ordinal(clamp_u32(body.read_varint()));
                }
                (2, WIRE_LENGTH_DELIMITED) => entry.name = self.decode_name(body.read_message())?,
                (3, WIRE_LENGTH_DELIMITED) => {
                    entry.location = self.decode_location(body.read_message())?;
                }
                (4, WIRE_FIXED64) => entry.timestamp = body.read_double(),
                (5, WIRE_VARINT) => entry.memory_usage = body.read_varint(),
                (6, WIRE_LENGTH_DELIMITED) => {
                    entry.origin = Some(self.decode_location(body.read_message())?);
                }
                _ => body.skip_field(tag.wire_type),
            }
        }
        Ok(entry)
    }

    fn decode_name(&mut self, mut msg: WireReader<'a>) -> Result<String, ReadError> {
        let mut name = String::new();
        while let Some(tag) = msg.read_tag() {
            match (tag.field, tag.wire_type) {
                (1, WIRE_LENGTH_DELIMITED) => name = msg.read_string(),
                (2, WIRE_LENGTH_DELIMITED) => {
                    let mut decoder = ZlibDecoder::new(msg.read_bytes());
                    name.clear();
                    decoder
                        .read_to_string(&mut name)
                        .map_err(|e| ReadError::Decompress(e.to_string()))?;
                }
                (3, WIRE_VARINT) => {
                    let id = msg.read_varint();
                    name = u32::try_from(id)
                        .ok()
                        .and_then(|id| self.names.resolve(id))
                        .ok_or(ReadError::UnknownNameId(id))?;
                }
                _ => msg.skip_field(tag.wire_type),
            }
        }
        Ok(name)
    }

    fn decode_location(&mut self, mut msg: WireReader<'a>) -> Result<SourceLocation, ReadError> {
        let mut file_name = None;
        let mut file_id = None;
        let mut location = SourceLocation::default();
        while let Some(tag) = msg.read_tag() {
            match (tag.field, tag.wire_type) {
                (1, WIRE_LENGTH_DELIMITED) => file_name = Some(msg.read_string()),
                (2, WIRE_VARINT) => file_id = Some(msg.read_varint()),
                (3, WIRE_VARINT) => location.line = clamp_u32(msg.read_varint()),
                (4, WIRE_VARINT) => location.column = clamp_u32(msg.read_varint()),
                _ => msg.skip_field(tag.wire_type),
            }
        }

        location.file = match (file_name, file_id) {
            (Some(name), Some(id)) => {
                self.files.insert(id, name.clone());
                name
            }
            (None, Some(id)) => self
                .files
                .get(&id)
                .cloned()
                .ok_or(ReadError::UnknownFileId(id))?,
            (Some(name), None) => name,
            (None, None) => String::new(),
        };
        Ok(location)
    }
}

impl<'a> Iterator for TraceReader<'a> {
    type Item = Result<TraceChunk, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk().transpose()
    }
}

fn decode_header(mut msg: WireReader<'_>) -> TraceHeader {
    let mut header = TraceHeader::default();
    while let Some(tag) = msg.read_tag() {
        match (tag.field, tag.wire_type) {
            (1, WIRE_VARINT) => header.version = clamp_u32(msg.read_varint()),
            (2, WIRE_LENGTH_DELIMITED) => header.source_name = Some(msg.read_string()),
            _ => msg.skip_field(tag.wire_type),
        }
    }
    header
}

fn decode_end(mut msg: WireReader<'_>) -> EndEntry {
    let mut entry = EndEntry::default();
    while let Some(tag) = msg.read_tag() {
        match (tag.field, tag.wire_type) {
            (1, WIRE_FIXED64) => entry.timestamp = msg.read_double(),
            (2, WIRE_VARINT) => entry.memory_usage = msg.read_varint(),
            _ => msg.skip_field(tag.wire_type),
        }
    }
    entry
}

fn decode_dictionary_entry(mut msg: WireReader<'_>) -> DictionaryEntry {
    let mut entry = DictionaryEntry {
        marked_name: String::new(),
        markers: Vec::new(),
    };
    while let Some(tag) = msg.read_tag() {
        match (tag.field, tag.wire_type) {
            (1, WIRE_LENGTH_DELIMITED) => entry.marked_name = msg.read_string(),
            (2, WIRE_VARINT) => entry.markers.push(clamp_u32(msg.read_varint())),
            _ => msg.skip_field(tag.wire_type),
        }
    }
    entry
}

fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
