//! Tagged, length-delimited wire codec.
//!
//! Every field is written as a varint tag `(field << 3) | wire_type` followed
//! by its payload:
//!
//! | Wire type | Payload                              |
//! |-----------|--------------------------------------|
//! | 0         | LEB128 varint                        |
//! | 1         | 8 bytes little-endian (doubles)      |
//! | 2         | varint length + raw bytes            |
//! | 5         | 4 bytes little-endian (skipped only) |
//!
//! Decoding is forgiving: a field whose declared length runs past the end of
//! its enclosing buffer is treated as absent and the buffer is exhausted, so
//! a truncated trace reads as a shorter trace instead of an error.

use crate::utils::config::{WIRE_FIXED32, WIRE_FIXED64, WIRE_LENGTH_DELIMITED, WIRE_VARINT};

/// Maximum encoded size of a 64-bit varint
const MAX_VARINT_LEN: usize = 10;

/// Append a bare varint (no tag)
pub fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Append a field tag
pub fn write_tag(buf: &mut Vec<u8>, field: u32, wire_type: u32) {
    put_varint(buf, (u64::from(field) << 3) | u64::from(wire_type & 0x7));
}

/// Append a varint field
pub fn write_varint(buf: &mut Vec<u8>, field: u32, value: u64) {
    write_tag(buf, field, WIRE_VARINT);
    put_varint(buf, value);
}

/// Append a double field (fixed 8 bytes, little-endian)
pub fn write_double(buf: &mut Vec<u8>, field: u32, value: f64) {
    write_tag(buf, field, WIRE_FIXED64);
    buf.extend_from_slice(&value.to_bits().to_le_bytes());
}

/// Append a length-delimited field
pub fn write_bytes(buf: &mut Vec<u8>, field: u32, bytes: &[u8]) {
    write_tag(buf, field, WIRE_LENGTH_DELIMITED);
    put_varint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Append a string field
pub fn write_string(buf: &mut Vec<u8>, field: u32, value: &str) {
    write_bytes(buf, field, value.as_bytes());
}

/// Append a fixed 4-byte field. Never produced by trace writers; kept so
/// tests can build messages carrying every wire type.
pub fn write_fixed32(buf: &mut Vec<u8>, field: u32, value: u32) {
    write_tag(buf, field, WIRE_FIXED32);
    buf.extend_from_slice(&value.to_le_bytes());
}

/// A decoded field tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub field: u32,
    pub wire_type: u32,
}

impl Tag {
    pub fn new(field: u32, wire_type: u32) -> Self {
        Self { field, wire_type }
    }
}

/// Cursor over one message body
///
/// Readers never read past the end of the slice they were created on;
/// a sub-message reader is bounded by its declared length.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    fn exhaust(&mut self) {
        self.pos = self.data.len();
    }

    /// Take `n` bytes, or exhaust the buffer and return `None` if fewer remain
    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let rest = self.remaining();
        if rest.len() < n {
            self.exhaust();
            return None;
        }
        self.pos += n;
        Some(&rest[..n])
    }

    /// Read a bare varint. A varint cut short by the end of the buffer
    /// yields the bits read so far.
    pub fn read_varint(&mut self) -> u64 {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        for _ in 0..MAX_VARINT_LEN {
            let Some(&byte) = self.data.get(self.pos) else {
                return value;
            };
            self.pos += 1;
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return value;
            }
            shift += 7;
        }
        value
    }

    /// Read the next field tag, or `None` at end of message
    pub fn read_tag(&mut self) -> Option<Tag> {
        if self.is_empty() {
            return None;
        }
        let raw = self.read_varint();
        let field = u32::try_from(raw >> 3).unwrap_or(u32::MAX);
        Some(Tag::new(field, (raw & 0x7) as u32))
    }

    /// Read a fixed 8-byte little-endian double; 0.0 if truncated
    pub fn read_double(&mut self) -> f64 {
        self.take(8)
            .and_then(|b| b.try_into().ok())
            .map(|b: [u8; 8]| f64::from_bits(u64::from_le_bytes(b)))
            .unwrap_or(0.0)
    }

    /// Read a fixed 4-byte little-endian value; 0 if truncated
    pub fn read_fixed32(&mut self) -> u32 {
        self.take(4)
            .and_then(|b| b.try_into().ok())
            .map(u32::from_le_bytes)
            .unwrap_or(0)
    }

    /// Read a length-delimited payload; empty if the length overruns the buffer
    pub fn read_bytes(&mut self) -> &'a [u8] {
        let len = self.read_varint();
        usize::try_from(len)
            .ok()
            .and_then(|len| self.take(len))
            .unwrap_or(&[])
    }

    /// Read a length-delimited UTF-8 string. Invalid UTF-8 is replaced.
    pub fn read_string(&mut self) -> String {
        String::from_utf8_lossy(self.read_bytes()).into_owned()
    }

    /// Open a length-delimited sub-message. A declared length running past
    /// the end is clamped to what is available.
    pub fn read_message(&mut self) -> WireReader<'a> {
        let len = self.read_varint();
        let rest = self.remaining();
        let len = usize::try_from(len).map_or(rest.len(), |len| len.min(rest.len()));
        self.pos += len;
        WireReader::new(&rest[..len])
    }

    /// Skip the payload of a field with the given wire type.
    ///
    /// Unknown wire types carry no length information, so the rest of the
    /// message is discarded.
    pub fn skip_field(&mut self, wire_type: u32) {
        match wire_type {
            WIRE_VARINT => {
                self.read_varint();
            }
            WIRE_FIXED64 => {
                self.take(8);
            }
            WIRE_LENGTH_DELIMITED => {
                self.read_bytes();
            }
            WIRE_FIXED32 => {
                self.take(4);
            }
            _ => self.exhaust(),
        }
    }
}
