//! Binary trace format.
//!
//! This module provides:
//! - The tagged wire codec shared by reader and writer
//! - The name dictionary used for template name compression
//! - The trace writer and reader

pub mod dictionary;
pub mod reader;
pub mod wire;
pub mod writer;

// Re-export main types
pub use dictionary::{DictionaryEntry, NameDictionary};
pub use reader::{TraceChunk, TraceReader};
pub use writer::{CompressionMode, ProtobufWriter};
