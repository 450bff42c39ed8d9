//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use thiserror::Error;

/// Errors that can occur while decoding a binary trace
///
/// Any of these ends the current trace segment. Callers treat them as
/// end-of-stream rather than aborting.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("File id {0} referenced before it was defined")]
    UnknownFileId(u64),

    #[error("Name dictionary id {0} referenced before it was defined")]
    UnknownNameId(u64),

    #[error("Failed to decompress template name: {0}")]
    Decompress(String),
}

/// Errors that can occur when constructing or driving a trace writer
#[derive(Error, Debug)]
pub enum WriterError {
    #[error("Unrecognized trace format: {0}")]
    UnknownFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while loading a blacklist file
#[derive(Error, Debug)]
pub enum BlacklistError {
    #[error("Could not read blacklist file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid blacklist pattern: {0}")]
    InvalidRegex(#[from] regex::Error),
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}
