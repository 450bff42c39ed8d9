//! JSON trace summary output.
//!
//! The summary goes to a file, or to stdout when the path is `-`, so it can
//! be piped into other tools while the converted trace goes to a file.

use crate::aggregator::TraceStats;
use crate::utils::config::STDIO_PATH;
use crate::utils::error::OutputError;
use log::info;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Write trace statistics as pretty JSON followed by a newline
///
/// **Public** - called by the convert command after the last trace
///
/// # Arguments
/// * `stats` - Statistics to write
/// * `path` - Summary file, `-` for stdout
///
/// # Errors
/// * `OutputError::InvalidPath` - Path is empty or names a directory
/// * `OutputError::WriteFailed` - File cannot be created or written
/// * `OutputError::SerializationFailed` - JSON serialization error
pub fn write_stats(stats: &TraceStats, path: impl AsRef<Path>) -> Result<(), OutputError> {
    let path = path.as_ref();
    let mut out = open_summary(path)?;
    serde_json::to_writer_pretty(&mut out, stats)?;
    out.write_all(b"\n")?;
    out.flush()?;

    info!(
        "Trace summary written to {} ({} traces, {} slowest entries)",
        path.display(),
        stats.trace_count,
        stats.slowest.len()
    );
    Ok(())
}

fn open_summary(path: &Path) -> Result<Box<dyn Write>, OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }
    if path.as_os_str() == STDIO_PATH {
        return Ok(Box::new(io::stdout().lock()));
    }
    if path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }
    Ok(Box::new(BufWriter::new(File::create(path)?)))
}
