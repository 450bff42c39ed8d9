//! Convert command implementation.
//!
//! The convert command:
//! 1. Opens the output and builds the writer for the requested format
//! 2. Decodes every input trace file and replays it through the
//!    blacklist-aware entry printer
//! 3. Optionally writes a JSON summary of what was converted

use crate::aggregator::StatsCollector;
use crate::output::{create_writer, write_stats, OutputFormat, Tee, TraceWriter};
use crate::protobuf::{CompressionMode, TraceChunk, TraceReader};
use crate::tracer::{Blacklist, EntryPrinter};
use crate::utils::config::{
    DEFAULT_COMPRESSION_LEVEL, DEFAULT_FORMAT, DEFAULT_TOP_ENTRIES, STDIO_PATH,
};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

type Printer = EntryPrinter<Tee<Box<dyn TraceWriter>, Option<StatsCollector>>>;

/// Arguments for the convert command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertArgs {
    /// Binary trace files, `-` for stdin
    pub inputs: Vec<PathBuf>,

    /// Output path, `-` for stdout
    pub output: PathBuf,

    /// Output format name
    pub format: String,

    /// Optional blacklist file
    pub blacklist: Option<PathBuf>,

    /// Name compression level of the protobuf format
    pub compression: u32,

    /// Optional JSON summary path
    pub summary: Option<PathBuf>,

    /// Number of slowest entries listed in the summary
    pub top_entries: usize,
}

impl Default for ConvertArgs {
    fn default() -> Self {
        Self {
            inputs: vec![PathBuf::from(STDIO_PATH)],
            output: PathBuf::from(STDIO_PATH),
            format: DEFAULT_FORMAT.to_string(),
            blacklist: None,
            compression: DEFAULT_COMPRESSION_LEVEL,
            summary: None,
            top_entries: DEFAULT_TOP_ENTRIES,
        }
    }
}

/// What a conversion processed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertReport {
    pub inputs_read: usize,
    pub inputs_failed: usize,
    pub traces: usize,
    pub begins: usize,
    pub ends: usize,

    /// Entries dropped by the blacklist
    pub skipped: usize,

    /// Ends dropped because no begin was open
    pub unmatched_ends: usize,

    /// Inputs cut short by a malformed trace
    pub truncated: usize,
}

/// Execute the convert command
///
/// **Public** - main entry point called from main.rs
///
/// # Arguments
/// * `args` - Convert command arguments
///
/// # Returns
/// A report of what was converted
///
/// # Errors
/// * Unknown output format
/// * Output file cannot be opened or written
/// * Summary file cannot be written
pub fn execute_convert(args: ConvertArgs) -> Result<ConvertReport> {
    let start_time = Instant::now();

    // Step 1: Build the writer
    info!("Step 1/3: Opening {} output...", args.format);
    let format: OutputFormat = args
        .format
        .parse()
        .context("Failed to construct trace writer")?;
    let out = open_output(&args.output)
        .with_context(|| format!("Failed to open output {}", args.output.display()))?;
    let writer = create_writer(format, out, CompressionMode::from_level(args.compression));
    let collector = args
        .summary
        .as_ref()
        .map(|_| StatsCollector::new(args.top_entries));

    let mut printer = EntryPrinter::new(Tee::new(writer, collector));
    if let Some(path) = &args.blacklist {
        match Blacklist::from_file(path) {
            Ok(blacklist) => printer.set_blacklist(blacklist),
            Err(e) => warn!("Ignoring blacklist {}: {}", path.display(), e),
        }
    }

    // Step 2: Replay every input
    info!("Step 2/3: Converting {} input(s)...", args.inputs.len());
    let mut report = ConvertReport::default();
    for input in &args.inputs {
        let data = match read_input(input) {
            Ok(data) => data,
            Err(e) => {
                warn!("Skipping input {}: {}", input.display(), e);
                report.inputs_failed += 1;
                continue;
            }
        };
        debug!("Read {} bytes from {}", data.len(), input.display());
        convert_buffer(&data, &mut printer, &mut report)
            .with_context(|| format!("Failed to write trace converted from {}", input.display()))?;
        report.inputs_read += 1;
    }
    printer.finish().context("Failed to finish output")?;
    report.skipped = printer.skipped_entries();

    // Step 3: Summary
    let tee = printer.into_inner();
    match (tee.secondary, &args.summary) {
        (Some(collector), Some(path)) => {
            info!("Step 3/3: Writing summary...");
            let mut stats = collector.into_stats();
            stats.mark_generated();
            info!("{}", stats.summary());
            write_stats(&stats, path).context("Failed to write trace summary")?;
        }
        _ => info!("Step 3/3: Skipping summary (not requested)"),
    }

    info!(
        "Converted {} trace(s), {} begin / {} end entries in {:.2}s",
        report.traces,
        report.begins,
        report.ends,
        start_time.elapsed().as_secs_f64()
    );
    Ok(report)
}

/// Decode one input buffer into the printer
///
/// **Private** - internal helper for execute_convert
fn convert_buffer(data: &[u8], printer: &mut Printer, report: &mut ConvertReport) -> io::Result<()> {
    let mut reader = TraceReader::new(data);
    let mut trace_open = false;
    // Begins of the current trace still waiting for their end
    let mut open_begins = 0usize;

    loop {
        let chunk = match reader.next_chunk() {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed trace, stopping this input: {}", e);
                report.truncated += 1;
                break;
            }
        };
        match chunk {
            TraceChunk::Header(header) => {
                if trace_open {
                    printer.finalize()?;
                }
                debug!(
                    "Trace header: version {}, source {:?}",
                    header.version, header.source_name
                );
                printer.initialize(header.source_name.as_deref())?;
                trace_open = true;
                open_begins = 0;
                report.traces += 1;
            }
            TraceChunk::Begin(entry) => {
                if !trace_open {
                    printer.initialize(None)?;
                    trace_open = true;
                    report.traces += 1;
                }
                printer.print_begin(&entry)?;
                open_begins += 1;
                report.begins += 1;
            }
            TraceChunk::End(entry) => {
                if open_begins == 0 {
                    warn!(
                        "Dropping end entry at {:.9}s with no open begin",
                        entry.timestamp
                    );
                    report.unmatched_ends += 1;
                    continue;
                }
                printer.print_end(&entry)?;
                open_begins -= 1;
                report.ends += 1;
            }
            TraceChunk::Other => {}
        }
    }

    if trace_open {
        printer.finalize()?;
    }
    Ok(())
}

/// Open the output stream, `-` meaning stdout
fn open_output(path: &Path) -> Result<Box<dyn Write>> {
    if path.as_os_str() == STDIO_PATH {
        return Ok(Box::new(io::stdout()));
    }
    if path.is_dir() {
        anyhow::bail!("Output path is a directory: {}", path.display());
    }
    let file = File::create(path)?;
    Ok(Box::new(BufWriter::new(file)))
}

/// Read a whole input, `-` meaning stdin
fn read_input(path: &Path) -> io::Result<Vec<u8>> {
    if path.as_os_str() == STDIO_PATH {
        let mut data = Vec::new();
        io::stdin().lock().read_to_end(&mut data)?;
        return Ok(data);
    }
    fs::read(path)
}

/// Validate convert arguments
///
/// **Public** - can be called before execute_convert for early validation
///
/// # Arguments
/// * `args` - Arguments to validate
///
/// # Returns
/// Ok if arguments are valid, Err with message if not
pub fn validate_args(args: &ConvertArgs) -> Result<()> {
    if args.inputs.is_empty() {
        anyhow::bail!("At least one input is required");
    }

    args.format
        .parse::<OutputFormat>()
        .context("Invalid output format")?;

    let stdin_inputs = args
        .inputs
        .iter()
        .filter(|p| p.as_os_str() == STDIO_PATH)
        .count();
    if stdin_inputs > 1 {
        anyhow::bail!("stdin can only be read once");
    }

    if args.output.as_os_str() != STDIO_PATH && args.inputs.contains(&args.output) {
        anyhow::bail!("Output would overwrite input {}", args.output.display());
    }

    if let Some(summary) = &args.summary {
        if summary == &args.output {
            anyhow::bail!("Summary and output cannot be the same file");
        }
        if args.top_entries == 0 {
            anyhow::bail!("top_entries must be greater than 0");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::{BeginEntry, EndEntry, EntryKind, SourceLocation};
    use crate::protobuf::ProtobufWriter;

    fn write_trace(path: &Path) {
        let mut writer = ProtobufWriter::new(Vec::new(), CompressionMode::Dictionary);
        writer.begin_trace(Some("t.cpp")).unwrap();
        let begin = BeginEntry::new(
            EntryKind::TemplateInstantiation,
            "foo<int>",
            SourceLocation::new("t.cpp", 3, 1),
        )
        .with_timestamp(0.5);
        writer.write_begin(&begin).unwrap();
        writer.write_end(&EndEntry::new(0.6, 128)).unwrap();
        writer.end_trace().unwrap();
        fs::write(path, writer.into_inner()).unwrap();
    }

    #[test]
    fn test_validate_args_defaults() {
        assert!(validate_args(&ConvertArgs::default()).is_ok());
    }

    #[test]
    fn test_validate_args_unknown_format() {
        let args = ConvertArgs {
            format: "json".to_string(),
            ..Default::default()
        };
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_validate_args_no_inputs() {
        let args = ConvertArgs {
            inputs: Vec::new(),
            ..Default::default()
        };
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_validate_args_stdin_twice() {
        let args = ConvertArgs {
            inputs: vec![PathBuf::from("-"), PathBuf::from("-")],
            ..Default::default()
        };
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_validate_args_output_overwrites_input() {
        let args = ConvertArgs {
            inputs: vec![PathBuf::from("trace.pbf")],
            output: PathBuf::from("trace.pbf"),
            ..Default::default()
        };
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_validate_args_summary_same_as_output() {
        let args = ConvertArgs {
            output: PathBuf::from("out.yaml"),
            summary: Some(PathBuf::from("out.yaml")),
            ..Default::default()
        };
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_convert_to_text() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("trace.pbf");
        let output = dir.path().join("trace.txt");
        write_trace(&input);

        let report = execute_convert(ConvertArgs {
            inputs: vec![input],
            output: output.clone(),
            format: "text".to_string(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(report.traces, 1);
        assert_eq!(report.begins, 1);
        assert_eq!(report.ends, 1);
        let text = fs::read_to_string(&output).unwrap();
        assert!(text.starts_with("  SourceFile = t.cpp\n"));
        assert!(text.contains("  Name = foo<int>\n"));
        assert!(text.contains("  MemoryUsage = 128\n"));
    }

    #[test]
    fn test_unmatched_end_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("trace.pbf");
        let mut writer = ProtobufWriter::new(Vec::new(), CompressionMode::None);
        writer.begin_trace(Some("t.cpp")).unwrap();
        writer.write_end(&EndEntry::new(0.1, 0)).unwrap();
        let begin = BeginEntry::new(
            EntryKind::TemplateInstantiation,
            "foo<int>",
            SourceLocation::new("t.cpp", 3, 1),
        );
        writer.write_begin(&begin).unwrap();
        writer.write_end(&EndEntry::new(0.6, 0)).unwrap();
        writer.write_end(&EndEntry::new(0.7, 0)).unwrap();
        writer.end_trace().unwrap();
        fs::write(&input, writer.into_inner()).unwrap();

        let output = dir.path().join("trace.yaml");
        let report = execute_convert(ConvertArgs {
            inputs: vec![input],
            output: output.clone(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(report.unmatched_ends, 2);
        assert_eq!(report.ends, 1);
        let yaml = fs::read_to_string(&output).unwrap();
        assert_eq!(yaml.matches("IsBegin: false").count(), 1);
    }

    #[test]
    fn test_missing_input_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let report = execute_convert(ConvertArgs {
            inputs: vec![dir.path().join("missing.pbf")],
            output: dir.path().join("out.yaml"),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(report.inputs_failed, 1);
        assert_eq!(report.traces, 0);
    }

    #[test]
    fn test_unopenable_output_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = execute_convert(ConvertArgs {
            inputs: vec![dir.path().join("in.pbf")],
            output: dir.path().to_path_buf(),
            ..Default::default()
        });
        assert!(result.is_err());
    }
}
