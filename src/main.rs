//! Templight trace converter CLI
//!
//! Reads binary templight traces and writes them out as YAML, XML, text,
//! GraphML, Graphviz, nested XML or re-encoded protobuf.

use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use std::path::PathBuf;

use templight_tools::commands::{execute_convert, validate_args, ConvertArgs};
use templight_tools::utils::config::{
    DEFAULT_COMPRESSION_LEVEL, DEFAULT_FORMAT, DEFAULT_TOP_ENTRIES, STDIO_PATH,
};

/// Convert templight traces between formats
#[derive(Parser, Debug)]
#[command(name = "templight-convert")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Binary trace files to read, `-` for stdin
    #[arg(default_value = STDIO_PATH)]
    inputs: Vec<PathBuf>,

    /// Output file, `-` for stdout
    #[arg(short, long, default_value = STDIO_PATH)]
    output: PathBuf,

    /// Output format: yaml, xml, text, graphml, graphviz, nestedxml, protobuf
    #[arg(short, long, default_value = DEFAULT_FORMAT)]
    format: String,

    /// Blacklist file of `context` and `identifier` regexes
    #[arg(short, long)]
    blacklist: Option<PathBuf>,

    /// Template name compression for protobuf output (0 none, 1 zlib, 2 dictionary)
    #[arg(short, long, default_value_t = DEFAULT_COMPRESSION_LEVEL)]
    compression: u32,

    /// Also write a JSON summary of the converted traces
    #[arg(long, env = "TEMPLIGHT_SUMMARY")]
    summary: Option<PathBuf>,

    /// Number of slowest instantiations listed in the summary
    #[arg(long, default_value_t = DEFAULT_TOP_ENTRIES)]
    top_entries: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let args = ConvertArgs {
        inputs: cli.inputs,
        output: cli.output,
        format: cli.format,
        blacklist: cli.blacklist,
        compression: cli.compression,
        summary: cli.summary,
        top_entries: cli.top_entries,
    };

    // Validate args first
    validate_args(&args)?;

    let report = execute_convert(args)?;
    if report.inputs_read == 0 && report.inputs_failed > 0 {
        anyhow::bail!("None of the {} input(s) could be read", report.inputs_failed);
    }

    Ok(())
}
