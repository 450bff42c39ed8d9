//! Configuration and constants for the trace tools.

use crate::protobuf::CompressionMode;
use std::path::PathBuf;

/// Version written into every trace header
pub const TRACE_FORMAT_VERSION: u32 = 1;

/// Output format used when none is requested
pub const DEFAULT_FORMAT: &str = "yaml";

/// Name compression level used when none is requested (dictionary ids)
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 2;

/// Path meaning stdin for inputs and stdout for outputs
pub const STDIO_PATH: &str = "-";

/// Number of slowest instantiations kept in a trace summary
pub const DEFAULT_TOP_ENTRIES: usize = 20;

// Wire types of the tagged framing. Only 0, 1 and 2 are produced,
// 5 must still be skippable.
pub const WIRE_VARINT: u32 = 0;
pub const WIRE_FIXED64: u32 = 1;
pub const WIRE_LENGTH_DELIMITED: u32 = 2;
pub const WIRE_FIXED32: u32 = 5;

/// Display names of the entry kinds, indexed by wire ordinal
pub const KIND_NAMES: &[&str] = &[
    "TemplateInstantiation",
    "DefaultTemplateArgumentInstantiation",
    "DefaultFunctionArgumentInstantiation",
    "ExplicitTemplateArgumentSubstitution",
    "DeducedTemplateArgumentSubstitution",
    "PriorTemplateArgumentSubstitution",
    "DefaultTemplateArgumentChecking",
    "ExceptionSpecInstantiation",
    "DeclaringSpecialMember",
    "DefiningSynthesizedFunction",
    "Memoization",
];

/// Format names accepted by the writer factory
pub const FORMAT_NAMES: &[&str] = &[
    "yaml",
    "xml",
    "text",
    "graphml",
    "graphviz",
    "nestedxml",
    "protobuf",
];

/// Settings of an in-process tracer
///
/// **Public** - built by producers, consumed by `Tracer::new`
#[derive(Debug, Clone, PartialEq)]
pub struct TracerConfig {
    /// Output path, `-` for stdout
    pub output: PathBuf,

    /// Output format name, see [`FORMAT_NAMES`]
    pub format: String,

    /// Template name compression of the protobuf format
    pub compression: CompressionMode,

    /// Write every entry as soon as it is accepted
    pub safe_mode: bool,

    /// Skip entries instantiated from system headers
    pub ignore_system: bool,

    /// Optional blacklist file
    pub blacklist: Option<PathBuf>,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from(STDIO_PATH),
            format: "protobuf".to_string(),
            compression: CompressionMode::from_level(DEFAULT_COMPRESSION_LEVEL),
            safe_mode: false,
            ignore_system: false,
            blacklist: None,
        }
    }
}

impl TracerConfig {
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_compression(mut self, compression: CompressionMode) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_safe_mode(mut self, safe_mode: bool) -> Self {
        self.safe_mode = safe_mode;
        self
    }

    pub fn with_ignore_system(mut self, ignore_system: bool) -> Self {
        self.ignore_system = ignore_system;
        self
    }

    pub fn with_blacklist(mut self, blacklist: impl Into<PathBuf>) -> Self {
        self.blacklist = Some(blacklist.into());
        self
    }

    /// Whether output goes to stdout
    pub fn is_stdout(&self) -> bool {
        self.output.as_os_str() == STDIO_PATH
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracer_config_defaults() {
        let config = TracerConfig::default();
        assert!(config.is_stdout());
        assert_eq!(config.format, "protobuf");
        assert_eq!(config.compression, CompressionMode::Dictionary);
        assert!(!config.safe_mode);
        assert!(config.blacklist.is_none());
    }

    #[test]
    fn test_tracer_config_builders() {
        let config = TracerConfig::default()
            .with_output("trace.pbf")
            .with_format("xml")
            .with_safe_mode(true)
            .with_blacklist("bl.txt");
        assert!(!config.is_stdout());
        assert_eq!(config.format, "xml");
        assert!(config.safe_mode);
        assert_eq!(config.blacklist, Some(PathBuf::from("bl.txt")));
    }

    #[test]
    fn test_kind_names_cover_all_ordinals() {
        assert_eq!(KIND_NAMES.len(), 11);
        assert_eq!(KIND_NAMES[10], "Memoization");
    }
}
