//! Blacklist rules for excluding subtrees from a trace.
//!
//! File format, one rule per line:
//!
//! ```text
//! context <regex>
//! identifier <regex>
//! ```
//!
//! Patterns of each kind are OR-combined into one regex. Other lines are
//! ignored.

use crate::utils::error::BlacklistError;
use log::{debug, info};
use regex::Regex;
use std::fs;
use std::path::Path;

const CONTEXT_PREFIX: &str = "context ";
const IDENTIFIER_PREFIX: &str = "identifier ";

/// Compiled context and identifier rules
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    context: Option<Regex>,
    identifier: Option<Regex>,
}

impl Blacklist {
    /// Blacklist matching nothing
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read and compile a blacklist file
    ///
    /// **Public** - used by the tracer and the converter
    ///
    /// # Errors
    /// * `BlacklistError::Io` - file cannot be read
    /// * `BlacklistError::InvalidRegex` - a combined pattern does not compile
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BlacklistError> {
        let path = path.as_ref();
        debug!("Reading blacklist from: {}", path.display());
        let text = fs::read_to_string(path)?;
        let blacklist = Self::parse(&text)?;
        info!(
            "Loaded blacklist {} (context rules: {}, identifier rules: {})",
            path.display(),
            blacklist.context.is_some(),
            blacklist.identifier.is_some()
        );
        Ok(blacklist)
    }

    /// Compile blacklist rules from text
    pub fn parse(text: &str) -> Result<Self, BlacklistError> {
        let mut context = Vec::new();
        let mut identifier = Vec::new();

        for line in text.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if let Some(pattern) = line.strip_prefix(CONTEXT_PREFIX) {
                context.push(pattern);
            } else if let Some(pattern) = line.strip_prefix(IDENTIFIER_PREFIX) {
                identifier.push(pattern);
            } else if !line.trim().is_empty() {
                debug!("Ignoring blacklist line: {}", line);
            }
        }

        Ok(Self {
            context: combine(&context)?,
            identifier: combine(&identifier)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.context.is_none() && self.identifier.is_none()
    }

    /// Whether an entry named `name` should be skipped with its subtree
    pub fn matches(&self, name: &str) -> bool {
        self.context.as_ref().is_some_and(|re| re.is_match(name))
            || self.identifier.as_ref().is_some_and(|re| re.is_match(name))
    }
}

/// `(a)|(b)|...`, or `None` when there are no patterns
fn combine(patterns: &[&str]) -> Result<Option<Regex>, BlacklistError> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let combined = patterns
        .iter()
        .map(|p| format!("({p})"))
        .collect::<Vec<_>>()
        .join("|");
    Ok(Some(Regex::new(&combined)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_rules() {
        let blacklist = Blacklist::parse(
            "context std::.*\r\nidentifier ^boost::\n# comment\nidentifier detail\n",
        )
        .unwrap();

        assert!(blacklist.matches("std::vector<int>"));
        assert!(blacklist.matches("boost::mpl::if_<T>"));
        assert!(blacklist.matches("ns::detail::impl"));
        assert!(!blacklist.matches("my::boost::thing"));
        assert!(!blacklist.matches("foo<int>"));
    }

    #[test]
    fn test_empty_blacklist_matches_nothing() {
        let blacklist = Blacklist::parse("\n\nunrelated line\n").unwrap();
        assert!(blacklist.is_empty());
        assert!(!blacklist.matches(""));
        assert!(!blacklist.matches("anything"));
    }

    #[test]
    fn test_invalid_regex() {
        let result = Blacklist::parse("identifier foo(\n");
        assert!(matches!(result, Err(BlacklistError::InvalidRegex(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "identifier ^foo<").unwrap();
        let blacklist = Blacklist::from_file(file.path()).unwrap();
        assert!(blacklist.matches("foo<int>"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Blacklist::from_file(dir.path().join("missing.txt"));
        assert!(matches!(result, Err(BlacklistError::Io(_))));
    }
}
