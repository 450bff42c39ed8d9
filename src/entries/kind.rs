//! Kinds of template instantiation activity.
//!
//! Ordinals are part of the binary trace format and must never be renumbered.

use crate::utils::config::KIND_NAMES;
use serde::{Serialize, Serializer};
use std::fmt;

/// Kind of a traced instantiation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    TemplateInstantiation,
    DefaultTemplateArgumentInstantiation,
    DefaultFunctionArgumentInstantiation,
    ExplicitTemplateArgumentSubstitution,
    DeducedTemplateArgumentSubstitution,
    PriorTemplateArgumentSubstitution,
    DefaultTemplateArgumentChecking,
    ExceptionSpecInstantiation,
    DeclaringSpecialMember,
    DefiningSynthesizedFunction,
    Memoization,
    /// Ordinal written by a newer producer
    Unknown(u32),
}

impl EntryKind {
    /// Map a wire ordinal to a kind
    pub fn from_ordinal(ordinal: u32) -> Self {
        match ordinal {
            0 => Self::TemplateInstantiation,
            1 => Self::DefaultTemplateArgumentInstantiation,
            2 => Self::DefaultFunctionArgumentInstantiation,
            3 => Self::ExplicitTemplateArgumentSubstitution,
            4 => Self::DeducedTemplateArgumentSubstitution,
            5 => Self::PriorTemplateArgumentSubstitution,
            6 => Self::DefaultTemplateArgumentChecking,
            7 => Self::ExceptionSpecInstantiation,
            8 => Self::DeclaringSpecialMember,
            9 => Self::DefiningSynthesizedFunction,
            10 => Self::Memoization,
            other => Self::Unknown(other),
        }
    }

    /// Wire ordinal of this kind
    pub fn ordinal(self) -> u32 {
        match self {
            Self::TemplateInstantiation => 0,
            Self::DefaultTemplateArgumentInstantiation => 1,
            Self::DefaultFunctionArgumentInstantiation => 2,
            Self::ExplicitTemplateArgumentSubstitution => 3,
            Self::DeducedTemplateArgumentSubstitution => 4,
            Self::PriorTemplateArgumentSubstitution => 5,
            Self::DefaultTemplateArgumentChecking => 6,
            Self::ExceptionSpecInstantiation => 7,
            Self::DeclaringSpecialMember => 8,
            Self::DefiningSynthesizedFunction => 9,
            Self::Memoization => 10,
            Self::Unknown(other) => other,
        }
    }

    /// Display name used by every textual format
    pub fn name(self) -> &'static str {
        KIND_NAMES
            .get(self.ordinal() as usize)
            .copied()
            .unwrap_or("Unknown")
    }
}

impl Default for EntryKind {
    fn default() -> Self {
        Self::TemplateInstantiation
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for EntryKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}
