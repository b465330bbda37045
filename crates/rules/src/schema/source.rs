//! Where a rule came from.

use std::fmt;
use std::path::{Path, PathBuf};

/// Origin of a rule document: a file on disk or standard input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceOrigin {
    File(PathBuf),
    Stdin,
}

impl fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceOrigin::File(path) => write!(f, "{}", path.display()),
            SourceOrigin::Stdin => write!(f, "<stdin>"),
        }
    }
}

/// Location of a single rule: its origin plus the zero-based YAML document index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleSource {
    pub origin: SourceOrigin,
    pub document: usize,
}

impl RuleSource {
    pub fn new(origin: SourceOrigin, document: usize) -> Self {
        Self { origin, document }
    }

    /// File path of the rule, `None` for standard input.
    pub fn path(&self) -> Option<&Path> {
        match &self.origin {
            SourceOrigin::File(path) => Some(path),
            SourceOrigin::Stdin => None,
        }
    }
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.document == 0 {
            write!(f, "{}", self.origin)
        } else {
            write!(f, "{}#{}", self.origin, self.document)
        }
    }
}
