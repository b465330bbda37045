//! Structured per-rule parse errors.

use std::fmt;

/// Category of a rule parse error, used for grouping in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParseErrorKind {
    /// The document is not a YAML mapping.
    InvalidDocument,
    /// A required field is absent.
    MissingField,
    /// A field has the wrong YAML type.
    InvalidType,
    /// A field has the right type but an unacceptable value.
    InvalidValue,
    /// Unknown value modifier in a detection key.
    InvalidModifier,
    /// Structurally broken search identifier.
    InvalidDetection,
}

impl ParseErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseErrorKind::InvalidDocument => "invalid document",
            ParseErrorKind::MissingField => "missing field",
            ParseErrorKind::InvalidType => "invalid type",
            ParseErrorKind::InvalidValue => "invalid value",
            ParseErrorKind::InvalidModifier => "invalid modifier",
            ParseErrorKind::InvalidDetection => "invalid detection",
        }
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A problem found while parsing one rule document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleParseError {
    pub kind: ParseErrorKind,
    /// Dotted location inside the document, e.g. `detection.selection`.
    pub path: String,
    pub message: String,
}

impl RuleParseError {
    pub fn new(kind: ParseErrorKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for RuleParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}: {}", self.kind, self.message)
        } else {
            write!(f, "{} at '{}': {}", self.kind, self.path, self.message)
        }
    }
}

impl std::error::Error for RuleParseError {}
