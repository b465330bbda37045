//! Conversion results.

use std::fmt;

use serde_json::Value;

/// What a backend produced, in one of five shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionResult {
    Text(String),
    Bytes(Vec<u8>),
    TextList(Vec<String>),
    /// Each record must be a JSON object.
    RecordList(Vec<Value>),
    /// Must be a JSON object.
    Record(Value),
}

impl ConversionResult {
    pub fn kind(&self) -> ResultKind {
        match self {
            ConversionResult::Text(_) => ResultKind::Text,
            ConversionResult::Bytes(_) => ResultKind::Bytes,
            ConversionResult::TextList(_) => ResultKind::TextList,
            ConversionResult::RecordList(_) => ResultKind::RecordList,
            ConversionResult::Record(_) => ResultKind::Record,
        }
    }
}

/// Result shape an output format produces, known before conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Text,
    Bytes,
    TextList,
    RecordList,
    Record,
}

impl ResultKind {
    /// Shapes with one item per converted rule.
    pub fn is_per_rule(&self) -> bool {
        matches!(self, ResultKind::TextList | ResultKind::RecordList)
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResultKind::Text => "text",
            ResultKind::Bytes => "bytes",
            ResultKind::TextList => "text list",
            ResultKind::RecordList => "record list",
            ResultKind::Record => "record",
        };
        f.write_str(s)
    }
}

/// A rule the backend could not convert while collecting errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRule {
    /// Index of the rule in the converted collection.
    pub index: usize,
    /// Source location (or id/title) of the rule.
    pub source: String,
    pub reason: String,
}

/// Output of [`crate::Backend::convert`].
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub result: ConversionResult,
    /// `converted[i]` is the collection index of the rule behind list item `i`.
    pub converted: Vec<usize>,
    pub skipped: Vec<SkippedRule>,
}
