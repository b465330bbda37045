//! Rule document container and accessors.

use serde::Serialize;

use super::{Detection, LogSource, RuleMetadata, RuleParseError, RuleSource};

/// A detection rule: log source plus detection logic.
#[derive(Debug, Clone, PartialEq)]
pub struct SigmaRule {
    pub meta: RuleMetadata,
    pub logsource: LogSource,
    pub detection: Detection,
    pub source: Option<RuleSource>,
    pub errors: Vec<RuleParseError>,
}

/// The `correlation` section of a correlation rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Correlation {
    #[serde(rename = "type")]
    pub kind: String,
    /// Referenced rule ids or names.
    pub rules: Vec<String>,
    #[serde(rename = "group-by", skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timespan: Option<String>,
}

/// A rule that correlates the matches of other rules.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationRule {
    pub meta: RuleMetadata,
    pub correlation: Correlation,
    /// Collection indices of the referenced rules, filled by reference resolution.
    pub resolved: Vec<usize>,
    pub source: Option<RuleSource>,
    pub errors: Vec<RuleParseError>,
}

/// The `filter` section of a filter document: the rules it targets plus
/// searches and a condition excluding events from them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    /// Ids or names of the rules the filter applies to.
    pub rules: Vec<String>,
    pub detection: Detection,
}

/// A document that narrows other rules instead of producing queries itself.
#[derive(Debug, Clone, PartialEq)]
pub struct SigmaFilter {
    pub meta: RuleMetadata,
    pub logsource: LogSource,
    pub filter: Filter,
    pub source: Option<RuleSource>,
    pub errors: Vec<RuleParseError>,
}

impl SigmaFilter {
    /// True if every logsource field the filter sets equals the rule's.
    pub fn matches_logsource(&self, logsource: &LogSource) -> bool {
        let same = |wanted: &Option<String>, actual: &Option<String>| match (wanted, actual) {
            (None, _) => true,
            (Some(w), Some(a)) => w.eq_ignore_ascii_case(a),
            (Some(_), None) => false,
        };
        same(&self.logsource.category, &logsource.category)
            && same(&self.logsource.product, &logsource.product)
            && same(&self.logsource.service, &logsource.service)
    }
}

/// A parsed rule of any supported kind.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleDocument {
    Detection(SigmaRule),
    Correlation(CorrelationRule),
    Filter(SigmaFilter),
}

impl RuleDocument {
    /// Get the rule's metadata regardless of kind.
    pub fn meta(&self) -> &RuleMetadata {
        match self {
            RuleDocument::Detection(rule) => &rule.meta,
            RuleDocument::Correlation(rule) => &rule.meta,
            RuleDocument::Filter(rule) => &rule.meta,
        }
    }

    /// Where the rule was loaded from, if known.
    pub fn source(&self) -> Option<&RuleSource> {
        match self {
            RuleDocument::Detection(rule) => rule.source.as_ref(),
            RuleDocument::Correlation(rule) => rule.source.as_ref(),
            RuleDocument::Filter(rule) => rule.source.as_ref(),
        }
    }

    /// Parse errors attached to this rule.
    pub fn errors(&self) -> &[RuleParseError] {
        match self {
            RuleDocument::Detection(rule) => &rule.errors,
            RuleDocument::Correlation(rule) => &rule.errors,
            RuleDocument::Filter(rule) => &rule.errors,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors().is_empty()
    }

    pub fn as_detection(&self) -> Option<&SigmaRule> {
        match self {
            RuleDocument::Detection(rule) => Some(rule),
            _ => None,
        }
    }

    pub fn as_correlation(&self) -> Option<&CorrelationRule> {
        match self {
            RuleDocument::Correlation(rule) => Some(rule),
            _ => None,
        }
    }

    pub fn as_filter(&self) -> Option<&SigmaFilter> {
        match self {
            RuleDocument::Filter(filter) => Some(filter),
            _ => None,
        }
    }

    /// The searches and conditions of a detection rule or a filter.
    pub fn detection(&self) -> Option<&Detection> {
        match self {
            RuleDocument::Detection(rule) => Some(&rule.detection),
            RuleDocument::Filter(filter) => Some(&filter.filter.detection),
            RuleDocument::Correlation(_) => None,
        }
    }

    /// Human-readable label: source location, else id, else title.
    pub fn label(&self) -> String {
        if let Some(source) = self.source() {
            return source.to_string();
        }
        let meta = self.meta();
        meta.id.clone().unwrap_or_else(|| meta.title.clone())
    }

    /// True if `reference` names this rule by id or by name.
    pub fn answers_to(&self, reference: &str) -> bool {
        let meta = self.meta();
        meta.id.as_deref() == Some(reference) || meta.name.as_deref() == Some(reference)
    }
}
