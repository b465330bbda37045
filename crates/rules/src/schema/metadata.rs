//! Header fields shared by detection and correlation rules.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;

/// Rule severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleLevel {
    Informational,
    Low,
    Medium,
    High,
    Critical,
}

impl RuleLevel {
    /// Numeric severity, 1 (informational) to 5 (critical).
    pub fn value(&self) -> u32 {
        match self {
            RuleLevel::Informational => 1,
            RuleLevel::Low => 2,
            RuleLevel::Medium => 3,
            RuleLevel::High => 4,
            RuleLevel::Critical => 5,
        }
    }
}

impl fmt::Display for RuleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuleLevel::Informational => "informational",
            RuleLevel::Low => "low",
            RuleLevel::Medium => "medium",
            RuleLevel::High => "high",
            RuleLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

impl FromStr for RuleLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "informational" => Ok(RuleLevel::Informational),
            "low" => Ok(RuleLevel::Low),
            "medium" => Ok(RuleLevel::Medium),
            "high" => Ok(RuleLevel::High),
            "critical" => Ok(RuleLevel::Critical),
            other => Err(format!("unknown level: '{}'", other)),
        }
    }
}

/// Maturity status of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    Stable,
    Test,
    Experimental,
    Deprecated,
    Unsupported,
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuleStatus::Stable => "stable",
            RuleStatus::Test => "test",
            RuleStatus::Experimental => "experimental",
            RuleStatus::Deprecated => "deprecated",
            RuleStatus::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

impl FromStr for RuleStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stable" => Ok(RuleStatus::Stable),
            "test" => Ok(RuleStatus::Test),
            "experimental" => Ok(RuleStatus::Experimental),
            "deprecated" => Ok(RuleStatus::Deprecated),
            "unsupported" => Ok(RuleStatus::Unsupported),
            other => Err(format!("unknown status: '{}'", other)),
        }
    }
}

/// A namespaced tag such as `attack.t1059.001` or `cve.2021-44228`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleTag {
    pub namespace: String,
    pub name: String,
}

impl fmt::Display for RuleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

impl FromStr for RuleTag {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.split_once('.') {
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() => Ok(RuleTag {
                namespace: ns.to_string(),
                name: name.to_string(),
            }),
            _ => Err(format!("tag '{}' must have the form namespace.name", s)),
        }
    }
}

impl Serialize for RuleTag {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Metadata shared by all rule kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuleMetadata {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RuleStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<RuleTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<RuleLevel>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub falsepositives: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl RuleMetadata {
    /// Tags in the given namespace.
    pub fn tags_in<'a>(&'a self, namespace: &'a str) -> impl Iterator<Item = &'a RuleTag> + 'a {
        self.tags.iter().filter(move |t| t.namespace == namespace)
    }
}
