//! YAML validation configuration.

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::loader::Result;

/// One validator name or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn names(&self) -> Vec<&str> {
        match self {
            OneOrMany::One(name) => vec![name.as_str()],
            OneOrMany::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// Which validators run, and per-rule exclusions.
///
/// ```yaml
/// validators:
///   - all
///   - -date_existence
/// exclusions:
///   5013332f-8a70-4e04-bcc1-06a98a2cca2e: attack_tag
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationConfig {
    /// Processed in order: `all` adds every validator, `name` adds one,
    /// `-name` removes one. An empty list means `all`.
    #[serde(default)]
    pub validators: Vec<String>,
    /// Rule id -> validators that must not report issues for that rule.
    #[serde(default)]
    pub exclusions: IndexMap<String, OneOrMany>,
}

impl ValidationConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }
}
