//! Rule validation: pluggable validators producing severity-ranked issues.
//!
//! A [`ValidatorRegistry`] names the available validators; a [`SigmaValidator`]
//! runs a selected set over a rule collection, honouring per-rule exclusions
//! from a [`ValidationConfig`].

mod checks;
mod config;

pub mod fuzzy;

use std::collections::{HashMap, HashSet};
use std::fmt;

use indexmap::IndexMap;
use tracing::debug;

use crate::loader::{Result, RuleError};
use crate::schema::RuleDocument;

pub use checks::*;
pub use config::{OneOrMany, ValidationConfig};

// ── Result types ────────────────────────────────────────────────────

/// How serious a validation issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        };
        f.write_str(s)
    }
}

/// A rule an issue refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRule {
    pub id: Option<String>,
    pub label: String,
}

impl IssueRule {
    pub fn of(rule: &RuleDocument) -> Self {
        Self {
            id: rule.meta().id.clone(),
            label: rule.label(),
        }
    }
}

/// A non-blocking finding about one or more rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Issue type name, e.g. `IdentifierExistenceIssue`.
    pub issue: &'static str,
    /// Name of the validator that produced the issue.
    pub validator: &'static str,
    pub severity: Severity,
    pub description: &'static str,
    pub rules: Vec<IssueRule>,
    /// Extra `key=value` context, e.g. `tag=attack.t1059`.
    pub detail: Option<String>,
}

/// A rule check. Validators may keep state across rules and report
/// cross-rule issues from [`Validator::finalize`].
pub trait Validator {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn validate(&mut self, rule: &RuleDocument) -> Vec<ValidationIssue>;
    fn finalize(&mut self) -> Vec<ValidationIssue> {
        Vec::new()
    }
}

// ── Registry ────────────────────────────────────────────────────────

/// Static description of a registered validator.
#[derive(Clone, Copy)]
pub struct ValidatorInfo {
    pub name: &'static str,
    pub description: &'static str,
    factory: fn() -> Box<dyn Validator>,
}

impl ValidatorInfo {
    pub fn create(&self) -> Box<dyn Validator> {
        (self.factory)()
    }
}

/// Named validators available to `check`.
pub struct ValidatorRegistry {
    entries: IndexMap<&'static str, ValidatorInfo>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Registry with every validator shipped by this crate.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for factory in builtin_factories() {
            let sample = factory();
            registry.entries.insert(
                sample.name(),
                ValidatorInfo {
                    name: sample.name(),
                    description: sample.description(),
                    factory: *factory,
                },
            );
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<&ValidatorInfo> {
        self.entries.get(name.to_ascii_lowercase().as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidatorInfo> {
        self.entries.values()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }

    fn unknown(&self, name: &str) -> RuleError {
        RuleError::UnknownValidator {
            name: name.to_string(),
            suggestion: fuzzy::fuzzy_match(name, &self.names()).map(str::to_string),
        }
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// ── Runner ──────────────────────────────────────────────────────────

/// Runs a set of validators over rules.
pub struct SigmaValidator {
    validators: Vec<Box<dyn Validator>>,
    /// Rule id -> lower-cased validator names excluded for it.
    exclusions: HashMap<String, HashSet<String>>,
}

impl SigmaValidator {
    pub fn new(validators: Vec<Box<dyn Validator>>) -> Self {
        Self {
            validators,
            exclusions: HashMap::new(),
        }
    }

    /// Every registered validator except the named ones.
    ///
    /// Unknown names in `excluded` are ignored; callers report them.
    pub fn excluding(registry: &ValidatorRegistry, excluded: &[String]) -> Self {
        let excluded: HashSet<String> = excluded.iter().map(|e| e.to_ascii_lowercase()).collect();
        Self::new(
            registry
                .iter()
                .filter(|info| !excluded.contains(info.name))
                .map(ValidatorInfo::create)
                .collect(),
        )
    }

    /// Build the validator set described by a validation config.
    pub fn from_config(config: &ValidationConfig, registry: &ValidatorRegistry) -> Result<Self> {
        let mut selected: IndexMap<&'static str, ()> = IndexMap::new();

        if config.validators.is_empty() {
            selected.extend(registry.names().into_iter().map(|n| (n, ())));
        }
        for entry in &config.validators {
            match entry.strip_prefix('-') {
                Some(name) => {
                    let info = registry.get(name).ok_or_else(|| registry.unknown(name))?;
                    selected.shift_remove(info.name);
                }
                None if entry.eq_ignore_ascii_case("all") => {
                    selected.extend(registry.names().into_iter().map(|n| (n, ())));
                }
                None => {
                    let info = registry.get(entry).ok_or_else(|| registry.unknown(entry))?;
                    selected.insert(info.name, ());
                }
            }
        }

        let mut exclusions: HashMap<String, HashSet<String>> = HashMap::new();
        for (rule_id, names) in &config.exclusions {
            for name in names.names() {
                let info = registry.get(name).ok_or_else(|| registry.unknown(name))?;
                exclusions
                    .entry(rule_id.clone())
                    .or_default()
                    .insert(info.name.to_string());
            }
        }

        let validators = selected
            .keys()
            .filter_map(|name| registry.get(name))
            .map(ValidatorInfo::create)
            .collect();
        Ok(Self {
            validators,
            exclusions,
        })
    }

    pub fn validator_names(&self) -> Vec<&'static str> {
        self.validators.iter().map(|v| v.name()).collect()
    }

    fn is_excluded(&self, rule_id: Option<&str>, validator: &str) -> bool {
        rule_id
            .and_then(|id| self.exclusions.get(id))
            .is_some_and(|names| names.contains(validator))
    }

    /// Validate all rules, then collect cross-rule issues.
    pub fn validate_rules<'a>(
        &mut self,
        rules: impl IntoIterator<Item = &'a RuleDocument>,
    ) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        for rule in rules {
            let rule_id = rule.meta().id.clone();
            for index in 0..self.validators.len() {
                let name = self.validators[index].name();
                if self.is_excluded(rule_id.as_deref(), name) {
                    debug!(rule = %rule.label(), validator = name, "validator excluded for rule");
                    continue;
                }
                issues.extend(self.validators[index].validate(rule));
            }
        }

        for index in 0..self.validators.len() {
            let finalized = self.validators[index].finalize();
            issues.extend(finalized.into_iter().filter(|issue| {
                !issue
                    .rules
                    .iter()
                    .all(|r| self.is_excluded(r.id.as_deref(), issue.validator))
            }));
        }

        issues
    }
}

#[cfg(test)]
mod tests;
