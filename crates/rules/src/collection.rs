//! Ordered, mergeable rule collections.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::schema::{parse_document, RuleDocument, RuleSource, SourceOrigin};

/// A failure that cannot be attributed to a single rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectionError {
    /// The input could not be read.
    #[error("cannot read {origin}: {message}")]
    Io { origin: SourceOrigin, message: String },

    /// The input bytes are not valid in the requested text encoding.
    #[error("cannot decode {origin}: {message}")]
    Decode { origin: SourceOrigin, message: String },

    /// The input is not valid YAML.
    #[error("YAML syntax error in {origin}: {message}")]
    Yaml { origin: SourceOrigin, message: String },

    /// A correlation rule references a rule that is not in the collection.
    #[error("rule {rule} references unknown rule '{reference}'")]
    UnresolvedReference { rule: String, reference: String },

    /// A document given as a filter cannot be applied.
    #[error("invalid filter {filter}: {message}")]
    InvalidFilter { filter: String, message: String },
}

impl CollectionError {
    /// File path the error is attributed to, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            CollectionError::Io { origin: SourceOrigin::File(p), .. }
            | CollectionError::Decode { origin: SourceOrigin::File(p), .. }
            | CollectionError::Yaml { origin: SourceOrigin::File(p), .. } => Some(p),
            _ => None,
        }
    }
}

/// An ordered sequence of rules plus collection-level errors.
///
/// Collections are combined by [`SigmaCollection::merge`], which concatenates
/// rules and errors in argument order and never drops either.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SigmaCollection {
    pub rules: Vec<RuleDocument>,
    pub errors: Vec<CollectionError>,
}

impl SigmaCollection {
    pub fn new(rules: Vec<RuleDocument>, errors: Vec<CollectionError>) -> Self {
        Self { rules, errors }
    }

    /// Parse every YAML document in `text` into a rule record.
    ///
    /// Empty documents are ignored. A YAML syntax error stops parsing of the
    /// remaining documents and is recorded as a collection error.
    pub fn from_yaml(text: &str, origin: SourceOrigin) -> Self {
        let mut collection = Self::default();

        for (index, document) in serde_yaml::Deserializer::from_str(text).enumerate() {
            match serde_yaml::Value::deserialize(document) {
                Ok(serde_yaml::Value::Null) => continue,
                Ok(value) => {
                    let source = RuleSource::new(origin.clone(), index);
                    collection.rules.push(parse_document(&value, Some(source)));
                }
                Err(e) => {
                    warn!(origin = %origin, error = %e, "failed to parse YAML");
                    collection.errors.push(CollectionError::Yaml {
                        origin: origin.clone(),
                        message: e.to_string(),
                    });
                    break;
                }
            }
        }

        debug!(origin = %origin, rules = collection.rules.len(), "parsed rule documents");
        collection
    }

    /// Concatenate collections in order.
    pub fn merge(collections: impl IntoIterator<Item = SigmaCollection>) -> Self {
        let mut merged = Self::default();
        for collection in collections {
            merged.rules.extend(collection.rules);
            merged.errors.extend(collection.errors);
        }
        merged
    }

    /// Resolve correlation references against the whole collection.
    ///
    /// Forward references resolve because lookup happens after all sources
    /// are merged. Unresolved references become collection errors.
    pub fn resolve_rule_references(&mut self) {
        let mut unresolved = Vec::new();

        for index in 0..self.rules.len() {
            let RuleDocument::Correlation(correlation) = &self.rules[index] else {
                continue;
            };
            let mut resolved = Vec::with_capacity(correlation.correlation.rules.len());
            for reference in &correlation.correlation.rules {
                match self.rules.iter().position(|r| r.answers_to(reference)) {
                    Some(target) => resolved.push(target),
                    None => unresolved.push(CollectionError::UnresolvedReference {
                        rule: self.rules[index].label(),
                        reference: reference.clone(),
                    }),
                }
            }
            if let RuleDocument::Correlation(correlation) = &mut self.rules[index] {
                correlation.resolved = resolved;
            }
        }

        self.errors.extend(unresolved);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RuleDocument> {
        self.rules.iter()
    }

    /// Number of per-rule parse errors across all rules.
    pub fn rule_error_count(&self) -> usize {
        self.rules.iter().map(|r| r.errors().len()).sum()
    }
}

impl<'a> IntoIterator for &'a SigmaCollection {
    type Item = &'a RuleDocument;
    type IntoIter = std::slice::Iter<'a, RuleDocument>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
