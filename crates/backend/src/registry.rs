//! Backends available to the CLI.

use indexmap::IndexMap;
use sigma_rules::validation::fuzzy::fuzzy_match;

use crate::backend::BackendDescriptor;
use crate::error::{BackendError, Result};
use crate::text;

pub struct BackendRegistry {
    entries: IndexMap<&'static str, &'static BackendDescriptor>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for descriptor in [&text::TEXT_QUERY_TEST, &text::SPLUNK, &text::LUCENE] {
            registry.register(descriptor);
        }
        registry
    }

    pub fn register(&mut self, descriptor: &'static BackendDescriptor) {
        self.entries.insert(descriptor.identifier, descriptor);
    }

    /// Look up a backend, suggesting the closest identifier when unknown.
    pub fn get(&self, identifier: &str) -> Result<&'static BackendDescriptor> {
        self.entries.get(identifier).copied().ok_or_else(|| BackendError::UnknownBackend {
            name: identifier.to_string(),
            suggestion: fuzzy_match(identifier, &self.identifiers()).map(str::to_string),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static BackendDescriptor> + '_ {
        self.entries.values().copied()
    }

    pub fn identifiers(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
