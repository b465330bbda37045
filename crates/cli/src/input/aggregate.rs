//! Aggregation of every input source into one rule collection.

use std::io::Read;

use sigma_rules::{RuleLoader, SigmaCollection};
use tracing::info;

use super::paths::InputSource;
use crate::error::{CliError, Result};

/// Parses input sources in order and merges them into one collection.
pub struct RuleAggregator<'o> {
    loader: RuleLoader<'o>,
}

impl<'o> RuleAggregator<'o> {
    pub fn new(loader: RuleLoader<'o>) -> Self {
        Self { loader }
    }

    /// Parse all sources, reading `stdin` for the standard-input marker.
    ///
    /// Per-rule parse errors stay on their rules and unreadable files become
    /// collection errors; neither stops the remaining sources. Correlation
    /// references are resolved once everything is merged.
    pub fn aggregate(&mut self, sources: &[InputSource], stdin: &mut dyn Read) -> Result<SigmaCollection> {
        let readable = sources
            .iter()
            .any(|s| matches!(s, InputSource::Stdin) || s.file_count() > 0);
        if !readable {
            return Err(CliError::NoInputs);
        }

        let mut parts = Vec::with_capacity(sources.len());
        for source in sources {
            match source {
                InputSource::Stdin => parts.push(self.loader.load_reader(&mut *stdin)),
                InputSource::Files { files, .. } if files.is_empty() => {}
                InputSource::Files { files, .. } => parts.push(self.loader.load_ruleset(files)),
            }
        }

        let mut collection = SigmaCollection::merge(parts);
        collection.resolve_rule_references();
        info!(
            rules = collection.len(),
            rule_errors = collection.rule_error_count(),
            collection_errors = collection.errors.len(),
            "aggregated rules"
        );
        Ok(collection)
    }
}
