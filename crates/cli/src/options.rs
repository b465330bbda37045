//! Folding repeated `--backend-option key=value` arguments.

use indexmap::IndexMap;
use sigma_backend::{BackendOptions, OptionScalar, OptionValue};

use crate::error::{CliError, Result};

/// Split `key=value` at the first `=`. The key must not be empty.
pub fn parse_key_value(raw: &str) -> Result<(&str, &str)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value)),
        _ => Err(CliError::MalformedOption(raw.to_string())),
    }
}

/// Accumulates option values per key in first-seen order.
#[derive(Debug, Default)]
pub struct BackendOptionMerger {
    values: IndexMap<String, Vec<OptionScalar>>,
}

impl BackendOptionMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one value. Integers are recognised per value.
    pub fn push(&mut self, key: &str, raw_value: &str) {
        self.values
            .entry(key.to_string())
            .or_default()
            .push(OptionScalar::parse(raw_value));
    }

    /// A key seen once becomes a scalar; repeated keys keep all values.
    pub fn finish(self) -> BackendOptions {
        self.values
            .into_iter()
            .map(|(key, mut values)| {
                let value = if values.len() == 1 {
                    OptionValue::Single(values.remove(0))
                } else {
                    OptionValue::Multiple(values)
                };
                (key, value)
            })
            .collect()
    }

    /// Merge raw `key=value` arguments.
    ///
    /// Every entry is checked before anything is accumulated.
    pub fn merge<S: AsRef<str>>(raw: &[S]) -> Result<BackendOptions> {
        let pairs = raw
            .iter()
            .map(|entry| parse_key_value(entry.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let mut merger = Self::new();
        for (key, value) in pairs {
            merger.push(key, value);
        }
        Ok(merger.finish())
    }
}
