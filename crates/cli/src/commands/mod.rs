//! Subcommand implementations.

pub mod analyze;
pub mod check;
pub mod convert;
pub mod list;
pub mod version;

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use sigma_rules::{RuleLoader, SigmaCollection};

use crate::error::CliError;
use crate::input::{PathResolver, RuleAggregator, STDIN_MARKER};
use crate::terminal::ProgressLine;

/// How a command that ran to completion ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Reported findings exceed the configured thresholds.
    Failure,
}

/// Resolve inputs and parse every rule into one collection.
pub fn load_rules(inputs: &[PathBuf], file_pattern: &str) -> Result<SigmaCollection> {
    let sources = PathResolver::new(file_pattern)?.resolve(inputs)?;
    let loader = RuleLoader::new().with_observer(ProgressLine::new("Parsing Sigma rules"));
    let stdin = io::stdin();
    let mut stdin = stdin.lock();
    let collection = RuleAggregator::new(loader)
        .aggregate(&sources, &mut stdin)
        .context("failed to load Sigma rules")?;
    Ok(collection)
}

/// Parse filter files and directories into one collection.
///
/// Standard input is reserved for rules, so `-` is rejected.
pub fn load_filters(inputs: &[PathBuf], file_pattern: &str) -> Result<SigmaCollection> {
    if inputs.iter().any(|p| p.as_os_str() == STDIN_MARKER) {
        return Err(CliError::FilterFromStdin.into());
    }
    let sources = PathResolver::new(file_pattern)?.resolve(inputs)?;
    let collection = RuleAggregator::new(RuleLoader::new())
        .aggregate(&sources, &mut io::empty())
        .context("failed to load filters")?;
    Ok(collection)
}
