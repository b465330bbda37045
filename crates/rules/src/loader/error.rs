//! Error types for rule loading and validator configuration.

use crate::validation::fuzzy::did_you_mean;

/// Errors that can occur outside of per-rule parsing.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse/deserialization error.
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A validator name that is not registered.
    #[error("unknown validator '{name}'{}", did_you_mean(.suggestion))]
    UnknownValidator {
        name: String,
        suggestion: Option<String>,
    },
}

/// Result alias for rule operations.
pub type Result<T> = std::result::Result<T, RuleError>;
