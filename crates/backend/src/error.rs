//! Error types for backend construction and rule conversion.

use sigma_rules::validation::fuzzy::did_you_mean;

/// Failures while selecting or configuring a backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("unknown backend '{name}'{}", did_you_mean(.suggestion))]
    UnknownBackend {
        name: String,
        suggestion: Option<String>,
    },

    #[error("backend '{backend}' has no output format '{format}'{}", did_you_mean(.suggestion))]
    UnknownFormat {
        backend: String,
        format: String,
        suggestion: Option<String>,
    },

    #[error("backend '{backend}' does not support option '{option}'")]
    UnsupportedOption { option: String, backend: String },

    #[error("invalid value for option '{option}' of backend '{backend}': expected {expected}")]
    InvalidOption {
        option: String,
        backend: String,
        expected: &'static str,
    },
}

/// Failures while converting rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    /// A single rule could not be converted and errors are not collected.
    #[error("cannot convert rule {rule}: {reason}")]
    Rule { rule: String, reason: String },

    #[error("backend '{backend}' has no output format '{format}'")]
    UnsupportedFormat { backend: String, format: String },
}

pub type Result<T> = std::result::Result<T, BackendError>;
