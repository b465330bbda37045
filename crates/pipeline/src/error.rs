//! Error types for pipeline loading and resolution.

use std::path::PathBuf;

use sigma_rules::validation::fuzzy::did_you_mean;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Neither a registered identifier nor an existing path.
    #[error("pipeline '{specifier}' not found{}", did_you_mean(.suggestion))]
    NotFound {
        specifier: String,
        suggestion: Option<String>,
    },

    #[error("cannot read pipeline {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid pipeline definition {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("pipeline directory {} contains no *.yml or *.yaml files", .0.display())]
    EmptyDirectory(PathBuf),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
