//! Error taxonomy of the command-line front end.
//!
//! Every variant belongs to one class that decides the exit code:
//! usage errors exit with 2, resolution errors with 3, everything else with 1.

use std::path::PathBuf;

use sigma_backend::{BackendError, ConversionError, ResultKind};
use sigma_pipeline::PipelineError;
use sigma_rules::RuleError;

pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_USAGE: u8 = 2;
pub const EXIT_RESOLUTION: u8 = 3;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    // ── Usage ──────────────────────────────────────────────────────
    #[error(
        "processing pipeline required by backend '{backend}': choose one with --pipeline \
         (see `sigma list pipelines {backend}`) or pass --without-pipeline"
    )]
    PipelineRequired { backend: String },

    #[error("path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("no rule files found in the given inputs")]
    NoInputs,

    #[error("filters cannot be read from standard input, pass a file or directory to --filter")]
    FilterFromStdin,

    #[error("invalid file pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("malformed backend option '{0}', expected key=value")]
    MalformedOption(String),

    #[error("output format '{format}' produces {kind}, which cannot be written one file per rule")]
    FanOutUnsupported { format: String, kind: ResultKind },

    #[error("backend returns binary output, provide an output file with --output/-o")]
    BinaryToTerminal,

    #[error("invalid validation configuration: {0}")]
    ValidationConfig(#[from] RuleError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    // ── Resolution ─────────────────────────────────────────────────
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(
        "the following pipelines are not intended to be used with the target {backend}: {}; \
         disable this check with --disable-pipeline-check",
        .pipelines.join(", ")
    )]
    PipelineNotAllowed {
        backend: String,
        pipelines: Vec<String>,
    },

    // ── Conversion and output ──────────────────────────────────────
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("backend contract violation: {0}")]
    ContractViolation(String),

    #[error("cannot encode output as {encoding}: character {ch:?} is not representable")]
    Encoding { encoding: &'static str, ch: char },

    #[error("output path collision: {} exists and is not a directory", .0.display())]
    PathCollision(PathBuf),

    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::PipelineRequired { .. }
            | CliError::PathNotFound(_)
            | CliError::NoInputs
            | CliError::FilterFromStdin
            | CliError::InvalidPattern { .. }
            | CliError::MalformedOption(_)
            | CliError::FanOutUnsupported { .. }
            | CliError::BinaryToTerminal
            | CliError::ValidationConfig(_) => EXIT_USAGE,
            CliError::Backend(e) => match e {
                BackendError::UnknownBackend { .. } | BackendError::UnknownFormat { .. } => EXIT_USAGE,
                BackendError::UnsupportedOption { .. } | BackendError::InvalidOption { .. } => {
                    EXIT_RESOLUTION
                }
            },
            CliError::Pipeline(_) | CliError::PipelineNotAllowed { .. } => EXIT_RESOLUTION,
            CliError::Conversion(_)
            | CliError::ContractViolation(_)
            | CliError::Encoding { .. }
            | CliError::PathCollision(_)
            | CliError::Write { .. } => EXIT_FAILURE,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
