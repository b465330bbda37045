//! The backend trait and static backend descriptions.

use sigma_pipeline::ProcessingPipeline;
use sigma_rules::validation::fuzzy::fuzzy_match;
use sigma_rules::SigmaCollection;

use crate::error::{BackendError, ConversionError, Result};
use crate::options::{validate_options, BackendOptions, OptionSpec};
use crate::result::{Conversion, ResultKind};

/// A target query language.
pub trait Backend {
    fn descriptor(&self) -> &'static BackendDescriptor;

    /// Convert every rule of `rules` into `format`.
    fn convert(&self, rules: &SigmaCollection, format: &str) -> std::result::Result<Conversion, ConversionError>;
}

/// Everything a backend needs at construction time.
#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
    /// Fully resolved pipeline, backend pipeline included.
    pub pipeline: ProcessingPipeline,
    pub options: BackendOptions,
    /// Record unconvertible rules instead of failing on the first one.
    pub collect_errors: bool,
}

/// An output format offered by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ResultKind,
}

/// Static description of a backend plus its factory.
pub struct BackendDescriptor {
    pub identifier: &'static str,
    pub text: &'static str,
    pub formats: &'static [FormatInfo],
    /// Conversion without any pipeline makes no sense for this backend.
    pub requires_pipeline: bool,
    /// Applied before every user pipeline.
    pub backend_pipeline: Option<fn() -> ProcessingPipeline>,
    pub options: &'static [OptionSpec],
    pub factory: fn(&'static BackendDescriptor, BackendConfig) -> Box<dyn Backend>,
}

impl BackendDescriptor {
    pub fn format(&self, name: &str) -> Result<&'static FormatInfo> {
        match self.formats.iter().find(|f| f.name == name) {
            Some(format) => Ok(format),
            None => {
                let names: Vec<&str> = self.formats.iter().map(|f| f.name).collect();
                Err(BackendError::UnknownFormat {
                    backend: self.identifier.to_string(),
                    format: name.to_string(),
                    suggestion: fuzzy_match(name, &names).map(str::to_string),
                })
            }
        }
    }

    pub fn backend_pipeline(&self) -> Option<ProcessingPipeline> {
        self.backend_pipeline.map(|factory| factory())
    }

    /// Validate options and build the backend.
    pub fn create(&'static self, config: BackendConfig) -> Result<Box<dyn Backend>> {
        validate_options(self.identifier, self.options, &config.options)?;
        Ok((self.factory)(self, config))
    }
}

impl std::fmt::Debug for BackendDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendDescriptor")
            .field("identifier", &self.identifier)
            .field("requires_pipeline", &self.requires_pipeline)
            .finish_non_exhaustive()
    }
}
