//! Resolution of `--pipeline` specifiers into one composed pipeline.

use sigma_backend::BackendDescriptor;
use sigma_pipeline::{PipelineRegistry, ProcessingPipeline, ResolvedSpecifier};
use tracing::{debug, info};

use crate::error::{CliError, Result};

/// Resolves pipeline specifiers against the registry and the filesystem.
pub struct PipelineResolver<'r> {
    registry: &'r PipelineRegistry,
}

impl<'r> PipelineResolver<'r> {
    pub fn new(registry: &'r PipelineRegistry) -> Self {
        Self { registry }
    }

    /// Fail when the backend needs a pipeline and none was requested.
    ///
    /// Runs before any file is opened.
    pub fn check_required(backend: &BackendDescriptor, specifiers: &[String], without_pipeline: bool) -> Result<()> {
        if backend.requires_pipeline && specifiers.is_empty() && !without_pipeline {
            return Err(CliError::PipelineRequired {
                backend: backend.identifier.to_string(),
            });
        }
        Ok(())
    }

    /// Resolve, check and compose the requested pipelines for `backend`.
    ///
    /// Every specifier is looked up first, so a missing one is reported
    /// before compatibility. With `enforce`, all specifiers whose allow-list
    /// excludes the backend are reported together. The result starts with
    /// the backend's own pipeline, followed by the requested ones ordered by
    /// ascending priority (ties keep request order).
    pub fn resolve(
        &self,
        specifiers: &[String],
        backend: &BackendDescriptor,
        enforce: bool,
    ) -> Result<ProcessingPipeline> {
        let resolved = specifiers
            .iter()
            .map(|spec| Ok((spec, self.registry.resolve_specifier(spec)?)))
            .collect::<Result<Vec<(&String, ResolvedSpecifier<'_>)>>>()?;

        if enforce {
            let rejected: Vec<String> = resolved
                .iter()
                .filter(|(_, r)| !r.allows(backend.identifier))
                .map(|(spec, _)| spec.to_string())
                .collect();
            if !rejected.is_empty() {
                return Err(CliError::PipelineNotAllowed {
                    backend: backend.identifier.to_string(),
                    pipelines: rejected,
                });
            }
        }

        let mut requested = Vec::with_capacity(resolved.len());
        for (spec, specifier) in &resolved {
            let pipeline = specifier.load()?;
            debug!(specifier = %spec, name = %pipeline.name, priority = pipeline.priority, "loaded pipeline");
            requested.push(pipeline);
        }
        requested.sort_by_key(|p| p.priority);

        let composed: ProcessingPipeline = backend
            .backend_pipeline()
            .into_iter()
            .chain(requested)
            .sum();
        info!(
            backend = backend.identifier,
            pipeline = %composed.name,
            items = composed.items.len(),
            "resolved processing pipeline"
        );
        Ok(composed)
    }
}
