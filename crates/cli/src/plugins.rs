use sigma_backend::BackendRegistry;
use sigma_pipeline::PipelineRegistry;
use sigma_rules::validation::ValidatorRegistry;

/// Backends, pipelines and validators available to this process.
///
/// Built once in `main` and passed by reference to every command.
pub struct Plugins {
    pub backends: BackendRegistry,
    pub pipelines: PipelineRegistry,
    pub validators: ValidatorRegistry,
}

impl Plugins {
    pub fn builtin() -> Self {
        Self {
            backends: BackendRegistry::builtin(),
            pipelines: PipelineRegistry::builtin(),
            validators: ValidatorRegistry::builtin(),
        }
    }
}
