//! YAML pipeline files and directories.
//!
//! ```yaml
//! name: Custom field names
//! priority: 30
//! transformations:
//!   - id: ecs_image
//!     type: field_name_mapping
//!     mapping:
//!       Image: process.executable
//!     rule_conditions:
//!       - type: logsource
//!         product: windows
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::pipeline::ProcessingPipeline;

impl ProcessingPipeline {
    /// Parse a pipeline definition. File pipelines never carry an allow-list.
    pub fn from_yaml(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Load one pipeline file. An unnamed pipeline is named after the file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut pipeline = Self::from_yaml(&text).map_err(|source| PipelineError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        if pipeline.name.is_empty() {
            pipeline.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        debug!(path = %path.display(), name = %pipeline.name, items = pipeline.items.len(), "loaded pipeline file");
        Ok(pipeline)
    }

    /// Load a pipeline file, or every `*.yml`/`*.yaml` file directly inside a
    /// directory sorted by file name and composed by ascending priority.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Self::from_file(path);
        }

        let io_err = |source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut files: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(path).map_err(io_err)? {
            let entry_path = entry.map_err(io_err)?.path();
            let is_yaml = entry_path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "yml" || e == "yaml");
            if is_yaml && entry_path.is_file() {
                files.push(entry_path);
            }
        }
        if files.is_empty() {
            return Err(PipelineError::EmptyDirectory(path.to_path_buf()));
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let mut pipelines = files
            .iter()
            .map(|f| Self::from_file(f))
            .collect::<Result<Vec<_>>>()?;
        pipelines.sort_by_key(|p| p.priority);

        info!(path = %path.display(), files = pipelines.len(), "loaded pipeline directory");
        Ok(pipelines.into_iter().sum())
    }
}
