//! Expansion of input arguments into concrete rule files.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use indexmap::IndexSet;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{CliError, Result};

/// Input argument that stands for standard input.
pub const STDIN_MARKER: &str = "-";

pub const DEFAULT_FILE_PATTERN: &str = "*.yml";

/// One input argument after expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    /// The file itself, or the pattern matches below a directory.
    Files { input: PathBuf, files: Vec<PathBuf> },
}

impl InputSource {
    pub fn file_count(&self) -> usize {
        match self {
            InputSource::Stdin => 0,
            InputSource::Files { files, .. } => files.len(),
        }
    }
}

/// Turns input arguments into an ordered, duplicate-free list of sources.
#[derive(Debug, Clone)]
pub struct PathResolver {
    /// `**/<pattern>`, matched against paths relative to the scanned directory.
    recursive: Pattern,
    /// `<pattern>` itself, for files directly inside the scanned directory.
    direct: Pattern,
}

impl PathResolver {
    pub fn new(file_pattern: &str) -> Result<Self> {
        let compile = |pattern: &str| {
            Pattern::new(pattern).map_err(|e| CliError::InvalidPattern {
                pattern: file_pattern.to_string(),
                message: e.to_string(),
            })
        };
        Ok(Self {
            recursive: compile(&format!("**/{}", file_pattern))?,
            direct: compile(file_pattern)?,
        })
    }

    /// Check that every input exists, then expand directories.
    ///
    /// A file reached twice (named twice, or through overlapping directories)
    /// is kept at its first position only. Standard input is kept once.
    pub fn resolve(&self, inputs: &[PathBuf]) -> Result<Vec<InputSource>> {
        for input in inputs {
            if !is_stdin(input) && !input.exists() {
                return Err(CliError::PathNotFound(input.clone()));
            }
        }

        let mut seen: IndexSet<PathBuf> = IndexSet::new();
        let mut stdin_seen = false;
        let mut sources = Vec::with_capacity(inputs.len());

        for input in inputs {
            if is_stdin(input) {
                if !stdin_seen {
                    stdin_seen = true;
                    sources.push(InputSource::Stdin);
                }
                continue;
            }

            let candidates = if input.is_dir() {
                self.scan_directory(input)
            } else {
                vec![input.clone()]
            };
            let files: Vec<PathBuf> = candidates
                .into_iter()
                .filter(|path| seen.insert(path.clone()))
                .collect();

            debug!(input = %input.display(), files = files.len(), "resolved input");
            sources.push(InputSource::Files {
                input: input.clone(),
                files,
            });
        }

        Ok(sources)
    }

    fn scan_directory(&self, dir: &Path) -> Vec<PathBuf> {
        let options = MatchOptions {
            require_literal_separator: true,
            ..MatchOptions::new()
        };

        WalkDir::new(dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
                self.direct.matches_path_with(relative, options)
                    || self.recursive.matches_path_with(relative, options)
            })
            .map(|entry| entry.into_path())
            .collect()
    }
}

fn is_stdin(input: &Path) -> bool {
    input.as_os_str() == STDIN_MARKER
}
