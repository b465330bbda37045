//! Core [`RuleLoader`]: file and stream loading with progress reporting.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::collection::{CollectionError, SigmaCollection};
use crate::schema::SourceOrigin;

/// Passive observer notified while a rule set is parsed.
///
/// Observers must not influence processing order; they only see it.
pub trait ProgressObserver {
    /// Called once before the first file with the number of files to parse.
    fn started(&mut self, _total: usize) {}

    /// Called after each file has been parsed.
    fn advanced(&mut self, done: usize, total: usize, path: &Path);

    /// Called once after the last file.
    fn finished(&mut self) {}
}

/// Observer that ignores all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn advanced(&mut self, _done: usize, _total: usize, _path: &Path) {}
}

/// Loads rule files and streams into [`SigmaCollection`]s.
pub struct RuleLoader<'o> {
    observer: Box<dyn ProgressObserver + 'o>,
}

impl Default for RuleLoader<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'o> RuleLoader<'o> {
    /// Create a loader without progress reporting.
    pub fn new() -> Self {
        Self {
            observer: Box::new(NoProgress),
        }
    }

    /// Report per-file progress to `observer`.
    pub fn with_observer(mut self, observer: impl ProgressObserver + 'o) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Rule text must be UTF-8; anything else is a decode error for `origin`.
    fn parse_bytes(&self, bytes: &[u8], origin: SourceOrigin) -> SigmaCollection {
        match std::str::from_utf8(bytes) {
            Ok(text) => SigmaCollection::from_yaml(text, origin),
            Err(e) => {
                let message = e.to_string();
                warn!(origin = %origin, error = %message, "failed to decode rule text");
                SigmaCollection::new(Vec::new(), vec![CollectionError::Decode { origin, message }])
            }
        }
    }

    /// Parse a single rule file.
    ///
    /// A read failure is recorded as a collection error attributed to the path.
    pub fn load_file(&self, path: &Path) -> SigmaCollection {
        let origin = SourceOrigin::File(path.to_path_buf());
        match fs::read(path) {
            Ok(bytes) => self.parse_bytes(&bytes, origin),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read rule file");
                SigmaCollection::new(
                    Vec::new(),
                    vec![CollectionError::Io {
                        origin,
                        message: e.to_string(),
                    }],
                )
            }
        }
    }

    /// Parse one text document from a reader (standard input).
    pub fn load_reader(&self, mut reader: impl Read) -> SigmaCollection {
        let mut bytes = Vec::new();
        match reader.read_to_end(&mut bytes) {
            Ok(_) => self.parse_bytes(&bytes, SourceOrigin::Stdin),
            Err(e) => {
                warn!(error = %e, "failed to read rules from standard input");
                SigmaCollection::new(
                    Vec::new(),
                    vec![CollectionError::Io {
                        origin: SourceOrigin::Stdin,
                        message: e.to_string(),
                    }],
                )
            }
        }
    }

    /// Parse all files in order and merge them into one collection.
    pub fn load_ruleset(&mut self, paths: &[PathBuf]) -> SigmaCollection {
        let total = paths.len();
        self.observer.started(total);

        let mut parts = Vec::with_capacity(total);
        for (i, path) in paths.iter().enumerate() {
            debug!(path = %path.display(), "parsing rule file");
            parts.push(self.load_file(path));
            self.observer.advanced(i + 1, total, path);
        }
        self.observer.finished();

        let collection = SigmaCollection::merge(parts);
        info!(
            files = total,
            rules = collection.len(),
            errors = collection.errors.len(),
            "loaded rule set"
        );
        collection
    }
}
