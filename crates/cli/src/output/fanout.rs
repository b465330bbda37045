//! One output file per converted rule, mirroring the input tree.

use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Component, Path, PathBuf};

use sigma_rules::RuleSource;
use tracing::{debug, warn};

use crate::error::{CliError, Result};

/// Output path for a rule: the last `nesting_level` segments of its source
/// path, re-rooted under `root`.
///
/// Document `N > 0` of a multi-document file gets `N` inserted before the
/// extension (`multi.yml`, `multi.1.yml`, ...).
pub fn fan_out_path(root: &Path, source: &Path, document: usize, nesting_level: usize) -> PathBuf {
    let segments: Vec<&OsStr> = source
        .components()
        .filter_map(|c| match c {
            Component::Normal(segment) => Some(segment),
            _ => None,
        })
        .collect();
    let keep = nesting_level.min(segments.len());
    let mut path = segments[segments.len() - keep..]
        .iter()
        .fold(root.to_path_buf(), |path, segment| path.join(segment));
    if document > 0 {
        let name = numbered_file_name(&path, document);
        path.set_file_name(name);
    }
    path
}

fn numbered_file_name(path: &Path, document: usize) -> OsString {
    let mut name = path.file_stem().unwrap_or_default().to_os_string();
    name.push(format!(".{}", document));
    if let Some(extension) = path.extension() {
        name.push(".");
        name.push(extension);
    }
    name
}

/// A rule whose output file could not be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub rule: String,
    pub path: Option<PathBuf>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub written: usize,
    pub attempted: usize,
    pub failures: Vec<WriteFailure>,
}

impl FanOutReport {
    /// Nothing written fails the run; so does any failure unless best effort.
    pub fn failed(&self, best_effort: bool) -> bool {
        self.written == 0 || (!best_effort && !self.failures.is_empty())
    }
}

pub struct FanOutWriter<'a> {
    root: &'a Path,
    nesting_level: usize,
    seen: HashSet<PathBuf>,
    report: FanOutReport,
}

impl<'a> FanOutWriter<'a> {
    pub fn new(root: &'a Path, nesting_level: usize) -> Self {
        Self {
            root,
            nesting_level: nesting_level.max(1),
            seen: HashSet::new(),
            report: FanOutReport::default(),
        }
    }

    /// Write one rule's output.
    ///
    /// Only a path collision (an existing plain file where a directory is
    /// needed) is returned as an error; other failures are recorded and the
    /// caller moves on to the next rule.
    pub fn write(&mut self, rule: &str, source: Option<&RuleSource>, content: &[u8]) -> Result<()> {
        self.report.attempted += 1;

        let Some((path, document)) = source.and_then(|s| Some((s.path()?, s.document))) else {
            self.fail(rule, None, "rule was read from standard input and has no source path".to_string());
            return Ok(());
        };
        let target = fan_out_path(self.root, path, document, self.nesting_level);
        self.check_collision(&target)?;

        if !self.seen.insert(target.clone()) {
            self.fail(rule, Some(target), "output path already written for another rule".to_string());
            return Ok(());
        }

        if let Some(parent) = target.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                self.fail(rule, Some(target), e.to_string());
                return Ok(());
            }
        }
        match fs::write(&target, content) {
            Ok(()) => {
                debug!(rule, path = %target.display(), "wrote rule output");
                self.report.written += 1;
            }
            Err(e) => self.fail(rule, Some(target), e.to_string()),
        }
        Ok(())
    }

    pub fn finish(self) -> FanOutReport {
        self.report
    }

    fn check_collision(&self, target: &Path) -> Result<()> {
        let mut current = self.root.to_path_buf();
        if current.exists() && !current.is_dir() {
            return Err(CliError::PathCollision(current));
        }
        let relative = target.strip_prefix(self.root).unwrap_or(target);
        if let Some(parent) = relative.parent() {
            for segment in parent.components() {
                current.push(segment);
                if current.exists() && !current.is_dir() {
                    return Err(CliError::PathCollision(current));
                }
            }
        }
        Ok(())
    }

    fn fail(&mut self, rule: &str, path: Option<PathBuf>, reason: String) {
        warn!(rule, path = ?path, reason = %reason, "failed to write rule output");
        self.report.failures.push(WriteFailure {
            rule: rule.to_string(),
            path,
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigma_rules::SourceOrigin;
    use tempfile::TempDir;

    fn file(path: &str) -> RuleSource {
        RuleSource::new(SourceOrigin::File(PathBuf::from(path)), 0)
    }

    #[test]
    fn path_keeps_last_segments() {
        let root = Path::new("out");
        let source = Path::new("rules/windows/group_one/r1.yml");
        assert_eq!(fan_out_path(root, source, 0, 1), PathBuf::from("out/r1.yml"));
        assert_eq!(fan_out_path(root, source, 0, 2), PathBuf::from("out/group_one/r1.yml"));
        assert_eq!(fan_out_path(root, source, 0, 9), PathBuf::from("out/rules/windows/group_one/r1.yml"));
    }

    #[test]
    fn path_ignores_root_and_dot_segments() {
        let root = Path::new("out");
        assert_eq!(
            fan_out_path(root, Path::new("/abs/./x/r.yml"), 0, 3),
            PathBuf::from("out/abs/x/r.yml")
        );
    }

    #[test]
    fn later_documents_get_numbered_paths() {
        let root = Path::new("out");
        let source = Path::new("rules/g2/multi.yml");
        assert_eq!(fan_out_path(root, source, 0, 2), PathBuf::from("out/g2/multi.yml"));
        assert_eq!(fan_out_path(root, source, 1, 2), PathBuf::from("out/g2/multi.1.yml"));
        assert_eq!(fan_out_path(root, Path::new("rules/noext"), 3, 1), PathBuf::from("out/noext.3"));
    }

    #[test]
    fn writes_mirror_the_input_tree() {
        let out = TempDir::new().unwrap();
        let mut writer = FanOutWriter::new(out.path(), 2);
        writer.write("r1", Some(&file("in/group_one/r1.yml")), b"q1").unwrap();
        writer.write("r2", Some(&file("in/group_two/r2.yml")), b"q2").unwrap();
        let report = writer.finish();

        assert_eq!(report.written, 2);
        assert_eq!(report.attempted, 2);
        assert!(!report.failed(false));
        assert_eq!(fs::read(out.path().join("group_one/r1.yml")).unwrap(), b"q1");
        assert_eq!(fs::read(out.path().join("group_two/r2.yml")).unwrap(), b"q2");
    }

    #[test]
    fn plain_file_in_the_way_is_a_collision() {
        let out = TempDir::new().unwrap();
        fs::write(out.path().join("group_one"), "not a directory").unwrap();

        let mut writer = FanOutWriter::new(out.path(), 2);
        let err = writer
            .write("r1", Some(&file("in/group_one/r1.yml")), b"q1")
            .unwrap_err();
        assert!(matches!(err, CliError::PathCollision(p) if p == out.path().join("group_one")));
    }

    #[test]
    fn per_rule_failures_are_recorded() {
        let out = TempDir::new().unwrap();
        let mut writer = FanOutWriter::new(out.path(), 1);
        writer.write("a", Some(&file("x/r.yml")), b"1").unwrap();
        writer.write("b", Some(&file("y/r.yml")), b"2").unwrap();
        writer.write("c", Some(&RuleSource::new(SourceOrigin::Stdin, 0)), b"3").unwrap();
        let report = writer.finish();

        assert_eq!(report.written, 1);
        assert_eq!(report.attempted, 3);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].rule, "b");
        assert_eq!(report.failures[0].path, Some(out.path().join("r.yml")));
        assert!(report.failed(false));
        assert!(!report.failed(true));
        assert_eq!(fs::read(out.path().join("r.yml")).unwrap(), b"1");
    }

    #[test]
    fn nothing_written_always_fails() {
        assert!(FanOutReport::default().failed(true));
    }
}
