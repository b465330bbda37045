//! Output sinks: standard output, a single file, or one file per rule.

mod dispatcher;
mod encoding;
mod fanout;

use std::path::{Path, PathBuf};

pub use dispatcher::{ConversionDispatcher, DispatchReport, OutputSettings};
pub use encoding::TextEncoding;
#[cfg(test)]
pub use fanout::{FanOutReport, WriteFailure};

/// Where conversion output goes. Built once per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputPlan {
    Stdout,
    File(PathBuf),
    /// One file per rule below `dir`, keeping `nesting_level` trailing
    /// segments of each rule's source path.
    FanOut { dir: PathBuf, nesting_level: usize },
}

impl OutputPlan {
    /// `-` or no `--output` means standard output.
    pub fn from_args(output: Option<&Path>, output_dir: Option<&Path>, nesting_level: usize) -> Self {
        match (output, output_dir) {
            (_, Some(dir)) => OutputPlan::FanOut {
                dir: dir.to_path_buf(),
                nesting_level: nesting_level.max(1),
            },
            (Some(path), None) if path.as_os_str() != "-" => OutputPlan::File(path.to_path_buf()),
            _ => OutputPlan::Stdout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_from_args() {
        assert_eq!(OutputPlan::from_args(None, None, 1), OutputPlan::Stdout);
        assert_eq!(OutputPlan::from_args(Some(Path::new("-")), None, 1), OutputPlan::Stdout);
        assert_eq!(
            OutputPlan::from_args(Some(Path::new("out.txt")), None, 1),
            OutputPlan::File(PathBuf::from("out.txt"))
        );
        assert_eq!(
            OutputPlan::from_args(None, Some(Path::new("out")), 0),
            OutputPlan::FanOut {
                dir: PathBuf::from("out"),
                nesting_level: 1
            }
        );
    }
}
