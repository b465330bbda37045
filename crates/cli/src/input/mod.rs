//! Rule input: path expansion and aggregation.

mod aggregate;
mod paths;

pub use aggregate::RuleAggregator;
pub use paths::{PathResolver, DEFAULT_FILE_PATTERN, STDIN_MARKER};
