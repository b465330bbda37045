//! Filesystem and stream rule loading.
//!
//! Reads rule files in the order given, parses each into a
//! [`SigmaCollection`](crate::SigmaCollection) and reports progress to a
//! passive observer. Unreadable files are recorded as collection errors and
//! never abort the remaining files.

mod core;
mod error;


pub use self::core::{NoProgress, ProgressObserver, RuleLoader};
pub use self::error::{Result, RuleError};
