//! Sigma rule documents and rule collections.
//!
//! This crate provides:
//! - YAML rule parsing with per-rule error capture (a malformed rule never aborts a batch)
//! - [`SigmaCollection`]: ordered, mergeable rule sets with collection-level errors
//! - File and stream loading with a passive progress observer
//! - Condition scanning (tokens and identifier checks, not a grammar)
//! - Filter documents that narrow the rules they name
//! - Rule validators driven by a YAML validation configuration

pub mod collection;
pub mod condition;
pub mod filters;
pub mod loader;
pub mod schema;
pub mod validation;

pub use collection::{CollectionError, SigmaCollection};
pub use loader::{NoProgress, ProgressObserver, RuleError, RuleLoader};
pub use schema::{RuleDocument, RuleSource, SigmaFilter, SigmaRule, SourceOrigin};
