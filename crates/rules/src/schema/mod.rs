//! Sigma rule schema types.
//!
//! Defines the type hierarchy for parsed rule documents:
//! - `RuleDocument`: enum dispatching to detection or correlation rules
//! - `RuleMetadata`: header fields shared by both kinds
//! - `Detection`: named search identifiers plus condition strings
//!
//! Parsing is lenient: problems are recorded as [`RuleParseError`]s on the
//! record instead of failing the whole document.

mod detection;
mod document;
mod metadata;
mod parse;
mod parse_error;
mod source;

pub use detection::*;
pub use document::*;
pub use metadata::*;
pub use parse_error::*;
pub use source::*;

pub(crate) use parse::parse_document;
