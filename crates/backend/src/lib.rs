//! Backends: turn processed rules into target query languages.
//!
//! A [`Backend`] is built from a [`BackendDescriptor`] with a resolved
//! pipeline and typed options, and yields a [`ConversionResult`] in one of
//! five shapes.

pub mod backend;
pub mod error;
pub mod options;
pub mod registry;
pub mod result;
pub mod text;

pub use backend::{Backend, BackendConfig, BackendDescriptor, FormatInfo};
pub use error::{BackendError, ConversionError, Result};
pub use options::{BackendOptions, OptionKind, OptionScalar, OptionSpec, OptionValue};
pub use registry::BackendRegistry;
pub use result::{Conversion, ConversionResult, ResultKind, SkippedRule};
