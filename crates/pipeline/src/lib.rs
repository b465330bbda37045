//! Processing pipelines: ordered field and value transformations applied to
//! rules before a backend converts them.
//!
//! - [`ProcessingPipeline`]: named, prioritized list of processing items;
//!   pipelines compose with `+` and [`Iterator::sum`]
//! - [`Transformation`] / [`RuleCondition`]: what an item does and when
//! - YAML pipeline files and directories
//! - [`PipelineRegistry`]: built-in pipelines with backend allow-lists and
//!   specifier resolution

pub mod condition;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod registry;
pub mod transformation;

pub use condition::RuleCondition;
pub use error::{PipelineError, Result};
pub use pipeline::{ProcessingItem, ProcessingPipeline};
pub use registry::{PipelineInfo, PipelineRegistry, ResolvedSpecifier};
pub use transformation::Transformation;
