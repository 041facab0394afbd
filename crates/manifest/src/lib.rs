//! Streaming publish-manifest calculation.
//!
//! Given the candidates of one publish job, decides per candidate whether it
//! is created, updated, left alone or removed in a target store, and emits
//! the decisions with parents ahead of their children. See [`pipeline`] for
//! the stage order.

pub mod collab;
pub mod config;
pub mod deferred;
mod error;
pub mod memory;
pub mod model;
pub mod pipeline;
pub mod side;
pub mod validation;
pub mod variants;

pub use config::{ConfigError, ManifestOptions, PublishJob, VariantMode};
pub use error::PipelineError;
pub use pipeline::{Collaborators, ManifestOutput, ManifestPipeline, PublishManifest};
pub use strand_stream::{JobToken, LookupError, StageError, StageStream};
