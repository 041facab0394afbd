use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while assembling a manifest pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// The job configuration needs a collaborator that was not supplied.
	#[error("missing collaborator: {0}")]
	MissingCollaborator(&'static str),
}
