//! Error types shared by every pipeline stage.

use thiserror::Error;

/// Failure of one lookup against an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
	/// The lookup observed the job's cancellation request.
	#[error("lookup cancelled")]
	Cancelled,
	/// The collaborator failed.
	#[error("{0}")]
	Failed(String),
}

impl LookupError {
	/// Creates a failure from anything displayable.
	pub fn failed(err: impl std::fmt::Display) -> Self {
		Self::Failed(err.to_string())
	}
}

/// Terminal error signal carried by a [`StageStream`](crate::StageStream).
///
/// Cloneable so a multicast hub can hand the same error to every subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
	/// Cooperative cancellation. Drivers translate this into a clean completion.
	#[error("stage cancelled")]
	Cancelled,

	/// A collaborator lookup failed while a stage was processing an item.
	#[error("{stage}: {source}")]
	Lookup {
		/// Stage that issued the lookup.
		stage: &'static str,
		/// The underlying lookup failure.
		source: LookupError,
	},

	/// The producer disappeared without sending a terminal signal.
	#[error("{stage}: upstream dropped without completing")]
	Disconnected {
		/// Stage that owned the dropped producer.
		stage: &'static str,
	},

	/// The downstream receiver was dropped; nobody observes further signals.
	#[error("downstream closed")]
	Closed,

	/// A stage task panicked or was aborted before reporting its exit.
	#[error("{stage}: task aborted: {message}")]
	Aborted {
		/// Stage whose task aborted.
		stage: &'static str,
		/// Join failure description.
		message: String,
	},
}

impl StageError {
	/// Wraps a lookup failure, keeping cancellation distinguishable.
	pub fn lookup(stage: &'static str, source: LookupError) -> Self {
		match source {
			LookupError::Cancelled => Self::Cancelled,
			source => Self::Lookup { stage, source },
		}
	}
}
