use tokio_util::sync::CancellationToken;

use crate::StageError;

/// Job-scoped cancellation token threaded through every stage of one pipeline.
#[derive(Debug, Clone)]
pub struct JobToken {
	job: u64,
	cancel: CancellationToken,
}

impl Default for JobToken {
	fn default() -> Self {
		Self::new(0, CancellationToken::new())
	}
}

impl JobToken {
	/// Creates a job token.
	pub fn new(job: u64, cancel: CancellationToken) -> Self {
		Self { job, cancel }
	}

	/// Returns the job id.
	pub const fn job(&self) -> u64 {
		self.job
	}

	/// Returns true when cancellation is requested.
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Requests cancellation.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Future resolving when cancellation is requested.
	pub async fn cancelled(&self) {
		self.cancel.cancelled().await;
	}

	/// Fails with [`StageError::Cancelled`] once cancellation is requested.
	pub fn check(&self) -> Result<(), StageError> {
		if self.is_cancelled() { Err(StageError::Cancelled) } else { Ok(()) }
	}
}
