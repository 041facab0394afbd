use async_trait::async_trait;
use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::{JobToken, StageError, StageSender, StageStream, channel};

/// One transformation in a push pipeline.
///
/// The driver feeds upstream items to [`Stage::handle`] one at a time, in
/// upstream order, and never runs two handlers of the same stage concurrently.
#[async_trait]
pub trait Stage: Send + 'static {
	type In: Send + 'static;
	type Out: Send + 'static;

	/// Stage name used in logs and error signals.
	fn name(&self) -> &'static str;

	/// Handles one upstream item.
	async fn handle(&mut self, item: Self::In, ctx: &mut StageContext<Self::Out>) -> Result<(), StageError>;

	/// Runs once after upstream completion, before completion is forwarded.
	async fn on_complete(&mut self, _ctx: &mut StageContext<Self::Out>) -> Result<(), StageError> {
		Ok(())
	}

	/// Runs once after cooperative cancellation, before completion is forwarded.
	async fn on_cancel(&mut self, _ctx: &mut StageContext<Self::Out>) -> Result<(), StageError> {
		Ok(())
	}
}

/// Stage execution context: the downstream sender plus the job token.
pub struct StageContext<Out> {
	output: StageSender<Out>,
	token: JobToken,
}

impl<Out> StageContext<Out> {
	fn new(output: StageSender<Out>, token: JobToken) -> Self {
		Self { output, token }
	}

	/// Emits one item downstream.
	pub async fn emit(&self, item: Out) -> Result<(), StageError> {
		self.output.emit(item).await
	}

	/// Emits every item downstream, in order.
	pub async fn emit_all(&self, items: impl IntoIterator<Item = Out> + Send) -> Result<(), StageError>
	where
		Out: Send,
	{
		for item in items {
			self.output.emit(item).await?;
		}
		Ok(())
	}

	/// Returns whether the job has been cancelled.
	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}

	/// Fails with [`StageError::Cancelled`] once the job is cancelled.
	pub fn check_cancelled(&self) -> Result<(), StageError> {
		self.token.check()
	}
}

/// How a stage run ended, for runs that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageExit {
	/// Upstream completed and completion was forwarded.
	Completed,
	/// The job was cancelled; completion was forwarded after `on_cancel`.
	Cancelled,
	/// Upstream signalled an error, forwarded verbatim.
	UpstreamFailed,
	/// Downstream went away; the stage stopped without a terminal signal.
	DownstreamClosed,
}

enum Step<T> {
	Item(T),
	Completed,
	Upstream(StageError),
	Cancelled,
}

/// Drives `stage` over `input` until a terminal signal, writing to `output`.
///
/// Handler failures other than cancellation are logged, sent downstream as an
/// error signal, and also returned so a direct awaiter observes them.
pub async fn run_stage<S>(mut stage: S, mut input: StageStream<S::In>, token: JobToken, output: StageSender<S::Out>) -> Result<StageExit, StageError>
where
	S: Stage,
{
	let name = stage.name();
	let mut ctx = StageContext::new(output, token.clone());

	let result = loop {
		// Cancel-aware receive.
		let step = tokio::select! {
			biased;
			_ = token.cancelled() => Step::Cancelled,
			next = input.next() => match next {
				Some(Ok(item)) => Step::Item(item),
				Some(Err(err)) => Step::Upstream(err),
				None => Step::Completed,
			},
		};

		match step {
			Step::Item(item) => {
				// Cancel-aware handle: an in-flight lookup is abandoned.
				let res = tokio::select! {
					biased;
					_ = token.cancelled() => Err(StageError::Cancelled),
					res = stage.handle(item, &mut ctx) => res,
				};
				if let Err(err) = res {
					break finish_with(&mut stage, ctx, err).await;
				}
			}
			Step::Completed => {
				let res = stage.on_complete(&mut ctx).await;
				break match res {
					Ok(()) => {
						ctx.output.complete().await;
						Ok(StageExit::Completed)
					}
					Err(err) => finish_with(&mut stage, ctx, err).await,
				};
			}
			Step::Upstream(err) => {
				tracing::debug!(stage = name, error = %err, "stage.upstream_failed");
				ctx.output.fail(err).await;
				break Ok(StageExit::UpstreamFailed);
			}
			Step::Cancelled => break finish_with(&mut stage, ctx, StageError::Cancelled).await,
		}
	};

	tracing::debug!(stage = name, job = token.job(), exit = ?result, "stage.exit");
	result
}

async fn finish_with<S>(stage: &mut S, mut ctx: StageContext<S::Out>, err: StageError) -> Result<StageExit, StageError>
where
	S: Stage,
{
	let name = stage.name();
	match err {
		StageError::Cancelled => {
			tracing::warn!(stage = name, "stage.cancelled");
			match stage.on_cancel(&mut ctx).await {
				Ok(()) | Err(StageError::Cancelled) => {
					ctx.output.complete().await;
					Ok(StageExit::Cancelled)
				}
				Err(StageError::Closed) => Ok(StageExit::DownstreamClosed),
				Err(err) => fail(name, ctx, err).await,
			}
		}
		StageError::Closed => Ok(StageExit::DownstreamClosed),
		err => fail(name, ctx, err).await,
	}
}

async fn fail<Out>(name: &'static str, ctx: StageContext<Out>, err: StageError) -> Result<StageExit, StageError> {
	tracing::error!(stage = name, error = %err, "stage.failed");
	ctx.output.fail(err.clone()).await;
	Err(err)
}

/// Handle to a spawned stage task.
pub struct StageTask {
	stage: &'static str,
	handle: JoinHandle<Result<StageExit, StageError>>,
}

impl StageTask {
	/// Waits for the stage to stop and returns how it ended.
	pub async fn join(self) -> Result<StageExit, StageError> {
		match self.handle.await {
			Ok(result) => result,
			Err(err) => Err(StageError::Aborted {
				stage: self.stage,
				message: err.to_string(),
			}),
		}
	}
}

/// Spawns `stage` over `input`, returning its output stream and task handle.
pub fn spawn_stage<S>(stage: S, input: StageStream<S::In>, token: JobToken, capacity: usize) -> (StageStream<S::Out>, StageTask)
where
	S: Stage,
{
	let name = stage.name();
	let (tx, rx) = channel(name, capacity);
	let handle = crate::spawn(name, run_stage(stage, input, token, tx));
	(rx, StageTask { stage: name, handle })
}
