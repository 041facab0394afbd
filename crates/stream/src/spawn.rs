use std::future::Future;

use tokio::task::JoinHandle;

/// Spawns one stage task on the current Tokio runtime.
///
/// # Panics
///
/// Panics when called outside a Tokio runtime.
#[allow(clippy::disallowed_methods)]
pub fn spawn<F>(stage: &'static str, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(stage, "stage.spawn");
	tokio::runtime::Handle::current().spawn(fut)
}
