use async_trait::async_trait;

use crate::{Stage, StageContext, StageError};

/// Groups items into batches of at most `size`.
///
/// A partial batch is emitted when upstream completes and discarded when the
/// job is cancelled.
pub struct Batcher<T> {
	name: &'static str,
	size: usize,
	pending: Vec<T>,
}

impl<T> Batcher<T> {
	/// Creates a batcher.
	///
	/// # Panics
	///
	/// Panics if `size` is zero.
	pub fn new(name: &'static str, size: usize) -> Self {
		assert!(size > 0, "batch size must be > 0");
		Self {
			name,
			size,
			pending: Vec::with_capacity(size),
		}
	}
}

#[async_trait]
impl<T> Stage for Batcher<T>
where
	T: Send + 'static,
{
	type In = T;
	type Out = Vec<T>;

	fn name(&self) -> &'static str {
		self.name
	}

	async fn handle(&mut self, item: T, ctx: &mut StageContext<Vec<T>>) -> Result<(), StageError> {
		self.pending.push(item);
		if self.pending.len() >= self.size {
			let batch = std::mem::replace(&mut self.pending, Vec::with_capacity(self.size));
			ctx.emit(batch).await?;
		}
		Ok(())
	}

	async fn on_complete(&mut self, ctx: &mut StageContext<Vec<T>>) -> Result<(), StageError> {
		if self.pending.is_empty() {
			return Ok(());
		}
		ctx.emit(std::mem::take(&mut self.pending)).await
	}
}
