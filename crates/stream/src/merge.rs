use futures::StreamExt;

use crate::{StageStream, channel};

#[derive(Debug, Clone, Copy)]
enum Side {
	Left,
	Right,
}

/// Merges two independently terminating streams into one.
///
/// Items are forwarded as they arrive from either side. The merged stream
/// completes once both sides complete; the first error from either side is
/// forwarded and both inputs are dropped.
pub fn merge<T>(name: &'static str, left: StageStream<T>, right: StageStream<T>, capacity: usize) -> StageStream<T>
where
	T: Send + 'static,
{
	let (tx, rx) = channel(name, capacity);
	let mut left = left;
	let mut right = right;

	crate::spawn(name, async move {
		let mut left_done = false;
		let mut right_done = false;

		while !(left_done && right_done) {
			let (side, next) = tokio::select! {
				next = left.next(), if !left_done => (Side::Left, next),
				next = right.next(), if !right_done => (Side::Right, next),
			};

			match next {
				Some(Ok(item)) => {
					if tx.emit(item).await.is_err() {
						tracing::trace!(stage = name, "merge.downstream_closed");
						return;
					}
				}
				Some(Err(err)) => {
					tracing::debug!(stage = name, side = ?side, error = %err, "merge.failed");
					tx.fail(err).await;
					return;
				}
				None => match side {
					Side::Left => left_done = true,
					Side::Right => right_done = true,
				},
			}
		}

		tx.complete().await;
	});

	rx
}
