//! Three-signal stream contract: items, then exactly one of completion or error.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use futures::stream::FusedStream;
use tokio::sync::mpsc;

use crate::StageError;

enum Signal<T> {
	Next(T),
	Completed,
	Errored(StageError),
}

/// Creates a bounded stage channel owned by `stage`.
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn channel<T>(stage: &'static str, capacity: usize) -> (StageSender<T>, StageStream<T>) {
	assert!(capacity > 0, "stage channel capacity must be > 0");
	let (tx, rx) = mpsc::channel(capacity);
	(StageSender { tx }, StageStream { stage, rx, done: false })
}

/// Producing end of a stage stream.
///
/// The terminal signals consume the sender, so at most one of them can ever
/// be sent. Dropping the sender without a terminal signal is reported to the
/// receiver as [`StageError::Disconnected`].
pub struct StageSender<T> {
	tx: mpsc::Sender<Signal<T>>,
}

impl<T> StageSender<T> {
	/// Emits one item, waiting for capacity.
	///
	/// Fails with [`StageError::Closed`] once the receiver is gone.
	pub async fn emit(&self, item: T) -> Result<(), StageError> {
		self.tx.send(Signal::Next(item)).await.map_err(|_| StageError::Closed)
	}

	/// Resolves once the receiver has been dropped.
	pub async fn closed(&self) {
		self.tx.closed().await;
	}

	/// Sends the completion signal.
	pub async fn complete(self) {
		let _ = self.tx.send(Signal::Completed).await;
	}

	/// Sends the error signal.
	pub async fn fail(self, err: StageError) {
		let _ = self.tx.send(Signal::Errored(err)).await;
	}
}

/// Receiving end of a stage stream.
///
/// Yields `Ok` items, then ends on completion or yields one `Err` and ends.
pub struct StageStream<T> {
	stage: &'static str,
	rx: mpsc::Receiver<Signal<T>>,
	done: bool,
}

impl<T> StageStream<T> {
	/// Builds an already-completed stream holding `items`.
	pub fn from_items(stage: &'static str, items: impl IntoIterator<Item = T>) -> Self {
		let items: Vec<T> = items.into_iter().collect();
		let (tx, rx) = mpsc::channel(items.len().saturating_add(1));
		for item in items {
			let _ = tx.try_send(Signal::Next(item));
		}
		let _ = tx.try_send(Signal::Completed);
		Self { stage, rx, done: false }
	}

	/// Builds a stream that signals `err` immediately.
	pub fn failed(stage: &'static str, err: StageError) -> Self {
		let (tx, rx) = mpsc::channel(1);
		let _ = tx.try_send(Signal::Errored(err));
		Self { stage, rx, done: false }
	}

	fn finish(&mut self) {
		self.done = true;
		self.rx.close();
	}
}

impl<T> Stream for StageStream<T> {
	type Item = Result<T, StageError>;

	fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		if self.done {
			return Poll::Ready(None);
		}
		match self.rx.poll_recv(cx) {
			Poll::Pending => Poll::Pending,
			Poll::Ready(Some(Signal::Next(item))) => Poll::Ready(Some(Ok(item))),
			Poll::Ready(Some(Signal::Completed)) => {
				self.finish();
				Poll::Ready(None)
			}
			Poll::Ready(Some(Signal::Errored(err))) => {
				self.finish();
				Poll::Ready(Some(Err(err)))
			}
			Poll::Ready(None) => {
				self.done = true;
				Poll::Ready(Some(Err(StageError::Disconnected { stage: self.stage })))
			}
		}
	}
}

impl<T> FusedStream for StageStream<T> {
	fn is_terminated(&self) -> bool {
		self.done
	}
}
