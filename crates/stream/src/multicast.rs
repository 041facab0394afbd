use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::{StageSender, StageStream, channel};

/// Shares one pass over a source stream among several subscribers.
///
/// Subscribers attach with [`Multicast::subscribe`]; [`Multicast::connect`]
/// consumes the hub and starts the single pass, so every subscriber observes
/// the same items and the same terminal signal. Subscribers must be drained
/// concurrently: the pass advances at the pace of the slowest open one.
pub struct Multicast<T> {
	name: &'static str,
	source: StageStream<T>,
	capacity: usize,
	subscribers: Vec<StageSender<T>>,
}

impl<T> Multicast<T>
where
	T: Clone + Send + 'static,
{
	/// Wraps `source` without starting it.
	pub fn new(name: &'static str, source: StageStream<T>, capacity: usize) -> Self {
		Self {
			name,
			source,
			capacity,
			subscribers: Vec::new(),
		}
	}

	/// Attaches one subscriber.
	pub fn subscribe(&mut self) -> StageStream<T> {
		let (tx, rx) = channel(self.name, self.capacity);
		self.subscribers.push(tx);
		rx
	}

	/// Starts the shared pass.
	pub fn connect(self) -> JoinHandle<()> {
		let Self {
			name,
			mut source,
			subscribers,
			..
		} = self;
		tracing::trace!(stage = name, subscribers = subscribers.len(), "multicast.connect");

		crate::spawn(name, async move {
			let mut subscribers = subscribers;
			while let Some(next) = source.next().await {
				match next {
					Ok(item) => {
						let mut open = Vec::with_capacity(subscribers.len());
						for sub in subscribers {
							if sub.emit(item.clone()).await.is_ok() {
								open.push(sub);
							}
						}
						subscribers = open;
						if subscribers.is_empty() {
							tracing::trace!(stage = name, "multicast.no_subscribers");
							return;
						}
					}
					Err(err) => {
						for sub in subscribers {
							sub.fail(err.clone()).await;
						}
						return;
					}
				}
			}
			for sub in subscribers {
				sub.complete().await;
			}
		})
	}
}
