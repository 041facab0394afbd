//! Push-stream stage runtime.
//!
//! A pipeline is a chain of [`Stage`]s. Each stage consumes one
//! [`StageStream`] and produces another, with the same three signals at every
//! boundary: items, then exactly one of completion or error. All stages of one
//! job share a [`JobToken`]; cancellation is a clean stop, not an error.
//!
//! Composition helpers:
//!
//! - [`Batcher`] groups items into fixed-size batches.
//! - [`merge`] interleaves two streams, completing when both complete.
//! - [`Multicast`] runs one pass of a stream for several subscribers.

mod batch;
mod error;
mod merge;
mod multicast;
mod signal;
mod spawn;
mod stage;
mod token;

pub use batch::Batcher;
pub use error::{LookupError, StageError};
pub use merge::merge;
pub use multicast::Multicast;
pub use signal::{StageSender, StageStream, channel};
pub use spawn::spawn;
pub use stage::{Stage, StageContext, StageExit, StageTask, run_stage, spawn_stage};
pub use token::JobToken;
