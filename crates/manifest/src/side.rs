//! Side computations merged into the main decision stream.

use std::sync::Arc;

use async_trait::async_trait;
use strand_stream::{Stage, StageContext, StageError};

use crate::collab::{CloneSourceInspector, OrphanDetector};
use crate::model::{CandidateValidationContext, CandidateValidationTargetContext};

/// Emits the contexts of target items orphaned by each candidate.
///
/// Only the extra contexts are emitted; the input itself continues on the
/// main branch.
pub struct OrphanStage {
	detector: Arc<dyn OrphanDetector>,
}

impl OrphanStage {
	pub const NAME: &'static str = "orphaned-items";

	pub fn new(detector: Arc<dyn OrphanDetector>) -> Self {
		Self { detector }
	}
}

#[async_trait]
impl Stage for OrphanStage {
	type In = CandidateValidationContext;
	type Out = CandidateValidationContext;

	fn name(&self) -> &'static str {
		Self::NAME
	}

	async fn handle(&mut self, ctx: CandidateValidationContext, out: &mut StageContext<CandidateValidationContext>) -> Result<(), StageError> {
		let orphans = self.detector.orphans(&ctx).await.map_err(|e| StageError::lookup(Self::NAME, e))?;
		out.emit_all(orphans).await
	}
}

/// Emits invalid contexts for clones whose source is not publishable.
///
/// Consumes batches of the main target stream; batching happens upstream.
pub struct CloneSourceStage {
	inspector: Arc<dyn CloneSourceInspector>,
}

impl CloneSourceStage {
	pub const NAME: &'static str = "clone-sources";

	pub fn new(inspector: Arc<dyn CloneSourceInspector>) -> Self {
		Self { inspector }
	}
}

#[async_trait]
impl Stage for CloneSourceStage {
	type In = Vec<CandidateValidationTargetContext>;
	type Out = CandidateValidationTargetContext;

	fn name(&self) -> &'static str {
		Self::NAME
	}

	async fn handle(&mut self, batch: Vec<CandidateValidationTargetContext>, out: &mut StageContext<CandidateValidationTargetContext>) -> Result<(), StageError> {
		let clones = self.inspector.invalid_clones(&batch).await.map_err(|e| StageError::lookup(Self::NAME, e))?;
		tracing::trace!(batch = batch.len(), invalid_clones = clones.len(), "clone_sources.batch");
		out.emit_all(clones).await
	}
}
