//! Batched per-candidate promotion decisions.
//!
//! The input stream is batched upstream; each batch costs one bulk metadata
//! lookup against the target. The decision itself is delegated to a
//! [`VariantStrategy`] selected from the job's [`VariantMode`].

use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::{FxHashMap, FxHashSet};
use strand_stream::{LookupError, Stage, StageContext, StageError};

use crate::collab::{TargetIndex, TestableContent};
use crate::config::{PublishJob, VariantMode};
use crate::error::PipelineError;
use crate::model::{CandidatePromotionContext, CandidateValidationContext, CandidateValidationTargetContext, PromotionDecision, TargetId, TargetItemMetadata};

mod availability;
mod plain;
mod testing;

pub use availability::AvailabilityVariants;
pub use plain::PlainVariants;
pub use testing::TestingVariants;

/// What a strategy decided for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantOutcome {
	/// Publish with the given action.
	Publish(PromotionDecision),
	/// Must not be present in the target: removed if it exists, else skipped.
	Withdraw,
}

/// Decides the promotion of one candidate against its target metadata.
#[async_trait]
pub trait VariantStrategy: Send + Sync {
	fn name(&self) -> &'static str;

	async fn decide(&self, ctx: &CandidatePromotionContext) -> Result<VariantOutcome, LookupError>;
}

/// Builds the strategy for `mode`.
pub fn strategy_for(mode: VariantMode, job: &PublishJob, testable: Option<Arc<dyn TestableContent>>) -> Result<Arc<dyn VariantStrategy>, PipelineError> {
	let plain = PlainVariants::new(job.republish_all);
	Ok(match mode {
		VariantMode::Plain => Arc::new(plain),
		VariantMode::ContentAvailability => Arc::new(AvailabilityVariants::new(plain, job.started)),
		VariantMode::ContentTesting => {
			let content = testable.ok_or(PipelineError::MissingCollaborator("testable-content"))?;
			Arc::new(TestingVariants::new(plain, content))
		}
	})
}

/// Stage turning batches of validation contexts into target contexts.
pub struct BatchVariantResolver {
	target_id: TargetId,
	target: Arc<dyn TargetIndex>,
	strategy: Arc<dyn VariantStrategy>,
}

impl BatchVariantResolver {
	pub const NAME: &'static str = "variants-validation";

	pub fn new(target_id: TargetId, target: Arc<dyn TargetIndex>, strategy: Arc<dyn VariantStrategy>) -> Self {
		Self { target_id, target, strategy }
	}
}

#[async_trait]
impl Stage for BatchVariantResolver {
	type In = Vec<CandidateValidationContext>;
	type Out = CandidateValidationTargetContext;

	fn name(&self) -> &'static str {
		Self::NAME
	}

	async fn handle(&mut self, batch: Vec<CandidateValidationContext>, out: &mut StageContext<CandidateValidationTargetContext>) -> Result<(), StageError> {
		let size = batch.len();
		let mut seen = FxHashSet::default();
		let mut candidates = Vec::with_capacity(size);
		for ctx in batch {
			match ctx {
				// Known invalids need no lookup.
				CandidateValidationContext::Invalid { id } => out.emit(CandidateValidationTargetContext::invalid(self.target_id, id)).await?,
				CandidateValidationContext::Valid(candidate) => {
					// First occurrence wins within a batch.
					if seen.insert(candidate.id) {
						candidates.push(candidate);
					}
				}
			}
		}

		tracing::trace!(strategy = self.strategy.name(), size, candidates = candidates.len(), "variants.batch");
		if candidates.is_empty() {
			return Ok(());
		}

		let ids: Vec<_> = candidates.iter().map(|c| c.id).collect();
		let fetched = self.target.item_metadata(&ids).await.map_err(|e| StageError::lookup(Self::NAME, e))?;
		let mut index: FxHashMap<_, TargetItemMetadata> = FxHashMap::default();
		for metadata in fetched {
			index.entry(metadata.id).or_insert(metadata);
		}

		for candidate in candidates {
			out.check_cancelled()?;

			let metadata = index.remove(&candidate.id).unwrap_or_else(|| TargetItemMetadata::missing(candidate.id));
			let ctx = CandidatePromotionContext { candidate, metadata };
			let outcome = self.strategy.decide(&ctx).await.map_err(|e| StageError::lookup(Self::NAME, e))?;

			match outcome {
				VariantOutcome::Publish(decision) => out.emit(CandidateValidationTargetContext::valid(self.target_id, ctx.candidate, decision)).await?,
				VariantOutcome::Withdraw if ctx.metadata.exists => out.emit(CandidateValidationTargetContext::invalid(self.target_id, ctx.candidate.id)).await?,
				VariantOutcome::Withdraw => tracing::trace!(id = %ctx.candidate.id, "variants.withdrawn_absent"),
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests;
