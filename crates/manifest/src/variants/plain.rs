use async_trait::async_trait;
use strand_stream::LookupError;

use super::{VariantOutcome, VariantStrategy};
use crate::model::{CandidatePromotionContext, PromotionDecision};

/// Revision comparison against the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainVariants {
	republish_all: bool,
}

impl PlainVariants {
	pub fn new(republish_all: bool) -> Self {
		Self { republish_all }
	}

	pub(super) fn decision(&self, ctx: &CandidatePromotionContext) -> PromotionDecision {
		if !ctx.metadata.exists {
			PromotionDecision::Create
		} else if self.republish_all || ctx.metadata.revision.as_ref() != Some(&ctx.candidate.revision) {
			PromotionDecision::Update
		} else {
			PromotionDecision::Unchanged
		}
	}
}

#[async_trait]
impl VariantStrategy for PlainVariants {
	fn name(&self) -> &'static str {
		"plain"
	}

	async fn decide(&self, ctx: &CandidatePromotionContext) -> Result<VariantOutcome, LookupError> {
		Ok(VariantOutcome::Publish(self.decision(ctx)))
	}
}
