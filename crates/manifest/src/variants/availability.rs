use async_trait::async_trait;
use chrono::{DateTime, Utc};
use strand_stream::LookupError;

use super::{PlainVariants, VariantOutcome, VariantStrategy};
use crate::model::CandidatePromotionContext;

/// Withdraws candidates whose publish window excludes the job start.
#[derive(Debug, Clone, Copy)]
pub struct AvailabilityVariants {
	plain: PlainVariants,
	published_at: DateTime<Utc>,
}

impl AvailabilityVariants {
	pub fn new(plain: PlainVariants, published_at: DateTime<Utc>) -> Self {
		Self { plain, published_at }
	}
}

#[async_trait]
impl VariantStrategy for AvailabilityVariants {
	fn name(&self) -> &'static str {
		"content-availability"
	}

	async fn decide(&self, ctx: &CandidatePromotionContext) -> Result<VariantOutcome, LookupError> {
		if !ctx.candidate.availability.contains(self.published_at) {
			return Ok(VariantOutcome::Withdraw);
		}
		Ok(VariantOutcome::Publish(self.plain.decision(ctx)))
	}
}
