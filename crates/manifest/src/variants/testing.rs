use std::sync::Arc;

use async_trait::async_trait;
use strand_stream::LookupError;

use super::{PlainVariants, VariantOutcome, VariantStrategy};
use crate::collab::TestableContent;
use crate::model::CandidatePromotionContext;

/// Lets an active content test override the revision comparison.
pub struct TestingVariants {
	plain: PlainVariants,
	content: Arc<dyn TestableContent>,
}

impl TestingVariants {
	pub fn new(plain: PlainVariants, content: Arc<dyn TestableContent>) -> Self {
		Self { plain, content }
	}
}

#[async_trait]
impl VariantStrategy for TestingVariants {
	fn name(&self) -> &'static str {
		"content-testing"
	}

	async fn decide(&self, ctx: &CandidatePromotionContext) -> Result<VariantOutcome, LookupError> {
		let decision = match self.content.test_decision(ctx).await? {
			Some(decision) => decision,
			None => self.plain.decision(ctx),
		};
		Ok(VariantOutcome::Publish(decision))
	}
}
