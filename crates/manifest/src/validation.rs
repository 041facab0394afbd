//! Structural and parent validation of source candidates.

use std::sync::Arc;

use async_trait::async_trait;
use strand_stream::{Stage, StageContext, StageError};

use crate::collab::{ParentValidator, StructureValidator};
use crate::model::{CandidateValidationContext, Validity};

/// Converts candidates failing the structural rules into invalid contexts.
pub struct StructureValidationStage {
	validator: Arc<dyn StructureValidator>,
}

impl StructureValidationStage {
	pub const NAME: &'static str = "structure-validation";

	pub fn new(validator: Arc<dyn StructureValidator>) -> Self {
		Self { validator }
	}
}

#[async_trait]
impl Stage for StructureValidationStage {
	type In = CandidateValidationContext;
	type Out = CandidateValidationContext;

	fn name(&self) -> &'static str {
		Self::NAME
	}

	async fn handle(&mut self, ctx: CandidateValidationContext, out: &mut StageContext<CandidateValidationContext>) -> Result<(), StageError> {
		let verdict = match &ctx {
			CandidateValidationContext::Valid(candidate) => self.validator.validate(candidate).await.map_err(|e| StageError::lookup(Self::NAME, e))?,
			CandidateValidationContext::Invalid { .. } => Validity::Invalid,
		};
		out.emit(apply(ctx, verdict)).await
	}
}

/// Converts candidates failing the parent or bucket rules into invalid contexts.
pub struct ParentValidationStage {
	validator: Arc<dyn ParentValidator>,
}

impl ParentValidationStage {
	pub const NAME: &'static str = "parent-validation";

	pub fn new(validator: Arc<dyn ParentValidator>) -> Self {
		Self { validator }
	}
}

#[async_trait]
impl Stage for ParentValidationStage {
	type In = CandidateValidationContext;
	type Out = CandidateValidationContext;

	fn name(&self) -> &'static str {
		Self::NAME
	}

	async fn handle(&mut self, ctx: CandidateValidationContext, out: &mut StageContext<CandidateValidationContext>) -> Result<(), StageError> {
		let verdict = match &ctx {
			CandidateValidationContext::Valid(candidate) => self.validator.validate(candidate).await.map_err(|e| StageError::lookup(Self::NAME, e))?,
			CandidateValidationContext::Invalid { .. } => Validity::Invalid,
		};
		out.emit(apply(ctx, verdict)).await
	}
}

fn apply(ctx: CandidateValidationContext, verdict: Validity) -> CandidateValidationContext {
	match (ctx, verdict) {
		(ctx @ CandidateValidationContext::Invalid { .. }, _) => ctx,
		(ctx, Validity::Valid) => ctx,
		(ctx, Validity::Invalid) => {
			tracing::trace!(id = %ctx.id(), "validation.rejected");
			CandidateValidationContext::invalid(ctx.id())
		}
	}
}
