//! Capabilities the pipeline consumes from the surrounding publishing system.
//!
//! Every lookup is asynchronous and is awaited before the calling stage moves
//! on to its next item. Implementations report cooperative cancellation as
//! [`LookupError::Cancelled`].

use async_trait::async_trait;
use strand_stream::LookupError;

use crate::model::{
	Candidate, CandidatePromotionContext, CandidateValidationContext, CandidateValidationTargetContext, ItemDescriptor, ItemId, PromotionDecision,
	TargetItemMetadata, Validity,
};

/// Read access to the target store's item index.
#[async_trait]
pub trait TargetIndex: Send + Sync {
	/// Returns whether `id` exists in the target store.
	async fn item_exists(&self, id: ItemId) -> Result<bool, LookupError>;

	/// Fetches metadata for `ids`. Ids missing from the target may be omitted.
	async fn item_metadata(&self, ids: &[ItemId]) -> Result<Vec<TargetItemMetadata>, LookupError>;
}

/// Read access to the source store's tree index.
#[async_trait]
pub trait SourceIndex: Send + Sync {
	/// Returns every descendant of `id`, excluding `id` itself.
	async fn descendants(&self, id: ItemId) -> Result<Vec<ItemDescriptor>, LookupError>;
}

/// Field completeness and other per-item structural rules.
#[async_trait]
pub trait StructureValidator: Send + Sync {
	async fn validate(&self, candidate: &Candidate) -> Result<Validity, LookupError>;
}

/// Parent existence and bucket placement rules.
#[async_trait]
pub trait ParentValidator: Send + Sync {
	async fn validate(&self, candidate: &Candidate) -> Result<Validity, LookupError>;
}

/// Finds target items orphaned by a candidate's move or deletion.
#[async_trait]
pub trait OrphanDetector: Send + Sync {
	/// Returns the extra contexts (usually invalid) for items orphaned by `ctx`.
	async fn orphans(&self, ctx: &CandidateValidationContext) -> Result<Vec<CandidateValidationContext>, LookupError>;
}

/// Finds clones whose clone source will not be present in the target.
#[async_trait]
pub trait CloneSourceInspector: Send + Sync {
	/// Returns invalid contexts for clones invalidated by `batch`.
	async fn invalid_clones(&self, batch: &[CandidateValidationTargetContext]) -> Result<Vec<CandidateValidationTargetContext>, LookupError>;
}

/// Content-testing repository consulted by the testing variant mode.
#[async_trait]
pub trait TestableContent: Send + Sync {
	/// Returns a decision override when the candidate is under an active test.
	async fn test_decision(&self, ctx: &CandidatePromotionContext) -> Result<Option<PromotionDecision>, LookupError>;
}
