#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use strand_manifest::collab::{CloneSourceInspector, OrphanDetector, StructureValidator};
use strand_manifest::memory::{InMemorySourceIndex, InMemoryTargetIndex, ListValidator};
use strand_manifest::model::{Candidate, CandidateValidationContext, CandidateValidationTargetContext, ItemId, Revision, TargetId, Validity};
use strand_manifest::{Collaborators, LookupError, PublishJob};
use uuid::Uuid;

pub const TARGET: TargetId = Uuid::from_u128(0xfeed);

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt::try_init();
}

pub fn id(n: u128) -> ItemId {
	Uuid::from_u128(n)
}

pub fn candidate(n: u128, parent: Option<ItemId>) -> Candidate {
	Candidate::new(id(n), parent, Revision::new("r1"))
}

pub fn valid(n: u128, parent: ItemId) -> CandidateValidationContext {
	CandidateValidationContext::valid(candidate(n, Some(parent)))
}

pub fn job() -> PublishJob {
	PublishJob::new(TARGET, Utc.with_ymd_and_hms(2026, 10, 14, 9, 0, 0).unwrap())
}

/// In-memory world shared by the collaborators of one test.
#[derive(Default, Clone)]
pub struct World {
	pub source: InMemorySourceIndex,
	pub target: InMemoryTargetIndex,
}

impl World {
	pub fn collaborators(&self) -> Collaborators {
		self.collaborators_with(ListValidator::accept_all())
	}

	pub fn collaborators_with(&self, structure: ListValidator) -> Collaborators {
		Collaborators::new(
			Arc::new(self.target.clone()),
			Arc::new(self.source.clone()),
			Arc::new(structure),
			Arc::new(ListValidator::accept_all()),
		)
	}
}

/// Structural validator whose every lookup fails.
pub struct BrokenValidator;

#[async_trait]
impl StructureValidator for BrokenValidator {
	async fn validate(&self, _candidate: &Candidate) -> Result<Validity, LookupError> {
		Err(LookupError::Failed("validator offline".into()))
	}
}

/// Each candidate `n` orphans target item `n + 1000`.
pub struct ShiftedOrphans;

#[async_trait]
impl OrphanDetector for ShiftedOrphans {
	async fn orphans(&self, ctx: &CandidateValidationContext) -> Result<Vec<CandidateValidationContext>, LookupError> {
		Ok(vec![CandidateValidationContext::invalid(id(ctx.id().as_u128() + 1000))])
	}
}

/// Each invalid context `n` invalidates clone `n + 500`.
pub struct ClonesOfInvalid;

#[async_trait]
impl CloneSourceInspector for ClonesOfInvalid {
	async fn invalid_clones(&self, batch: &[CandidateValidationTargetContext]) -> Result<Vec<CandidateValidationTargetContext>, LookupError> {
		Ok(batch
			.iter()
			.filter(|c| !c.is_valid())
			.map(|c| CandidateValidationTargetContext::invalid(TARGET, id(c.id().as_u128() + 500)))
			.collect())
	}
}
