//! Candidate and target-side data flowing through the manifest pipeline.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Identifier of one content item.
pub type ItemId = Uuid;

/// Root of every content tree. Always present in every target store and never
/// published.
pub const ROOT_ITEM_ID: ItemId = Uuid::from_u128(0x1111_1111_1111_1111_1111_1111_1111_1111);

/// Identifier of one target store.
pub type TargetId = Uuid;

/// Published revision or content hash of an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(pub String);

impl Revision {
	/// Wraps a revision string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}
}

/// Bucket placement data used by the bucket-aware parent rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketInfo {
	/// The nearest bucket ancestor.
	pub bucket_id: ItemId,
	/// Whether the item may live inside a bucket.
	pub bucketable: bool,
}

/// Reference to the changed field payload held by the source store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPayload {
	/// Ids of the fields touched by the change.
	pub changed_fields: Vec<Uuid>,
}

/// Window in which an item may be present in a target store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishWindow {
	pub valid_from: Option<DateTime<Utc>>,
	pub valid_to: Option<DateTime<Utc>>,
}

impl PublishWindow {
	/// Returns true when `at` falls inside the window. Bounds are inclusive
	/// at the start and exclusive at the end.
	pub fn contains(&self, at: DateTime<Utc>) -> bool {
		self.valid_from.is_none_or(|from| from <= at) && self.valid_to.is_none_or(|to| at < to)
	}
}

/// Source-side data needed to decide a publish action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
	pub id: ItemId,
	/// Absent parent makes the candidate invalid.
	pub parent_id: Option<ItemId>,
	pub template_id: Uuid,
	pub bucket: Option<BucketInfo>,
	pub revision: Revision,
	pub fields: FieldPayload,
	pub availability: PublishWindow,
}

impl Candidate {
	/// Creates a candidate with empty payload under `parent_id`.
	pub fn new(id: ItemId, parent_id: Option<ItemId>, revision: Revision) -> Self {
		Self {
			id,
			parent_id,
			template_id: Uuid::nil(),
			bucket: None,
			revision,
			fields: FieldPayload::default(),
			availability: PublishWindow::default(),
		}
	}
}

/// Outcome of a structural or parent validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
	Valid,
	Invalid,
}

/// Validation state of one candidate, before target-specific resolution.
///
/// Validity is fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateValidationContext {
	Valid(Candidate),
	Invalid { id: ItemId },
}

impl CandidateValidationContext {
	/// Context for a candidate that passed validation so far.
	pub fn valid(candidate: Candidate) -> Self {
		Self::Valid(candidate)
	}

	/// Context for an item that must not be published.
	pub fn invalid(id: ItemId) -> Self {
		Self::Invalid { id }
	}

	/// Returns the item id.
	pub fn id(&self) -> ItemId {
		match self {
			Self::Valid(candidate) => candidate.id,
			Self::Invalid { id } => *id,
		}
	}

	/// Returns true for the valid shape.
	pub fn is_valid(&self) -> bool {
		matches!(self, Self::Valid(_))
	}

	/// Returns the candidate of a valid context.
	pub fn candidate(&self) -> Option<&Candidate> {
		match self {
			Self::Valid(candidate) => Some(candidate),
			Self::Invalid { .. } => None,
		}
	}
}

/// Target-side snapshot of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetItemMetadata {
	pub id: ItemId,
	pub exists: bool,
	pub revision: Option<Revision>,
}

impl TargetItemMetadata {
	/// Metadata for an item present in the target at `revision`.
	pub fn existing(id: ItemId, revision: Revision) -> Self {
		Self {
			id,
			exists: true,
			revision: Some(revision),
		}
	}

	/// Sentinel for an item the target does not hold.
	pub fn missing(id: ItemId) -> Self {
		Self {
			id,
			exists: false,
			revision: None,
		}
	}
}

/// Candidate paired with its target metadata, input of a promotion decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePromotionContext {
	pub candidate: Candidate,
	pub metadata: TargetItemMetadata,
}

/// Action a valid candidate requires in the target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromotionDecision {
	Create,
	Update,
	Unchanged,
}

/// Per-target refinement of a validation context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateValidationTargetContext {
	/// Publishable into `target_id`.
	Valid {
		target_id: TargetId,
		candidate: Candidate,
		decision: Option<PromotionDecision>,
	},
	/// Terminal decision: must not be created, and is removed if present.
	Invalid { target_id: TargetId, id: ItemId },
}

impl CandidateValidationTargetContext {
	/// Publishable context carrying its promotion decision.
	pub fn valid(target_id: TargetId, candidate: Candidate, decision: PromotionDecision) -> Self {
		Self::Valid {
			target_id,
			candidate,
			decision: Some(decision),
		}
	}

	/// Terminal invalid context for `id` in `target_id`.
	pub fn invalid(target_id: TargetId, id: ItemId) -> Self {
		Self::Invalid { target_id, id }
	}

	/// Returns the item id.
	pub fn id(&self) -> ItemId {
		match self {
			Self::Valid { candidate, .. } => candidate.id,
			Self::Invalid { id, .. } => *id,
		}
	}

	/// Returns the target store id.
	pub fn target_id(&self) -> TargetId {
		match self {
			Self::Valid { target_id, .. } | Self::Invalid { target_id, .. } => *target_id,
		}
	}

	/// Returns true for the valid shape.
	pub fn is_valid(&self) -> bool {
		matches!(self, Self::Valid { .. })
	}

	/// Returns the candidate of a valid context.
	pub fn candidate(&self) -> Option<&Candidate> {
		match self {
			Self::Valid { candidate, .. } => Some(candidate),
			Self::Invalid { .. } => None,
		}
	}

	/// Returns the promotion decision, if one was made.
	pub fn decision(&self) -> Option<PromotionDecision> {
		match self {
			Self::Valid { decision, .. } => *decision,
			Self::Invalid { .. } => None,
		}
	}
}

/// Source tree entry returned by descendant lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemDescriptor {
	pub id: ItemId,
	pub parent_id: Option<ItemId>,
}
