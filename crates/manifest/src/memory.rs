//! In-memory collaborators for dry runs and tests.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use rustc_hash::{FxHashMap, FxHashSet};
use strand_stream::LookupError;

use crate::collab::{ParentValidator, SourceIndex, StructureValidator, TargetIndex};
use crate::model::{Candidate, ItemDescriptor, ItemId, Revision, TargetItemMetadata, Validity};

/// Target index backed by a map of id to published revision.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTargetIndex {
	items: Arc<RwLock<FxHashMap<ItemId, Revision>>>,
	failing: Arc<RwLock<FxHashSet<ItemId>>>,
}

impl InMemoryTargetIndex {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records `id` as present at `revision`.
	pub fn insert(&self, id: ItemId, revision: Revision) {
		if let Ok(mut guard) = self.items.write() {
			guard.insert(id, revision);
		}
	}

	/// Makes every lookup touching `id` fail.
	pub fn fail_on(&self, id: ItemId) {
		if let Ok(mut guard) = self.failing.write() {
			guard.insert(id);
		}
	}

	fn check(&self, id: ItemId) -> Result<(), LookupError> {
		let failing = self.failing.read().map_err(LookupError::failed)?;
		if failing.contains(&id) {
			return Err(LookupError::Failed(format!("target lookup failed for {id}")));
		}
		Ok(())
	}
}

#[async_trait]
impl TargetIndex for InMemoryTargetIndex {
	async fn item_exists(&self, id: ItemId) -> Result<bool, LookupError> {
		self.check(id)?;
		let items = self.items.read().map_err(LookupError::failed)?;
		Ok(items.contains_key(&id))
	}

	async fn item_metadata(&self, ids: &[ItemId]) -> Result<Vec<TargetItemMetadata>, LookupError> {
		for id in ids {
			self.check(*id)?;
		}
		let items = self.items.read().map_err(LookupError::failed)?;
		Ok(ids
			.iter()
			.filter_map(|id| items.get(id).map(|rev| TargetItemMetadata::existing(*id, rev.clone())))
			.collect())
	}
}

/// Source tree held as a child adjacency map.
#[derive(Debug, Default, Clone)]
pub struct InMemorySourceIndex {
	children: Arc<RwLock<FxHashMap<ItemId, Vec<ItemId>>>>,
}

impl InMemorySourceIndex {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records `id` as a child of `parent_id`.
	pub fn insert(&self, id: ItemId, parent_id: ItemId) {
		if let Ok(mut guard) = self.children.write() {
			guard.entry(parent_id).or_default().push(id);
		}
	}
}

#[async_trait]
impl SourceIndex for InMemorySourceIndex {
	async fn descendants(&self, id: ItemId) -> Result<Vec<ItemDescriptor>, LookupError> {
		let children = self.children.read().map_err(LookupError::failed)?;
		let mut out = Vec::new();
		let mut frontier = vec![id];
		let mut seen = FxHashSet::default();
		while let Some(parent) = frontier.pop() {
			for child in children.get(&parent).into_iter().flatten() {
				if seen.insert(*child) {
					out.push(ItemDescriptor {
						id: *child,
						parent_id: Some(parent),
					});
					frontier.push(*child);
				}
			}
		}
		Ok(out)
	}
}

/// Validator accepting every candidate except an explicit reject list.
#[derive(Debug, Default, Clone)]
pub struct ListValidator {
	rejected: FxHashSet<ItemId>,
}

impl ListValidator {
	/// Accepts everything.
	pub fn accept_all() -> Self {
		Self::default()
	}

	/// Rejects the given ids.
	pub fn rejecting(ids: impl IntoIterator<Item = ItemId>) -> Self {
		Self {
			rejected: ids.into_iter().collect(),
		}
	}

	fn verdict(&self, candidate: &Candidate) -> Validity {
		if self.rejected.contains(&candidate.id) { Validity::Invalid } else { Validity::Valid }
	}
}

#[async_trait]
impl StructureValidator for ListValidator {
	async fn validate(&self, candidate: &Candidate) -> Result<Validity, LookupError> {
		Ok(self.verdict(candidate))
	}
}

#[async_trait]
impl ParentValidator for ListValidator {
	async fn validate(&self, candidate: &Candidate) -> Result<Validity, LookupError> {
		Ok(self.verdict(candidate))
	}
}
