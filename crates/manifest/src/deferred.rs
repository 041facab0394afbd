//! Parent-before-child ordering for target-shaped candidate streams.
//!
//! Children arriving before their parent is known to exist in the target are
//! parked under the parent id and replayed once the parent resolves. Resolved
//! items are held until upstream completes, because a later invalid ancestor
//! may still redirect them. The flush then:
//!
//! 1. replays anything still parked under a resolved id,
//! 2. collects the source descendants of every invalid id,
//! 3. emits each resolved item, in resolution order, unless it is such a
//!    descendant; descendants present in the target are emitted as invalid
//!    and the rest are dropped,
//! 4. abandons whatever is still parked, since its parent never resolved.
//!
//! A flush run after cancellation can see its lookups answer
//! [`LookupError::Cancelled`]. The descendant set then falls back to the
//! parent chains held in the resolved table, and a cancelled existence check
//! drops the descendant.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use strand_stream::{LookupError, Stage, StageContext, StageError};

use crate::collab::{SourceIndex, TargetIndex};
use crate::model::{CandidateValidationTargetContext, ItemId, ROOT_ITEM_ID};

/// Per-job resolver tables. Every id lives in at most one of `invalid`,
/// `resolved` and the parked lists.
#[derive(Debug, Default)]
struct DeferredState {
	/// Parent id to the children waiting on it, in arrival order.
	parked: FxHashMap<ItemId, Vec<CandidateValidationTargetContext>>,
	/// Ids present in some `parked` list.
	parked_ids: FxHashSet<ItemId>,
	/// Resolved items. Key order is resolution order.
	resolved: IndexMap<ItemId, CandidateValidationTargetContext>,
	invalid: FxHashSet<ItemId>,
}

impl DeferredState {
	fn seen(&self, id: ItemId) -> bool {
		self.invalid.contains(&id) || self.resolved.contains_key(&id) || self.parked_ids.contains(&id)
	}

	fn park(&mut self, parent_id: ItemId, ctx: CandidateValidationTargetContext) {
		self.parked_ids.insert(ctx.id());
		self.parked.entry(parent_id).or_default().push(ctx);
	}

	fn resolve(&mut self, ctx: CandidateValidationTargetContext) {
		let id = ctx.id();
		self.resolved.insert(id, ctx);
		self.replay(vec![id]);
	}

	/// Resolved ids whose parent chain, followed through the resolved table,
	/// reaches an invalid id.
	fn resolved_under_invalid(&self) -> FxHashSet<ItemId> {
		let mut found = FxHashSet::default();
		for (id, ctx) in &self.resolved {
			let mut parent = ctx.candidate().and_then(|c| c.parent_id);
			let mut steps = 0;
			while let Some(p) = parent {
				if self.invalid.contains(&p) || found.contains(&p) {
					found.insert(*id);
					break;
				}
				// Links loop when the target places an item under another parent.
				steps += 1;
				if steps > self.resolved.len() {
					break;
				}
				parent = self.resolved.get(&p).and_then(|c| c.candidate()).and_then(|c| c.parent_id);
			}
		}
		found
	}

	/// Breadth-first replay of everything parked under `parents`.
	fn replay(&mut self, mut parents: Vec<ItemId>) {
		loop {
			let children: Vec<_> = parents.iter().filter_map(|id| self.parked.remove(id)).flatten().collect();
			if children.is_empty() {
				break;
			}
			parents = children.iter().map(CandidateValidationTargetContext::id).collect();
			for child in children {
				self.parked_ids.remove(&child.id());
				self.resolved.insert(child.id(), child);
			}
		}
	}
}

/// Stage enforcing parent-before-child emission with the invalid cascade.
pub struct DeferredResolver {
	source: Arc<dyn SourceIndex>,
	target: Arc<dyn TargetIndex>,
	state: DeferredState,
	flushed: bool,
}

impl DeferredResolver {
	pub const NAME: &'static str = "deferred-items";

	pub fn new(source: Arc<dyn SourceIndex>, target: Arc<dyn TargetIndex>) -> Self {
		Self {
			source,
			target,
			state: DeferredState::default(),
			flushed: false,
		}
	}

	async fn parent_present(&self, parent_id: ItemId) -> Result<bool, StageError> {
		if parent_id == ROOT_ITEM_ID || self.state.resolved.contains_key(&parent_id) {
			return Ok(true);
		}
		self.target.item_exists(parent_id).await.map_err(|e| StageError::lookup(Self::NAME, e))
	}

	/// Source descendants of every invalid id, or the locally known ones once
	/// the source index reports cancellation.
	async fn invalid_descendants(&self) -> Result<FxHashSet<ItemId>, StageError> {
		let mut descendants = FxHashSet::default();
		for id in &self.state.invalid {
			match self.source.descendants(*id).await {
				Ok(found) => descendants.extend(found.into_iter().map(|d| d.id)),
				Err(LookupError::Cancelled) => {
					tracing::debug!(invalid = self.state.invalid.len(), "deferred.local_cascade");
					descendants.extend(self.state.resolved_under_invalid());
					return Ok(descendants);
				}
				Err(err) => return Err(StageError::lookup(Self::NAME, err)),
			}
		}
		Ok(descendants)
	}

	async fn flush(&mut self, out: &StageContext<CandidateValidationTargetContext>) -> Result<(), StageError> {
		if std::mem::replace(&mut self.flushed, true) {
			return Ok(());
		}

		let seeds: Vec<ItemId> = self.state.resolved.keys().copied().collect();
		self.state.replay(seeds);

		let invalid_descendants = self.invalid_descendants().await?;

		tracing::debug!(
			resolved = self.state.resolved.len(),
			invalid = self.state.invalid.len(),
			invalid_descendants = invalid_descendants.len(),
			abandoned = self.state.parked_ids.len(),
			cancelled = out.is_cancelled(),
			"deferred.flush"
		);

		let resolved = std::mem::take(&mut self.state.resolved);
		for (id, ctx) in resolved {
			if !invalid_descendants.contains(&id) {
				out.emit(ctx).await?;
				continue;
			}
			// Under an invalid ancestor: remove from the target if present.
			let exists = match self.target.item_exists(id).await {
				Ok(exists) => exists,
				Err(LookupError::Cancelled) => false,
				Err(err) => return Err(StageError::lookup(Self::NAME, err)),
			};
			if exists {
				out.emit(CandidateValidationTargetContext::invalid(ctx.target_id(), id)).await?;
			} else {
				tracing::trace!(%id, "deferred.dropped_invalid_descendant");
			}
		}

		for (parent_id, children) in self.state.parked.drain() {
			tracing::trace!(%parent_id, children = children.len(), "deferred.abandoned");
		}
		self.state.parked_ids.clear();
		Ok(())
	}
}

#[async_trait]
impl Stage for DeferredResolver {
	type In = CandidateValidationTargetContext;
	type Out = CandidateValidationTargetContext;

	fn name(&self) -> &'static str {
		Self::NAME
	}

	async fn handle(&mut self, ctx: CandidateValidationTargetContext, out: &mut StageContext<CandidateValidationTargetContext>) -> Result<(), StageError> {
		let id = ctx.id();
		// The root is always present in the target and never republished.
		if id == ROOT_ITEM_ID {
			return Ok(());
		}
		if self.state.seen(id) {
			tracing::trace!(%id, "deferred.duplicate");
			return Ok(());
		}

		let parent_id = ctx.candidate().and_then(|c| c.parent_id);
		let Some(parent_id) = parent_id else {
			self.state.invalid.insert(id);
			return out.emit(CandidateValidationTargetContext::invalid(ctx.target_id(), id)).await;
		};

		if self.parent_present(parent_id).await? {
			self.state.resolve(ctx);
		} else {
			self.state.park(parent_id, ctx);
		}
		Ok(())
	}

	async fn on_complete(&mut self, out: &mut StageContext<CandidateValidationTargetContext>) -> Result<(), StageError> {
		self.flush(out).await
	}

	async fn on_cancel(&mut self, out: &mut StageContext<CandidateValidationTargetContext>) -> Result<(), StageError> {
		self.flush(out).await
	}
}
