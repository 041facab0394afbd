//! Assembly of the fixed stage order for one publish job.
//!
//! ```text
//! source
//!   -> structure validation
//!   -> parent validation            (bucket rules when buckets are enabled)
//!   -> [merge orphan detection]     (delete orphans + descendant publish)
//!   -> batch -> variant resolution  (plain | content availability | content testing)
//!   -> deferred items
//!   -> [merge clone sources]        (related items; result is multicast)
//! ```

use std::sync::Arc;

use strand_stream::{Batcher, JobToken, Multicast, StageStream, StageTask, merge, spawn_stage};

use crate::collab::{CloneSourceInspector, OrphanDetector, ParentValidator, SourceIndex, StructureValidator, TargetIndex, TestableContent};
use crate::config::{ManifestOptions, PublishJob, VariantMode};
use crate::deferred::DeferredResolver;
use crate::error::PipelineError;
use crate::model::{CandidateValidationContext, CandidateValidationTargetContext};
use crate::side::{CloneSourceStage, OrphanStage};
use crate::validation::{ParentValidationStage, StructureValidationStage};
use crate::variants::{BatchVariantResolver, strategy_for};

/// External capabilities one pipeline consumes.
#[derive(Clone)]
pub struct Collaborators {
	pub target: Arc<dyn TargetIndex>,
	pub source: Arc<dyn SourceIndex>,
	pub structure: Arc<dyn StructureValidator>,
	pub parent: Arc<dyn ParentValidator>,
	pub bucket_parent: Option<Arc<dyn ParentValidator>>,
	pub orphans: Option<Arc<dyn OrphanDetector>>,
	pub clone_sources: Option<Arc<dyn CloneSourceInspector>>,
	pub testable: Option<Arc<dyn TestableContent>>,
}

impl Collaborators {
	/// Collaborators every job needs.
	pub fn new(target: Arc<dyn TargetIndex>, source: Arc<dyn SourceIndex>, structure: Arc<dyn StructureValidator>, parent: Arc<dyn ParentValidator>) -> Self {
		Self {
			target,
			source,
			structure,
			parent,
			bucket_parent: None,
			orphans: None,
			clone_sources: None,
			testable: None,
		}
	}

	#[must_use]
	pub fn with_bucket_parent(mut self, validator: Arc<dyn ParentValidator>) -> Self {
		self.bucket_parent = Some(validator);
		self
	}

	#[must_use]
	pub fn with_orphans(mut self, detector: Arc<dyn OrphanDetector>) -> Self {
		self.orphans = Some(detector);
		self
	}

	#[must_use]
	pub fn with_clone_sources(mut self, inspector: Arc<dyn CloneSourceInspector>) -> Self {
		self.clone_sources = Some(inspector);
		self
	}

	#[must_use]
	pub fn with_testable(mut self, content: Arc<dyn TestableContent>) -> Self {
		self.testable = Some(content);
		self
	}
}

/// Final stream of a manifest pipeline.
pub enum ManifestOutput {
	/// One consumer.
	Single(StageStream<CandidateValidationTargetContext>),
	/// Shared by several consumers.
	///
	/// Returned unconnected so every consumer can subscribe before the single
	/// pass starts: subscribe, then call [`Multicast::connect`]. Until then the
	/// upstream stages stall on back-pressure once their channels fill.
	/// [`PublishManifest::into_stream`] subscribes and connects in one step.
	Shared(Multicast<CandidateValidationTargetContext>),
}

/// A running manifest pipeline.
pub struct PublishManifest {
	output: ManifestOutput,
	tasks: Vec<StageTask>,
}

impl PublishManifest {
	pub fn is_shared(&self) -> bool {
		matches!(self.output, ManifestOutput::Shared(_))
	}

	/// Splits into the output and the stage task handles.
	pub fn into_parts(self) -> (ManifestOutput, Vec<StageTask>) {
		(self.output, self.tasks)
	}

	/// Returns one consumer stream, connecting a shared output.
	pub fn into_stream(self) -> StageStream<CandidateValidationTargetContext> {
		match self.output {
			ManifestOutput::Single(stream) => stream,
			ManifestOutput::Shared(mut hub) => {
				let stream = hub.subscribe();
				hub.connect();
				stream
			}
		}
	}
}

/// Composer for the manifest stages of one publish job.
pub struct ManifestPipeline {
	options: ManifestOptions,
	job: PublishJob,
	collaborators: Collaborators,
}

impl ManifestPipeline {
	pub fn new(options: ManifestOptions, job: PublishJob, collaborators: Collaborators) -> Result<Self, PipelineError> {
		options.validate()?;
		Ok(Self { options, job, collaborators })
	}

	fn orphans_enabled(&self) -> bool {
		self.options.delete_orphaned_items && self.job.descendants
	}

	fn parent_validator(&self) -> Result<Arc<dyn ParentValidator>, PipelineError> {
		if !self.job.item_buckets_enabled {
			return Ok(Arc::clone(&self.collaborators.parent));
		}
		self.collaborators.bucket_parent.clone().ok_or(PipelineError::MissingCollaborator("bucket-parent-validator"))
	}

	/// Fails before anything is spawned when the configuration needs a
	/// collaborator that is absent.
	fn check(&self) -> Result<(), PipelineError> {
		self.parent_validator()?;
		if self.orphans_enabled() && self.collaborators.orphans.is_none() {
			return Err(PipelineError::MissingCollaborator("orphan-detector"));
		}
		if self.job.related_items && self.collaborators.clone_sources.is_none() {
			return Err(PipelineError::MissingCollaborator("clone-source-inspector"));
		}
		if self.options.variant_mode() == VariantMode::ContentTesting && self.collaborators.testable.is_none() {
			return Err(PipelineError::MissingCollaborator("testable-content"));
		}
		Ok(())
	}

	/// Spawns every stage over `source` and returns the final stream.
	///
	/// # Panics
	///
	/// Panics when called outside a Tokio runtime.
	pub fn build(&self, source: StageStream<CandidateValidationContext>, token: &JobToken) -> Result<PublishManifest, PipelineError> {
		self.check()?;
		let cap = self.options.stage_channel_capacity;
		let c = &self.collaborators;
		let mut tasks = Vec::new();

		let (stream, task) = spawn_stage(StructureValidationStage::new(Arc::clone(&c.structure)), source, token.clone(), cap);
		tasks.push(task);
		let (mut stream, task) = spawn_stage(ParentValidationStage::new(self.parent_validator()?), stream, token.clone(), cap);
		tasks.push(task);

		if self.orphans_enabled()
			&& let Some(detector) = &c.orphans
		{
			let mut tee = Multicast::new("orphan-tee", stream, cap);
			let main = tee.subscribe();
			let side = tee.subscribe();
			tee.connect();
			let (orphans, task) = spawn_stage(OrphanStage::new(Arc::clone(detector)), side, token.clone(), cap);
			tasks.push(task);
			stream = merge("orphan-merge", main, orphans, cap);
		}

		let strategy = strategy_for(self.options.variant_mode(), &self.job, c.testable.clone())?;
		let (batches, task) = spawn_stage(Batcher::new("variant-batches", self.options.target_operations_batch_size), stream, token.clone(), cap);
		tasks.push(task);
		let resolver = BatchVariantResolver::new(self.job.target_id, Arc::clone(&c.target), strategy);
		let (targets, task) = spawn_stage(resolver, batches, token.clone(), cap);
		tasks.push(task);
		let (targets, task) = spawn_stage(DeferredResolver::new(Arc::clone(&c.source), Arc::clone(&c.target)), targets, token.clone(), cap);
		tasks.push(task);

		let output = match (&c.clone_sources, self.job.related_items) {
			(Some(inspector), true) => {
				let mut tee = Multicast::new("clone-tee", targets, cap);
				let main = tee.subscribe();
				let side = tee.subscribe();
				tee.connect();
				let (side, task) = spawn_stage(Batcher::new("clone-batches", self.options.related_item_batch_size), side, token.clone(), cap);
				tasks.push(task);
				let (clones, task) = spawn_stage(CloneSourceStage::new(Arc::clone(inspector)), side, token.clone(), cap);
				tasks.push(task);
				ManifestOutput::Shared(Multicast::new("publish-manifest", merge("clone-merge", main, clones, cap), cap))
			}
			_ => ManifestOutput::Single(targets),
		};

		tracing::debug!(
			job = token.job(),
			target = %self.job.target_id,
			mode = ?self.options.variant_mode(),
			orphans = self.orphans_enabled(),
			related = self.job.related_items,
			stages = tasks.len(),
			"manifest.build"
		);
		Ok(PublishManifest { output, tasks })
	}
}
