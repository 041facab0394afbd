use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{Duration, TimeZone, Utc};
use futures::TryStreamExt;
use pretty_assertions::assert_eq;
use strand_stream::{JobToken, StageExit, StageStream, spawn_stage};
use uuid::Uuid;

use super::*;
use crate::memory::InMemoryTargetIndex;
use crate::model::{Candidate, ItemId, PublishWindow, Revision};

const TARGET: TargetId = Uuid::from_u128(0xfeed);

fn id(n: u128) -> ItemId {
	Uuid::from_u128(n)
}

fn candidate(n: u128, rev: &str) -> Candidate {
	Candidate::new(id(n), Some(id(0)), Revision::new(rev))
}

fn valid(n: u128, rev: &str) -> CandidateValidationContext {
	CandidateValidationContext::valid(candidate(n, rev))
}

/// Counts bulk lookups on top of an in-memory index.
#[derive(Default)]
struct CountingTarget {
	inner: InMemoryTargetIndex,
	lookups: AtomicUsize,
}

#[async_trait]
impl TargetIndex for CountingTarget {
	async fn item_exists(&self, id: ItemId) -> Result<bool, LookupError> {
		self.inner.item_exists(id).await
	}

	async fn item_metadata(&self, ids: &[ItemId]) -> Result<Vec<TargetItemMetadata>, LookupError> {
		self.lookups.fetch_add(1, Ordering::SeqCst);
		self.inner.item_metadata(ids).await
	}
}

async fn resolve(target: Arc<dyn TargetIndex>, strategy: Arc<dyn VariantStrategy>, batches: Vec<Vec<CandidateValidationContext>>) -> Vec<CandidateValidationTargetContext> {
	let stage = BatchVariantResolver::new(TARGET, target, strategy);
	let (out, task) = spawn_stage(stage, StageStream::from_items("batches", batches), JobToken::default(), 16);
	let items = out.try_collect().await.unwrap();
	assert_eq!(task.join().await, Ok(StageExit::Completed));
	items
}

#[tokio::test]
async fn duplicates_in_a_batch_yield_one_decision() {
	let target = InMemoryTargetIndex::new();
	target.insert(id(2), Revision::new("r2"));

	let got = resolve(Arc::new(target), Arc::new(PlainVariants::new(false)), vec![vec![valid(1, "first"), valid(1, "second"), valid(2, "r2")]]).await;

	assert_eq!(
		got,
		vec![
			CandidateValidationTargetContext::valid(TARGET, candidate(1, "first"), PromotionDecision::Create),
			CandidateValidationTargetContext::valid(TARGET, candidate(2, "r2"), PromotionDecision::Unchanged),
		]
	);
}

#[tokio::test]
async fn dedup_is_batch_local() {
	let got = resolve(
		Arc::new(InMemoryTargetIndex::new()),
		Arc::new(PlainVariants::new(false)),
		vec![vec![valid(1, "a")], vec![valid(1, "b")]],
	)
	.await;
	assert_eq!(got.len(), 2);
}

#[tokio::test]
async fn invalids_bypass_the_lookup() {
	let target = Arc::new(CountingTarget::default());
	let batch = vec![CandidateValidationContext::invalid(id(7)), CandidateValidationContext::invalid(id(8))];

	let got = resolve(Arc::clone(&target) as Arc<dyn TargetIndex>, Arc::new(PlainVariants::new(false)), vec![batch]).await;

	assert_eq!(
		got,
		vec![CandidateValidationTargetContext::invalid(TARGET, id(7)), CandidateValidationTargetContext::invalid(TARGET, id(8))]
	);
	assert_eq!(target.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invalids_are_emitted_before_decisions() {
	let target = Arc::new(CountingTarget::default());
	let batch = vec![valid(1, "a"), CandidateValidationContext::invalid(id(9)), valid(2, "b")];

	let got = resolve(Arc::clone(&target) as Arc<dyn TargetIndex>, Arc::new(PlainVariants::new(false)), vec![batch]).await;

	let ids: Vec<_> = got.iter().map(CandidateValidationTargetContext::id).collect();
	assert_eq!(ids, vec![id(9), id(1), id(2)]);
	assert_eq!(target.lookups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn revision_change_or_republish_updates() {
	let target = InMemoryTargetIndex::new();
	target.insert(id(1), Revision::new("old"));
	target.insert(id(2), Revision::new("same"));
	let target: Arc<dyn TargetIndex> = Arc::new(target);
	let batch = vec![valid(1, "new"), valid(2, "same")];

	let plain = resolve(Arc::clone(&target), Arc::new(PlainVariants::new(false)), vec![batch.clone()]).await;
	let republish = resolve(target, Arc::new(PlainVariants::new(true)), vec![batch]).await;

	let decisions = |v: &[CandidateValidationTargetContext]| v.iter().map(CandidateValidationTargetContext::decision).collect::<Vec<_>>();
	assert_eq!(decisions(plain.as_slice()), vec![Some(PromotionDecision::Update), Some(PromotionDecision::Unchanged)]);
	assert_eq!(decisions(republish.as_slice()), vec![Some(PromotionDecision::Update), Some(PromotionDecision::Update)]);
}

#[tokio::test]
async fn expired_candidates_are_withdrawn() {
	let now = Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap();
	let target = InMemoryTargetIndex::new();
	target.insert(id(1), Revision::new("r"));

	let expired = PublishWindow {
		valid_from: None,
		valid_to: Some(now - Duration::days(1)),
	};
	let mut present = candidate(1, "r");
	present.availability = expired;
	let mut absent = candidate(2, "r");
	absent.availability = expired;
	let live = candidate(3, "r");

	let strategy = Arc::new(AvailabilityVariants::new(PlainVariants::new(false), now));
	let batch = vec![CandidateValidationContext::valid(present), CandidateValidationContext::valid(absent), CandidateValidationContext::valid(live.clone())];
	let got = resolve(Arc::new(target), strategy, vec![batch]).await;

	assert_eq!(
		got,
		vec![
			CandidateValidationTargetContext::invalid(TARGET, id(1)),
			CandidateValidationTargetContext::valid(TARGET, live, PromotionDecision::Create),
		]
	);
}

struct PinnedTest(ItemId);

#[async_trait]
impl TestableContent for PinnedTest {
	async fn test_decision(&self, ctx: &CandidatePromotionContext) -> Result<Option<PromotionDecision>, LookupError> {
		Ok((ctx.candidate.id == self.0).then_some(PromotionDecision::Update))
	}
}

#[tokio::test]
async fn active_tests_override_the_decision() {
	let target = InMemoryTargetIndex::new();
	target.insert(id(1), Revision::new("r"));
	target.insert(id(2), Revision::new("r"));

	let strategy = Arc::new(TestingVariants::new(PlainVariants::new(false), Arc::new(PinnedTest(id(1)))));
	let got = resolve(Arc::new(target), strategy, vec![vec![valid(1, "r"), valid(2, "r")]]).await;

	let decisions: Vec<_> = got.iter().map(CandidateValidationTargetContext::decision).collect();
	assert_eq!(decisions, vec![Some(PromotionDecision::Update), Some(PromotionDecision::Unchanged)]);
}

/// Cancels the job while deciding the first candidate.
struct CancelOnFirst(JobToken);

#[async_trait]
impl VariantStrategy for CancelOnFirst {
	fn name(&self) -> &'static str {
		"cancel-on-first"
	}

	async fn decide(&self, _ctx: &CandidatePromotionContext) -> Result<VariantOutcome, LookupError> {
		self.0.cancel();
		Ok(VariantOutcome::Publish(PromotionDecision::Create))
	}
}

#[tokio::test]
async fn cancellation_stops_between_candidates() {
	let token = JobToken::default();
	let stage = BatchVariantResolver::new(TARGET, Arc::new(InMemoryTargetIndex::new()), Arc::new(CancelOnFirst(token.clone())));
	let input = StageStream::from_items("batches", vec![vec![valid(1, "r"), valid(2, "r"), valid(3, "r")]]);
	let (out, task) = spawn_stage(stage, input, token, 16);

	let got: Vec<_> = out.try_collect().await.unwrap();
	assert!(got.len() <= 1);
	assert_eq!(task.join().await, Ok(StageExit::Cancelled));
}

/// Returns every stored row twice, the second copy at a stale revision.
struct DuplicateRows(InMemoryTargetIndex);

#[async_trait]
impl TargetIndex for DuplicateRows {
	async fn item_exists(&self, id: ItemId) -> Result<bool, LookupError> {
		self.0.item_exists(id).await
	}

	async fn item_metadata(&self, ids: &[ItemId]) -> Result<Vec<TargetItemMetadata>, LookupError> {
		let mut rows = self.0.item_metadata(ids).await?;
		let stale: Vec<_> = rows.iter().map(|row| TargetItemMetadata::existing(row.id, Revision::new("stale"))).collect();
		rows.extend(stale);
		Ok(rows)
	}
}

#[tokio::test]
async fn first_metadata_row_per_id_wins() {
	let target = InMemoryTargetIndex::new();
	target.insert(id(1), Revision::new("r1"));

	let got = resolve(Arc::new(DuplicateRows(target)), Arc::new(PlainVariants::new(false)), vec![vec![valid(1, "r1")]]).await;
	assert_eq!(got, vec![CandidateValidationTargetContext::valid(TARGET, candidate(1, "r1"), PromotionDecision::Unchanged)]);
}

/// Target whose metadata lookups observe a cancelled job.
struct CancelledMetadata;

#[async_trait]
impl TargetIndex for CancelledMetadata {
	async fn item_exists(&self, _id: ItemId) -> Result<bool, LookupError> {
		Err(LookupError::Cancelled)
	}

	async fn item_metadata(&self, _ids: &[ItemId]) -> Result<Vec<TargetItemMetadata>, LookupError> {
		Err(LookupError::Cancelled)
	}
}

#[tokio::test]
async fn cancelled_metadata_lookup_ends_cleanly() {
	let stage = BatchVariantResolver::new(TARGET, Arc::new(CancelledMetadata), Arc::new(PlainVariants::new(false)));
	let batches = vec![vec![CandidateValidationContext::invalid(id(4)), valid(1, "r")], vec![valid(2, "r")]];
	let (out, task) = spawn_stage(stage, StageStream::from_items("batches", batches), JobToken::default(), 4);

	let got: Vec<_> = out.try_collect().await.unwrap();
	assert_eq!(got, vec![CandidateValidationTargetContext::invalid(TARGET, id(4))]);
	assert_eq!(task.join().await, Ok(StageExit::Cancelled));
}

#[tokio::test]
async fn lookup_failure_errors_the_stream() {
	let target = InMemoryTargetIndex::new();
	target.fail_on(id(1));
	let stage = BatchVariantResolver::new(TARGET, Arc::new(target), Arc::new(PlainVariants::new(false)));
	let (out, task) = spawn_stage(stage, StageStream::from_items("batches", vec![vec![valid(1, "r")]]), JobToken::default(), 4);

	let collected: Result<Vec<_>, _> = out.try_collect().await;
	assert!(matches!(collected, Err(StageError::Lookup { stage: BatchVariantResolver::NAME, .. })));
	assert!(task.join().await.is_err());
}

#[test]
fn testing_mode_requires_testable_content() {
	let job = PublishJob::new(TARGET, Utc::now());
	assert!(matches!(strategy_for(VariantMode::ContentTesting, &job, None), Err(PipelineError::MissingCollaborator(_))));
	assert!(strategy_for(VariantMode::Plain, &job, None).is_ok());
}
