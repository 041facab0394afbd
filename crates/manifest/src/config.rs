//! Manifest calculation options and per-job settings.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::model::TargetId;

/// Errors that can occur when loading options.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error parsing TOML syntax or types.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// A size option that must be positive was zero.
	#[error("{0} must be greater than zero")]
	ZeroSize(&'static str),
}

/// Variant resolution mode, exactly one per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantMode {
	/// Revision comparison only.
	Plain,
	/// Publish windows withdraw items outside their availability.
	ContentAvailability,
	/// Active content tests may override the decision.
	ContentTesting,
}

/// Service-level options for manifest calculation.
///
/// ```toml
/// target-operations-batch-size = 500
/// delete-orphaned-items = true
/// content-availability = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ManifestOptions {
	/// Candidates per target lookup batch.
	pub target_operations_batch_size: usize,
	/// Target contexts per clone-source inspection batch.
	pub related_item_batch_size: usize,
	/// Bounded capacity of every inter-stage channel.
	pub stage_channel_capacity: usize,
	/// Merge orphan detection into descendant publishes.
	pub delete_orphaned_items: bool,
	pub content_availability: bool,
	pub content_testing: bool,
}

impl Default for ManifestOptions {
	fn default() -> Self {
		Self {
			target_operations_batch_size: 250,
			related_item_batch_size: 100,
			stage_channel_capacity: 64,
			delete_orphaned_items: false,
			content_availability: false,
			content_testing: false,
		}
	}
}

impl ManifestOptions {
	/// Parses and validates options from TOML. Missing keys take defaults.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let options: Self = toml::from_str(input)?;
		options.validate()?;
		Ok(options)
	}

	/// Rejects zero batch sizes and channel capacities.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.target_operations_batch_size == 0 {
			return Err(ConfigError::ZeroSize("target-operations-batch-size"));
		}
		if self.related_item_batch_size == 0 {
			return Err(ConfigError::ZeroSize("related-item-batch-size"));
		}
		if self.stage_channel_capacity == 0 {
			return Err(ConfigError::ZeroSize("stage-channel-capacity"));
		}
		Ok(())
	}

	/// Selects the variant mode. Content availability takes precedence over
	/// content testing.
	pub fn variant_mode(&self) -> VariantMode {
		if self.content_availability {
			VariantMode::ContentAvailability
		} else if self.content_testing {
			VariantMode::ContentTesting
		} else {
			VariantMode::Plain
		}
	}
}

/// Settings of one publish job against one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishJob {
	pub target_id: TargetId,
	/// The job publishes whole subtrees.
	pub descendants: bool,
	/// The job also publishes related items such as clone sources.
	pub related_items: bool,
	/// Republish every candidate regardless of target revision.
	pub republish_all: bool,
	/// Use bucket-aware parent rules.
	pub item_buckets_enabled: bool,
	/// Job start, the reference time for publish windows.
	pub started: DateTime<Utc>,
}

impl PublishJob {
	pub fn new(target_id: TargetId, started: DateTime<Utc>) -> Self {
		Self {
			target_id,
			descendants: false,
			related_items: false,
			republish_all: false,
			item_buckets_enabled: false,
			started,
		}
	}
}
