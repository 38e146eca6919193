//! Output module for reporting harvest results
//!
//! This module handles:
//! - Collecting stored replies and checkpoints into a summary
//! - Exporting that summary as markdown
//! - Printing statistics about the database

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{load_statistics, print_statistics, HarvestStatistics};

use crate::reply::ReplyRecord;
use crate::storage::{RunRecord, Storage, StorageError, WatermarkRecord};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Replies collected for one target
#[derive(Debug, Clone)]
pub struct TargetReplies {
    pub target: String,

    /// Newest first
    pub replies: Vec<ReplyRecord>,

    pub watermarks: Vec<WatermarkRecord>,
}

/// Everything the exported summary shows
#[derive(Debug, Clone, Default)]
pub struct HarvestSummary {
    /// The latest run, if any run was recorded
    pub run: Option<RunRecord>,

    pub duration_seconds: Option<u64>,

    pub targets: Vec<TargetReplies>,
}

impl HarvestSummary {
    pub fn total_replies(&self) -> usize {
        self.targets.iter().map(|t| t.replies.len()).sum()
    }
}

/// Generates a harvest summary from storage
///
/// # Arguments
///
/// * `storage` - The storage backend containing harvest data
///
/// # Returns
///
/// * `Ok(HarvestSummary)` - Successfully generated summary
/// * `Err(OutputError)` - Failed to query storage
pub fn generate_summary(storage: &dyn Storage) -> OutputResult<HarvestSummary> {
    let run = storage.get_recent_runs(1)?.into_iter().next();
    let duration_seconds = run.as_ref().and_then(run_duration_seconds);

    let watermarks = storage.list_watermarks()?;
    let mut targets = Vec::new();
    for target in storage.list_targets()? {
        let replies = storage.get_replies(&target)?;
        let target_watermarks = watermarks
            .iter()
            .filter(|w| w.target == target)
            .cloned()
            .collect();
        targets.push(TargetReplies {
            target,
            replies,
            watermarks: target_watermarks,
        });
    }

    Ok(HarvestSummary {
        run,
        duration_seconds,
        targets,
    })
}

fn run_duration_seconds(run: &RunRecord) -> Option<u64> {
    let started = run.started_at.parse::<chrono::DateTime<chrono::Utc>>().ok()?;
    let finished = run
        .finished_at
        .as_ref()?
        .parse::<chrono::DateTime<chrono::Utc>>()
        .ok()?;
    u64::try_from((finished - started).num_seconds()).ok()
}
