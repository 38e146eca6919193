//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::output::OutputResult;
use crate::storage::{RunRecord, Storage, WatermarkRecord};

/// Number of runs shown by `print_statistics`
const RECENT_RUNS: usize = 5;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Total number of stored replies
    pub total_replies: u64,

    /// Reply count per target, sorted by target
    pub replies_by_target: Vec<(String, u64)>,

    /// Every stored checkpoint
    pub watermarks: Vec<WatermarkRecord>,

    /// Most recent runs, newest first
    pub recent_runs: Vec<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(OutputError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> OutputResult<HarvestStatistics> {
    let mut replies_by_target = Vec::new();
    for target in storage.list_targets()? {
        let count = storage.count_replies(&target)?;
        replies_by_target.push((target, count));
    }
    let total_replies = replies_by_target.iter().map(|(_, count)| count).sum();

    Ok(HarvestStatistics {
        total_replies,
        replies_by_target,
        watermarks: storage.list_watermarks()?,
        recent_runs: storage.get_recent_runs(RECENT_RUNS)?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Total replies: {}", stats.total_replies);
    println!("  Targets: {}", stats.replies_by_target.len());
    println!();

    if !stats.replies_by_target.is_empty() {
        println!("Replies by Target:");
        for (target, count) in &stats.replies_by_target {
            println!("  {}: {}", target, count);
        }
        println!();
    }

    if !stats.watermarks.is_empty() {
        println!("Checkpoints:");
        for watermark in &stats.watermarks {
            println!(
                "  {} {} = {} (updated {})",
                watermark.target, watermark.checkpoint_key, watermark.cursor, watermark.updated_at
            );
        }
        println!();
    }

    if stats.recent_runs.is_empty() {
        println!("No harvest runs recorded");
        return;
    }

    println!("Recent Runs:");
    for run in &stats.recent_runs {
        println!(
            "  #{} {} started {} finished {}",
            run.id,
            run.status.to_db_string(),
            run.started_at,
            run.finished_at.as_deref().unwrap_or("-")
        );
    }
}
