//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::crawler::Cursor;
use crate::reply::ReplyRecord;
use crate::storage::{RunRecord, RunStatus, WatermarkRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Stored cursor for {target}/{checkpoint_key} is invalid: '{value}'")]
    InvalidCursor {
        target: String,
        checkpoint_key: String,
        value: String,
    },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable per-(target, checkpoint key) cursors
///
/// A missing checkpoint is a valid state (first run), not an error.
pub trait WatermarkStore {
    /// Returns the last recorded cursor, if any
    fn load_watermark(&self, target: &str, checkpoint_key: &str) -> StorageResult<Option<Cursor>>;

    /// Records `cursor`, replacing any previous value
    fn store_watermark(
        &mut self,
        target: &str,
        checkpoint_key: &str,
        cursor: &Cursor,
    ) -> StorageResult<()>;

    /// Removes a checkpoint; removing a missing one is not an error
    fn clear_watermark(&mut self, target: &str, checkpoint_key: &str) -> StorageResult<()>;
}

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the harvester.
pub trait Storage: WatermarkStore {
    // ===== Run Management =====

    /// Creates a new harvest run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent runs, newest first
    fn get_recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;

    /// Marks a run as finished with the given status
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Replies =====

    /// Inserts a reply, overwriting an earlier copy of the same status
    fn upsert_reply(&mut self, reply: &ReplyRecord) -> StorageResult<()>;

    /// Gets all replies for a target, newest first
    fn get_replies(&self, target: &str) -> StorageResult<Vec<ReplyRecord>>;

    /// Counts replies for a target
    fn count_replies(&self, target: &str) -> StorageResult<u64>;

    // ===== Reporting =====

    /// Every target that has replies or checkpoints, sorted
    fn list_targets(&self) -> StorageResult<Vec<String>>;

    /// Every stored checkpoint, sorted by target and key
    fn list_watermarks(&self) -> StorageResult<Vec<WatermarkRecord>>;
}
