//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::crawler::Cursor;
use crate::reply::ReplyRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult, WatermarkStore};
use crate::storage::{RunRecord, RunStatus, WatermarkRecord};
use crate::target::CrawlKind;
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Interrupted),
    })
}

impl WatermarkStore for SqliteStorage {
    fn load_watermark(&self, target: &str, checkpoint_key: &str) -> StorageResult<Option<Cursor>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT cursor FROM watermarks WHERE target = ?1 AND checkpoint_key = ?2",
                params![target, checkpoint_key],
                |row| row.get(0),
            )
            .optional()?;

        value
            .map(|value| {
                Cursor::new(value.clone()).map_err(|_| StorageError::InvalidCursor {
                    target: target.to_string(),
                    checkpoint_key: checkpoint_key.to_string(),
                    value,
                })
            })
            .transpose()
    }

    fn store_watermark(
        &mut self,
        target: &str,
        checkpoint_key: &str,
        cursor: &Cursor,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO watermarks (target, checkpoint_key, cursor, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(target, checkpoint_key) DO UPDATE SET
                cursor = excluded.cursor,
                updated_at = excluded.updated_at",
            params![target, checkpoint_key, cursor.as_str(), now],
        )?;
        Ok(())
    }

    fn clear_watermark(&mut self, target: &str, checkpoint_key: &str) -> StorageResult<()> {
        self.conn.execute(
            "DELETE FROM watermarks WHERE target = ?1 AND checkpoint_key = ?2",
            params![target, checkpoint_key],
        )?;
        Ok(())
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, config_hash, status FROM runs
             ORDER BY id DESC LIMIT ?1",
        )?;

        let runs = stmt
            .query_map(params![limit as i64], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(runs)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Replies =====

    fn upsert_reply(&mut self, reply: &ReplyRecord) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO replies (target, status_id, full_text, author, kind, collected_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(target, status_id) DO UPDATE SET
                full_text = excluded.full_text,
                author = excluded.author,
                kind = excluded.kind,
                collected_at = excluded.collected_at",
            params![
                reply.target,
                reply.status_id,
                reply.full_text,
                reply.author,
                reply.kind.to_db_string(),
                now
            ],
        )?;
        Ok(())
    }

    fn get_replies(&self, target: &str) -> StorageResult<Vec<ReplyRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT target, status_id, full_text, author, kind FROM replies
             WHERE target = ?1 ORDER BY status_id DESC",
        )?;

        let replies = stmt
            .query_map(params![target], |row| {
                Ok(ReplyRecord {
                    target: row.get(0)?,
                    status_id: row.get(1)?,
                    full_text: row.get(2)?,
                    author: row.get(3)?,
                    kind: CrawlKind::from_db_string(&row.get::<_, String>(4)?)
                        .unwrap_or(CrawlKind::Replies),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(replies)
    }

    fn count_replies(&self, target: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM replies WHERE target = ?1",
            params![target],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Reporting =====

    fn list_targets(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT target FROM replies
             UNION
             SELECT target FROM watermarks
             ORDER BY target",
        )?;

        let targets = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(targets)
    }

    fn list_watermarks(&self) -> StorageResult<Vec<WatermarkRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT target, checkpoint_key, cursor, updated_at FROM watermarks
             ORDER BY target, checkpoint_key",
        )?;

        let watermarks = stmt
            .query_map([], |row| {
                Ok(WatermarkRecord {
                    target: row.get(0)?,
                    checkpoint_key: row.get(1)?,
                    cursor: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(watermarks)
    }
}
