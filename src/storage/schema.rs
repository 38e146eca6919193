//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Reply-Harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Per-target checkpoints
CREATE TABLE IF NOT EXISTS watermarks (
    target TEXT NOT NULL,
    checkpoint_key TEXT NOT NULL,
    cursor TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (target, checkpoint_key)
);

-- Collected replies, keyed so re-delivered statuses overwrite themselves
CREATE TABLE IF NOT EXISTS replies (
    target TEXT NOT NULL,
    status_id TEXT NOT NULL,
    full_text TEXT NOT NULL,
    author TEXT NOT NULL,
    kind TEXT NOT NULL,
    collected_at TEXT NOT NULL,
    PRIMARY KEY (target, status_id)
);

CREATE INDEX IF NOT EXISTS idx_replies_kind ON replies(target, kind);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
