//! Reply-Harvest: an incremental reply collector
//!
//! This crate walks a cursor-paginated search API page by page, keeps the
//! statuses that reply to (or quote) a configured target tweet, and records a
//! per-target watermark so the next invocation only collects what is new.

pub mod config;
pub mod crawler;
pub mod output;
pub mod reply;
pub mod storage;
pub mod target;

use thiserror::Error;

/// Main error type for Reply-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Crawl aborted: {0}")]
    Crawl(#[from] CrawlError),

    #[error("Failed to store watermark {key} for {target}: {source} (the current window will be re-collected on the next run)")]
    WatermarkWrite {
        target: String,
        key: String,
        source: storage::StorageError,
    },

    #[error("Failed to persist reply {status_id} for {target}: {source}")]
    ReplyWrite {
        target: String,
        status_id: String,
        source: storage::StorageError,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Harvest task failed: {0}")]
    Task(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Cursor-specific errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("Cursor must be a non-empty string of digits, got '{0}'")]
    NotNumeric(String),

    #[error("Unable to extract max_id from '{0}'")]
    MissingMaxId(String),

    #[error("Continuation cursor {next} is not below the previous upper bound {previous}")]
    NotDecreasing { previous: String, next: String },
}

/// Fatal outcomes of a single crawl
///
/// Window exhaustion, budget expiry and rate limiting are not errors; they end
/// the item sequence and are reported through the crawl summary instead.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Cursor parse failure: {0}")]
    Cursor(#[from] CursorError),

    #[error("Search request failed: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Crawl cancelled")]
    Cancelled,
}

/// Result type alias for Reply-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{extract_max_id, Cursor};
pub use target::{CrawlKind, Target};
