//! Crawler module for incremental search harvesting
//!
//! This module contains the core crawling logic, including:
//! - Cursor parsing and continuation extraction
//! - Search page fetching and error classification
//! - Retry policy and execution time budget
//! - The pull-based crawl loop
//! - Per-target harvest coordination

mod budget;
mod coordinator;
mod credentials;
mod cursor;
mod fetcher;
mod retry;
mod stream;

pub use budget::{Deadline, TimeBudget};
pub use coordinator::{
    run_harvest, CheckpointUpdate, HarvestReport, Harvester, JobOutcome, JobReport,
};
pub use credentials::{
    CredentialCache, CredentialError, Credentials, EnvSecretSource, SecretSource,
    StaticSecretSource,
};
pub use cursor::{extract_max_id, Cursor};
pub use fetcher::{
    build_http_client, Entities, FetchError, Page, PageFetcher, PageRequest, SearchClient, Status,
    User, UserMention,
};
pub use retry::{RetryDecision, RetryPolicy};
pub use stream::{
    start_crawl, CrawlIncomplete, CrawlRequest, CrawlSettings, CrawlSummary, FinalCursor,
    SearchCrawl, StopReason,
};
