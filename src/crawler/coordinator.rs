//! Harvest coordinator - per-target orchestration
//!
//! This module runs one crawl per configured (target, kind) pair:
//! - Loading the watermark and any suspended-window resume point
//! - Draining the crawl, filtering statuses and storing matching replies
//! - Committing the checkpoint only after the window has been drained
//! - Running independent jobs concurrently under a global limit
//! - Recording the run in storage

use crate::config::Config;
use crate::crawler::budget::{Deadline, TimeBudget};
use crate::crawler::credentials::{CredentialCache, EnvSecretSource};
use crate::crawler::fetcher::{build_http_client, PageFetcher, SearchClient};
use crate::crawler::retry::RetryPolicy;
use crate::crawler::stream::{start_crawl, CrawlRequest, CrawlSettings, CrawlSummary};
use crate::crawler::Cursor;
use crate::reply::ReplyRecord;
use crate::storage::{RunStatus, SqliteStorage, Storage, StorageError, WatermarkStore};
use crate::target::{CrawlKind, Target};
use crate::{CrawlError, HarvestError};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// What happened to a job's checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointUpdate {
    /// No cursor was observed; nothing was written
    Unchanged,

    /// The window was exhausted and the watermark now holds this cursor
    Advanced(Cursor),

    /// The window was cut short; the next run resumes below this cursor
    Suspended(Cursor),
}

/// Final state of one (target, kind) job
#[derive(Debug)]
pub enum JobOutcome {
    Finished {
        summary: CrawlSummary,
        checkpoint: CheckpointUpdate,
    },
    Cancelled,
    Failed(HarvestError),
}

/// Result of one (target, kind) job
#[derive(Debug)]
pub struct JobReport {
    pub target: Target,
    pub kind: CrawlKind,

    /// Statuses that satisfied the kind's predicate
    pub matched: usize,

    /// Replies written to storage
    pub stored: usize,

    pub outcome: JobOutcome,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Finished { .. })
    }
}

/// Result of a whole harvest run
#[derive(Debug)]
pub struct HarvestReport {
    pub run_id: i64,
    pub status: RunStatus,
    pub jobs: Vec<JobReport>,
}

impl HarvestReport {
    pub fn failures(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs.iter().filter(|job| !job.is_success())
    }

    pub fn total_stored(&self) -> usize {
        self.jobs.iter().map(|job| job.stored).sum()
    }
}

/// Everything a job needs, cheaply cloneable into a task
#[derive(Clone)]
struct JobContext {
    storage: Arc<Mutex<SqliteStorage>>,
    fetcher: Arc<dyn PageFetcher>,
    budget: Arc<dyn TimeBudget>,
    cancel: CancellationToken,
    settings: CrawlSettings,
}

impl JobContext {
    fn lock(&self) -> Result<MutexGuard<'_, SqliteStorage>, HarvestError> {
        self.storage
            .lock()
            .map_err(|_| HarvestError::StorageError(StorageError::LockPoisoned))
    }
}

/// Main harvest coordinator structure
pub struct Harvester {
    config: Arc<Config>,
    config_hash: String,
    context: JobContext,
}

impl Harvester {
    /// Creates a new harvester
    ///
    /// # Arguments
    ///
    /// * `config` - The harvest configuration
    /// * `config_hash` - Hash recorded on the run row
    /// * `storage` - Watermark, reply and run storage
    /// * `fetcher` - Page fetcher shared by all jobs
    /// * `budget` - Execution time budget shared by all jobs
    /// * `cancel` - External cancellation for the whole run
    pub fn new(
        config: Config,
        config_hash: impl Into<String>,
        storage: SqliteStorage,
        fetcher: Arc<dyn PageFetcher>,
        budget: Arc<dyn TimeBudget>,
        cancel: CancellationToken,
    ) -> Self {
        let settings = CrawlSettings {
            page_size: config.search.page_size,
            safety_margin: Duration::from_secs(config.harvest.safety_margin_secs),
            retry: RetryPolicy::new(Duration::from_millis(config.harvest.retry_delay_ms)),
        };

        Self {
            config: Arc::new(config),
            config_hash: config_hash.into(),
            context: JobContext {
                storage: Arc::new(Mutex::new(storage)),
                fetcher,
                budget,
                cancel,
                settings,
            },
        }
    }

    /// Creates a harvester talking to the configured search API
    ///
    /// Opens the database, builds the HTTP client with an environment-backed
    /// credential cache, and starts the time budget.
    pub fn from_config(
        config: Config,
        config_hash: impl Into<String>,
        cancel: CancellationToken,
    ) -> Result<Self, HarvestError> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;

        let client = build_http_client(&config.search)?;
        let credentials = CredentialCache::new(
            Box::new(EnvSecretSource),
            config.search.bearer_token_env.clone(),
        );
        let fetcher = SearchClient::new(client, &config.search.api_base_url, credentials)?;
        let budget = Deadline::after(Duration::from_secs(config.harvest.time_budget_secs));

        Ok(Self::new(
            config,
            config_hash,
            storage,
            Arc::new(fetcher),
            Arc::new(budget),
            cancel,
        ))
    }

    /// Shared handle to the underlying storage
    pub fn storage(&self) -> Arc<Mutex<SqliteStorage>> {
        self.context.storage.clone()
    }

    /// Runs every configured job and records the run
    ///
    /// Individual job failures are reported in the returned `HarvestReport`;
    /// only failures to record the run itself are returned as errors.
    pub async fn run(&self) -> Result<HarvestReport, HarvestError> {
        let jobs = self.config.jobs()?;
        let run_id = self.context.lock()?.create_run(&self.config_hash)?;
        tracing::info!("Starting harvest run {} with {} job(s)", run_id, jobs.len());

        let limit = self.config.harvest.max_concurrent_targets.max(1) as usize;
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut set = JoinSet::new();

        for (index, (target, kind)) in jobs.into_iter().enumerate() {
            let context = self.context.clone();
            let semaphore = semaphore.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (index, harvest_target(&context, target, kind).await)
            });
        }

        let mut reports = Vec::new();
        let mut task_failures = 0;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(entry) => reports.push(entry),
                Err(e) => {
                    tracing::error!("Harvest task panicked or was aborted: {}", e);
                    task_failures += 1;
                }
            }
        }
        reports.sort_by_key(|(index, _)| *index);
        let reports: Vec<JobReport> = reports.into_iter().map(|(_, report)| report).collect();

        let status = if self.context.cancel.is_cancelled() {
            RunStatus::Interrupted
        } else if task_failures > 0 || reports.iter().any(|r| !r.is_success()) {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        self.context.lock()?.finish_run(run_id, status)?;

        let report = HarvestReport {
            run_id,
            status,
            jobs: reports,
        };
        tracing::info!(
            "Harvest run {} finished ({:?}): {} reply(ies) stored, {} job(s) failed",
            run_id,
            status,
            report.total_stored(),
            report.failures().count() + task_failures
        );

        Ok(report)
    }
}

/// Runs a complete harvest against the configured search API
///
/// # Arguments
///
/// * `config` - The harvest configuration
/// * `config_hash` - Hash of the configuration file
/// * `cancel` - Cancelled on shutdown requests
pub async fn run_harvest(
    config: Config,
    config_hash: impl Into<String>,
    cancel: CancellationToken,
) -> Result<HarvestReport, HarvestError> {
    Harvester::from_config(config, config_hash, cancel)?
        .run()
        .await
}

/// Running totals for a job
#[derive(Default)]
struct Tally {
    matched: usize,
    stored: usize,
}

async fn harvest_target(context: &JobContext, target: Target, kind: CrawlKind) -> JobReport {
    let mut tally = Tally::default();
    let outcome = match harvest_window(context, &target, kind, &mut tally).await {
        Ok((summary, checkpoint)) => JobOutcome::Finished {
            summary,
            checkpoint,
        },
        Err(HarvestError::Crawl(CrawlError::Cancelled)) => {
            tracing::warn!("Harvest of {} for {} was cancelled", kind, target);
            JobOutcome::Cancelled
        }
        Err(e) => {
            tracing::error!("Harvest of {} for {} failed: {}", kind, target, e);
            JobOutcome::Failed(e)
        }
    };

    JobReport {
        target,
        kind,
        matched: tally.matched,
        stored: tally.stored,
        outcome,
    }
}

/// Crawls one window for a (target, kind) pair and commits its checkpoint
async fn harvest_window(
    context: &JobContext,
    target: &Target,
    kind: CrawlKind,
    tally: &mut Tally,
) -> Result<(CrawlSummary, CheckpointUpdate), HarvestError> {
    let target_id = target.id();

    let (since, resume_from) = {
        let storage = context.lock()?;
        let since = load_or_absent(&*storage, &target_id, kind.checkpoint_key())
            .unwrap_or_else(|| target.status_id.clone());
        let resume_from = load_or_absent(&*storage, &target_id, &kind.resume_key());
        (since, resume_from)
    };

    // A resume point at or below the lower bound leaves nothing to resume
    let resume_from = resume_from.filter(|max| *max > since);

    match &resume_from {
        Some(max) => tracing::info!(
            "Resuming {} for {} since {} below {}",
            kind,
            target,
            since,
            max
        ),
        None => tracing::info!("Harvesting {} for {} since {}", kind, target, since),
    }

    let (mut crawl, final_cursor) = start_crawl(
        context.fetcher.clone(),
        context.budget.clone(),
        context.settings.clone(),
        CrawlRequest {
            query: kind.query(target),
            since,
            resume_from,
        },
        context.cancel.clone(),
    );

    while let Some(status) = crawl.next().await? {
        if !kind.matches(target, &status) {
            continue;
        }
        tally.matched += 1;

        let Some(record) = ReplyRecord::from_status(target, kind, &status) else {
            tracing::debug!("Skipping mention-only reply {}", status.id_str);
            continue;
        };

        {
            let mut storage = context.lock()?;
            storage
                .upsert_reply(&record)
                .map_err(|source| HarvestError::ReplyWrite {
                    target: target_id.clone(),
                    status_id: status.id_str.clone(),
                    source,
                })?;
        }
        tally.stored += 1;
    }

    let summary = final_cursor
        .resolve()
        .await
        .map_err(|e| HarvestError::Task(e.to_string()))?;

    let checkpoint = commit_checkpoint(context, &target_id, kind, &summary)?;
    tracing::info!(
        "Harvested {} for {}: {} matched, {} stored, checkpoint {:?}",
        kind,
        target,
        tally.matched,
        tally.stored,
        checkpoint
    );

    Ok((summary, checkpoint))
}

/// Loads a checkpoint, treating read failures as "no checkpoint"
///
/// Re-scanning from an earlier cursor only re-collects replies that are then
/// overwritten in place.
fn load_or_absent(storage: &dyn WatermarkStore, target_id: &str, key: &str) -> Option<Cursor> {
    match storage.load_watermark(target_id, key) {
        Ok(cursor) => cursor,
        Err(e) => {
            tracing::warn!(
                "Failed to load checkpoint {} for {}: {}; treating as absent",
                key,
                target_id,
                e
            );
            None
        }
    }
}

/// Writes the checkpoint for a drained window
fn commit_checkpoint(
    context: &JobContext,
    target_id: &str,
    kind: CrawlKind,
    summary: &CrawlSummary,
) -> Result<CheckpointUpdate, HarvestError> {
    let Some(cursor) = &summary.final_cursor else {
        return Ok(CheckpointUpdate::Unchanged);
    };

    let mut storage = context.lock()?;
    let resume_key = kind.resume_key();
    let write_failed = |key: &str, source: StorageError| HarvestError::WatermarkWrite {
        target: target_id.to_string(),
        key: key.to_string(),
        source,
    };

    if summary.reason.is_partial() {
        storage
            .store_watermark(target_id, &resume_key, cursor)
            .map_err(|e| write_failed(&resume_key, e))?;
        return Ok(CheckpointUpdate::Suspended(cursor.clone()));
    }

    let key = kind.checkpoint_key();
    storage
        .store_watermark(target_id, key, cursor)
        .map_err(|e| write_failed(key, e))?;
    storage
        .clear_watermark(target_id, &resume_key)
        .map_err(|e| write_failed(&resume_key, e))?;

    Ok(CheckpointUpdate::Advanced(cursor.clone()))
}
