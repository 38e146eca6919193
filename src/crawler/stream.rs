//! Incremental crawl loop
//!
//! `SearchCrawl` is a pull-based sequence of statuses. Each call to `next`
//! hands out a buffered item, and only when the buffer is empty does it
//! perform the next page fetch (with retries). Dropping the crawl stops all
//! network work.
//!
//! The final upper-bound cursor is reported through `FinalCursor`, which
//! resolves once the sequence has been drained to its end. A crawl that ends
//! with an error never resolves its handle, so no watermark can be derived
//! from it.

use crate::crawler::budget::TimeBudget;
use crate::crawler::fetcher::{PageFetcher, PageRequest, Status};
use crate::crawler::retry::{RetryDecision, RetryPolicy};
use crate::crawler::{extract_max_id, Cursor};
use crate::{CrawlError, CursorError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Tunables of the crawl loop
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Items requested per page
    pub page_size: u32,

    /// Stop fetching once less than this much time is left
    pub safety_margin: Duration,

    /// Policy applied around every page fetch
    pub retry: RetryPolicy,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            safety_margin: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

/// What to crawl
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    /// Search query, passed to the fetcher unchanged
    pub query: String,

    /// Exclusive lower bound of the window
    pub since: Cursor,

    /// Upper bound to continue a suspended window from
    pub resume_from: Option<Cursor>,
}

/// Why a crawl ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The last page carried no continuation marker
    WindowExhausted,

    /// The remaining time fell below the safety margin
    TimeBudgetExceeded,

    /// The API reported an exhausted quota
    RateLimited,
}

impl StopReason {
    /// True when part of the window is still unvisited
    pub fn is_partial(&self) -> bool {
        !matches!(self, Self::WindowExhausted)
    }
}

/// Result of a crawl whose sequence was fully drained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    pub reason: StopReason,

    /// Last upper bound used or extracted; `None` if no continuation was seen
    pub final_cursor: Option<Cursor>,

    pub pages: u32,

    pub items: usize,
}

/// The crawl ended before its sequence was drained
#[derive(Debug, Error)]
#[error("Crawl ended before its item sequence was drained")]
pub struct CrawlIncomplete;

/// Resolves to the crawl summary once the sequence has been drained
#[derive(Debug)]
pub struct FinalCursor {
    rx: oneshot::Receiver<CrawlSummary>,
}

impl FinalCursor {
    pub async fn resolve(self) -> Result<CrawlSummary, CrawlIncomplete> {
        self.rx.await.map_err(|_| CrawlIncomplete)
    }
}

enum Phase {
    Fetching,
    Draining(StopReason),
    Failing(CrawlError),
    Done,
}

/// A lazily fetched, finite sequence of search results
pub struct SearchCrawl {
    fetcher: Arc<dyn PageFetcher>,
    budget: Arc<dyn TimeBudget>,
    cancel: CancellationToken,
    settings: CrawlSettings,
    query: String,
    since: Cursor,
    max: Option<Cursor>,
    buffer: VecDeque<Status>,
    phase: Phase,
    pages: u32,
    items: usize,
    done_tx: Option<oneshot::Sender<CrawlSummary>>,
}

/// Starts a crawl
///
/// Nothing is fetched until the first call to `SearchCrawl::next`.
///
/// # Arguments
///
/// * `fetcher` - Performs the page requests
/// * `budget` - Remaining execution time, checked before every fetch attempt
/// * `settings` - Page size, safety margin and retry policy
/// * `request` - Query and cursors
/// * `cancel` - External cancellation, honored during fetches and retry delays
///
/// # Returns
///
/// The item sequence paired with a handle to its final cursor
pub fn start_crawl(
    fetcher: Arc<dyn PageFetcher>,
    budget: Arc<dyn TimeBudget>,
    settings: CrawlSettings,
    request: CrawlRequest,
    cancel: CancellationToken,
) -> (SearchCrawl, FinalCursor) {
    let (done_tx, rx) = oneshot::channel();

    let crawl = SearchCrawl {
        fetcher,
        budget,
        cancel,
        settings,
        query: request.query,
        since: request.since,
        max: request.resume_from,
        buffer: VecDeque::new(),
        phase: Phase::Fetching,
        pages: 0,
        items: 0,
        done_tx: Some(done_tx),
    };

    (crawl, FinalCursor { rx })
}

impl SearchCrawl {
    /// Returns the next status, fetching another page when needed
    ///
    /// # Returns
    ///
    /// * `Ok(Some(Status))` - The next item in page order
    /// * `Ok(None)` - The sequence ended; the final cursor handle is resolved
    /// * `Err(CrawlError)` - The crawl aborted; the handle will never resolve
    pub async fn next(&mut self) -> Result<Option<Status>, CrawlError> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                self.items += 1;
                return Ok(Some(item));
            }

            if matches!(self.phase, Phase::Fetching) {
                match self.fetch_next_page().await {
                    Ok(next) => {
                        self.phase = next;
                        continue;
                    }
                    Err(err) => {
                        self.phase = Phase::Done;
                        self.abort();
                        return Err(err);
                    }
                }
            }

            return match std::mem::replace(&mut self.phase, Phase::Done) {
                Phase::Draining(reason) => {
                    self.finish(reason);
                    Ok(None)
                }
                Phase::Failing(err) => {
                    self.abort();
                    Err(err)
                }
                Phase::Fetching | Phase::Done => Ok(None),
            };
        }
    }

    /// Fetches one page, retrying transient faults, and decides the next phase
    async fn fetch_next_page(&mut self) -> Result<Phase, CrawlError> {
        let request = PageRequest {
            query: self.query.clone(),
            since: self.since.clone(),
            max: self.max.clone(),
            page_size: self.settings.page_size,
        };

        let mut attempt = 0;
        let page = loop {
            if self.budget_exhausted() {
                return Ok(Phase::Draining(StopReason::TimeBudgetExceeded));
            }
            attempt += 1;

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(CrawlError::Cancelled),
                result = self.fetcher.fetch_page(&request) => result,
            };

            match result {
                Ok(page) => break page,
                Err(err) => match self.settings.retry.decide(&err, attempt) {
                    RetryDecision::Stop => return Ok(Phase::Draining(StopReason::RateLimited)),
                    RetryDecision::RetryAfter(delay) => {
                        tokio::select! {
                            biased;
                            _ = self.cancel.cancelled() => return Err(CrawlError::Cancelled),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    RetryDecision::Abort => return Err(CrawlError::Fetch(err)),
                },
            }
        };

        self.pages += 1;
        tracing::debug!(
            "Page {} for '{}' returned {} item(s)",
            self.pages,
            self.query,
            page.items.len()
        );
        self.buffer.extend(page.items);

        let Some(marker) = page.continuation else {
            return Ok(Phase::Draining(StopReason::WindowExhausted));
        };

        // Items of this page are still handed out before a bad marker surfaces
        match self.advance_cursor(&marker) {
            Ok(()) => Ok(Phase::Fetching),
            Err(err) => Ok(Phase::Failing(CrawlError::Cursor(err))),
        }
    }

    fn advance_cursor(&mut self, marker: &str) -> Result<(), CursorError> {
        let next = extract_max_id(marker)?;
        if let Some(previous) = &self.max {
            if next >= *previous {
                return Err(CursorError::NotDecreasing {
                    previous: previous.to_string(),
                    next: next.to_string(),
                });
            }
        }
        self.max = Some(next);
        Ok(())
    }

    fn budget_exhausted(&self) -> bool {
        let remaining = self.budget.remaining();
        if remaining < self.settings.safety_margin {
            tracing::info!(
                "Only {}ms of execution time left - suspending crawl for '{}'",
                remaining.as_millis(),
                self.query
            );
            true
        } else {
            false
        }
    }

    fn finish(&mut self, reason: StopReason) {
        let summary = CrawlSummary {
            reason,
            final_cursor: self.max.clone(),
            pages: self.pages,
            items: self.items,
        };
        tracing::info!(
            "Crawl for '{}' ended ({:?}) after {} page(s), {} item(s)",
            self.query,
            reason,
            summary.pages,
            summary.items
        );
        if let Some(tx) = self.done_tx.take() {
            let _ = tx.send(summary);
        }
    }

    fn abort(&mut self) {
        self.buffer.clear();
        self.done_tx = None;
    }
}
