//! Search page fetcher
//!
//! This module handles the single network call the crawl loop makes per page:
//! - The `PageFetcher` seam the crawl loop is written against
//! - Wire types for the search endpoint's JSON payload
//! - The reqwest-backed `SearchClient`
//! - Error classification into rate-limited, transient and fatal failures

use crate::config::SearchConfig;
use crate::crawler::credentials::CredentialCache;
use crate::crawler::Cursor;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

/// API error code reported when the caller's quota is exhausted
const RATE_LIMIT_CODE: u32 = 88;

/// Failures surfaced by a page fetch, in the retry policy's terms
#[derive(Debug, Error)]
pub enum FetchError {
    /// The API refused the request because the quota is exhausted
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Connection reset, connect failure or timeout; the same request may succeed later
    #[error("Transient network fault: {0}")]
    Transient(String),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

/// Parameters of one page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Search query, passed through unchanged
    pub query: String,

    /// Exclusive lower bound
    pub since: Cursor,

    /// Inclusive upper bound; `None` asks for the most recent data
    pub max: Option<Cursor>,

    /// Number of items to request
    pub page_size: u32,
}

/// One page of search results
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Items in the order the API returned them
    pub items: Vec<Status>,

    /// Opaque continuation marker; `None` on the final page of the window
    pub continuation: Option<String>,
}

/// A status as returned by the search endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Status {
    pub id_str: String,

    #[serde(default)]
    pub in_reply_to_status_id_str: Option<String>,

    #[serde(default)]
    pub full_text: Option<String>,

    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub user: Option<User>,

    #[serde(default)]
    pub entities: Entities,

    #[serde(default)]
    pub quoted_status: Option<Box<Status>>,
}

impl Status {
    /// The status text, preferring the untruncated form
    pub fn body(&self) -> &str {
        self.full_text
            .as_deref()
            .or(self.text.as_deref())
            .unwrap_or("")
    }

    /// Screen name of the author, if the payload carried one
    pub fn author(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.screen_name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    pub screen_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Entities {
    #[serde(default)]
    pub user_mentions: Vec<UserMention>,
}

/// A mention entity; `indices` are character offsets into the text
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserMention {
    pub indices: [usize; 2],
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    statuses: Vec<Status>,

    #[serde(default)]
    search_metadata: SearchMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct SearchMetadata {
    #[serde(default)]
    next_results: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: u32,
    #[serde(default)]
    message: String,
}

/// Executes one bounded search call
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, FetchError>;
}

/// Builds an HTTP client for the search API
///
/// # Arguments
///
/// * `config` - The search configuration (timeouts)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &SearchConfig) -> Result<Client, reqwest::Error> {
    let user_agent = format!("reply-harvest/{}", env!("CARGO_PKG_VERSION"));

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .build()
}

/// `PageFetcher` backed by the v1.1 `search/tweets` endpoint
pub struct SearchClient {
    client: Client,
    endpoint: Url,
    credentials: CredentialCache,
}

impl SearchClient {
    /// Creates a client for the API rooted at `api_base_url`
    ///
    /// # Arguments
    ///
    /// * `client` - The HTTP client to use
    /// * `api_base_url` - API root, e.g. `https://api.twitter.com/1.1`
    /// * `credentials` - Credential cache owned by this client
    pub fn new(
        client: Client,
        api_base_url: &str,
        credentials: CredentialCache,
    ) -> Result<Self, url::ParseError> {
        let base = if api_base_url.ends_with('/') {
            Url::parse(api_base_url)?
        } else {
            Url::parse(&format!("{}/", api_base_url))?
        };
        let endpoint = base.join("search/tweets.json")?;

        Ok(Self {
            client,
            endpoint,
            credentials,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl PageFetcher for SearchClient {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, FetchError> {
        let credentials = self
            .credentials
            .get()
            .await
            .map_err(|e| FetchError::Other(e.to_string()))?;

        let mut params: Vec<(&str, String)> = vec![
            ("q", request.query.clone()),
            ("count", request.page_size.to_string()),
            ("since_id", request.since.to_string()),
            ("tweet_mode", "extended".to_string()),
            ("result_type", "recent".to_string()),
        ];
        if let Some(max) = &request.max {
            params.push(("max_id", max.to_string()));
        }

        tracing::debug!(
            "Querying search API: {} since {} max {:?}",
            request.query,
            request.since,
            request.max.as_ref().map(Cursor::as_str)
        );
        let started = Instant::now();

        let response = self
            .client
            .get(self.endpoint.clone())
            .bearer_auth(credentials.bearer_token())
            .query(&params)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            // A 429 is decided by its status; other truncated bodies are network faults
            let body = match response.text().await {
                Ok(body) => body,
                Err(_) if status == StatusCode::TOO_MANY_REQUESTS => String::new(),
                Err(e) => return Err(classify_transport_error(e)),
            };
            return Err(classify_api_error(status, &body));
        }

        let body: SearchResponse = response.json().await.map_err(classify_transport_error)?;

        tracing::debug!(
            "Got {} result(s) in {}ms",
            body.statuses.len(),
            started.elapsed().as_millis()
        );

        Ok(Page {
            items: body.statuses,
            continuation: body.search_metadata.next_results,
        })
    }
}

/// Classifies a non-success HTTP response
///
/// | Condition | Classification |
/// |-----------|----------------|
/// | HTTP 429 | RateLimited |
/// | Error code 88 in body | RateLimited |
/// | Anything else | Other |
fn classify_api_error(status: StatusCode, body: &str) -> FetchError {
    let errors = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.errors)
        .unwrap_or_default();

    if status == StatusCode::TOO_MANY_REQUESTS || errors.iter().any(|e| e.code == RATE_LIMIT_CODE)
    {
        return FetchError::RateLimited;
    }

    let detail = match errors.first() {
        Some(err) => format!("code {}: {}", err.code, err.message),
        None => body.trim().to_string(),
    };
    FetchError::Other(format!("HTTP {}: {}", status.as_u16(), detail))
}

/// Classifies a failure below the HTTP layer
fn classify_transport_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() || err.is_connect() || is_connection_interrupted(&err) {
        FetchError::Transient(err.to_string())
    } else {
        FetchError::Other(err.to_string())
    }
}

/// Walks the source chain looking for a reset, aborted or timed-out socket
fn is_connection_interrupted(err: &(dyn std::error::Error + 'static)) -> bool {
    use std::io::ErrorKind;

    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::TimedOut
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        source = inner.source();
    }
    false
}
