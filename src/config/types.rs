use crate::target::{CrawlKind, Target};
use crate::ConfigError;
use serde::Deserialize;

/// Main configuration structure for Reply-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub harvest: HarvestConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "target")]
    pub targets: Vec<TargetEntry>,
}

impl Config {
    /// Every (target, kind) pair to harvest, in config order
    pub fn jobs(&self) -> Result<Vec<(Target, CrawlKind)>, ConfigError> {
        let mut jobs = Vec::new();
        for entry in &self.targets {
            let target = entry.to_target()?;
            for kind in &entry.kinds {
                jobs.push((target.clone(), *kind));
            }
        }
        Ok(jobs)
    }
}

/// Search API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Root of the search API
    #[serde(rename = "api-base-url", default = "default_api_base_url")]
    pub api_base_url: String,

    /// Environment variable holding the bearer token
    #[serde(rename = "bearer-token-env", default = "default_bearer_token_env")]
    pub bearer_token_env: String,

    /// Items requested per page
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// Whole-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Connection timeout (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            bearer_token_env: default_bearer_token_env(),
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Harvest loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestConfig {
    /// Total execution time available to one invocation (seconds)
    #[serde(rename = "time-budget-secs", default = "default_time_budget_secs")]
    pub time_budget_secs: u64,

    /// Time reserved for the final watermark writes (seconds)
    #[serde(rename = "safety-margin-secs", default = "default_safety_margin_secs")]
    pub safety_margin_secs: u64,

    /// Delay before retrying a transient network fault (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Maximum number of (target, kind) crawls running at once
    #[serde(rename = "max-concurrent-targets", default = "default_max_concurrent_targets")]
    pub max_concurrent_targets: u32,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            time_budget_secs: default_time_budget_secs(),
            safety_margin_secs: default_safety_margin_secs(),
            retry_delay_ms: default_retry_delay_ms(),
            max_concurrent_targets: default_max_concurrent_targets(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the markdown summary file
    #[serde(rename = "summary-path")]
    pub summary_path: String,
}

/// A target tweet entry
#[derive(Debug, Clone, Deserialize)]
pub struct TargetEntry {
    /// Author of the target tweet
    #[serde(rename = "screen-name")]
    pub screen_name: String,

    /// Id of the target tweet
    #[serde(rename = "status-id")]
    pub status_id: String,

    /// Which crawls to run for this target
    #[serde(default = "default_kinds")]
    pub kinds: Vec<CrawlKind>,
}

impl TargetEntry {
    pub fn to_target(&self) -> Result<Target, ConfigError> {
        Target::new(self.screen_name.clone(), &self.status_id).map_err(|e| {
            ConfigError::Validation(format!(
                "Invalid status-id for target '{}': {}",
                self.screen_name, e
            ))
        })
    }
}

fn default_api_base_url() -> String {
    "https://api.twitter.com/1.1".to_string()
}

fn default_bearer_token_env() -> String {
    "TWITTER_BEARER_TOKEN".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_time_budget_secs() -> u64 {
    840
}

fn default_safety_margin_secs() -> u64 {
    10
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_max_concurrent_targets() -> u32 {
    4
}

fn default_kinds() -> Vec<CrawlKind> {
    CrawlKind::ALL.to_vec()
}
