use crate::config::types::{Config, HarvestConfig, OutputConfig, SearchConfig, TargetEntry};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Largest page the search endpoint serves
const MAX_PAGE_SIZE: u32 = 100;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_search_config(&config.search)?;
    validate_harvest_config(&config.harvest)?;
    validate_output_config(&config.output)?;
    validate_targets(&config.targets)?;
    Ok(())
}

/// Validates search API configuration
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.api_base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid api-base-url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "api-base-url must use http or https, got '{}'",
            config.api_base_url
        )));
    }

    if config.bearer_token_env.is_empty() {
        return Err(ConfigError::Validation(
            "bearer-token-env cannot be empty".to_string(),
        ));
    }

    if config.page_size < 1 || config.page_size > MAX_PAGE_SIZE {
        return Err(ConfigError::Validation(format!(
            "page-size must be between 1 and {}, got {}",
            MAX_PAGE_SIZE, config.page_size
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "connect-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates harvest loop configuration
fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    if config.time_budget_secs <= config.safety_margin_secs {
        return Err(ConfigError::Validation(format!(
            "time-budget-secs ({}) must be greater than safety-margin-secs ({})",
            config.time_budget_secs, config.safety_margin_secs
        )));
    }

    if config.retry_delay_ms > 60_000 {
        return Err(ConfigError::Validation(format!(
            "retry-delay-ms must be <= 60000, got {}",
            config.retry_delay_ms
        )));
    }

    if config.max_concurrent_targets < 1 || config.max_concurrent_targets > 32 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-targets must be between 1 and 32, got {}",
            config.max_concurrent_targets
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates target entries
fn validate_targets(targets: &[TargetEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for entry in targets {
        validate_screen_name(&entry.screen_name)?;
        let target = entry.to_target()?;

        if entry.kinds.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Target '{}' must list at least one kind",
                target
            )));
        }

        let unique: HashSet<_> = entry.kinds.iter().collect();
        if unique.len() != entry.kinds.len() {
            return Err(ConfigError::Validation(format!(
                "Target '{}' lists the same kind more than once",
                target
            )));
        }

        if !seen.insert(target.id()) {
            return Err(ConfigError::Validation(format!(
                "Target '{}' is configured more than once",
                target
            )));
        }
    }

    Ok(())
}

/// Screen names are 1-15 characters of letters, digits and underscores
fn validate_screen_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || name.len() > 15 {
        return Err(ConfigError::Validation(format!(
            "screen-name must be 1-15 characters, got '{}'",
            name
        )));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ConfigError::Validation(format!(
            "screen-name must contain only letters, digits and underscores, got '{}'",
            name
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::CrawlKind;

    fn entry(screen_name: &str, status_id: &str, kinds: Vec<CrawlKind>) -> TargetEntry {
        TargetEntry {
            screen_name: screen_name.to_string(),
            status_id: status_id.to_string(),
            kinds,
        }
    }

    #[test]
    fn test_validate_screen_name() {
        assert!(validate_screen_name("sehurlburt").is_ok());
        assert!(validate_screen_name("b0rk").is_ok());
        assert!(validate_screen_name("under_score").is_ok());

        assert!(validate_screen_name("").is_err());
        assert!(validate_screen_name("@alice").is_err());
        assert!(validate_screen_name("a-very-long-screen-name").is_err());
    }

    #[test]
    fn test_validate_targets() {
        assert!(validate_targets(&[entry("alice", "1000", CrawlKind::ALL.to_vec())]).is_ok());

        assert!(validate_targets(&[entry("alice", "10x0", CrawlKind::ALL.to_vec())]).is_err());
        assert!(validate_targets(&[entry("alice", "1000", vec![])]).is_err());
        assert!(validate_targets(&[entry(
            "alice",
            "1000",
            vec![CrawlKind::Replies, CrawlKind::Replies]
        )])
        .is_err());
        assert!(validate_targets(&[
            entry("alice", "1000", vec![CrawlKind::Replies]),
            entry("alice", "1000", vec![CrawlKind::QuotedReplies]),
        ])
        .is_err());
    }

    #[test]
    fn test_validate_harvest_budget() {
        let mut config = HarvestConfig::default();
        assert!(validate_harvest_config(&config).is_ok());

        config.time_budget_secs = config.safety_margin_secs;
        assert!(validate_harvest_config(&config).is_err());
    }

    #[test]
    fn test_validate_search_url() {
        let mut config = SearchConfig::default();
        assert!(validate_search_config(&config).is_ok());

        config.api_base_url = "ftp://api.example.com".to_string();
        assert!(validate_search_config(&config).is_err());

        config.api_base_url = "not a url".to_string();
        assert!(matches!(
            validate_search_config(&config),
            Err(ConfigError::InvalidUrl(_))
        ));
    }
}
