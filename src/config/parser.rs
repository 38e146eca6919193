//! Config file loading
//!
//! The file is read once; the same bytes are parsed, validated and hashed so
//! the hash recorded on a run always describes the config that run used.

use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Reads, parses and validates a harvest config
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use reply_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// for entry in &config.targets {
///     println!("{}/{}", entry.screen_name, entry.status_id);
/// }
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = read_config_file(path)?;
    parse_config(&content)
}

/// Hex-encoded SHA-256 of the config file, stored on every run row
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = read_config_file(path)?;
    Ok(hash_content(&content))
}

/// Loads a config together with the hash of the exact bytes it was parsed from
///
/// # Returns
///
/// * `Ok((Config, String))` - The validated config and its hash
/// * `Err(ConfigError)` - The file could not be read, parsed or validated
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = read_config_file(path)?;
    let config = parse_config(&content)?;
    let hash = hash_content(&content);
    tracing::debug!(
        "Config {} declares {} target(s)",
        path.display(),
        config.targets.len()
    );
    Ok((config, hash))
}

fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

fn hash_content(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}
