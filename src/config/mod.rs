//! Configuration module for Reply-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use reply_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Harvesting {} target(s)", config.targets.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, HarvestConfig, OutputConfig, SearchConfig, TargetEntry};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
