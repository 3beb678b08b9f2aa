//! Configuration for Karasu
//!
//! Library callers build [`CrawlOptions`] and [`CrawlLimits`] directly
//! (the `Default` impls carry the documented defaults). The CLI can also
//! load both from a TOML file.
//!
//! # Example
//!
//! ```no_run
//! use karasu::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("karasu.toml")).unwrap();
//! println!("max depth: {}", config.limits.max_depth);
//! ```

mod types;
mod validation;

pub use types::{Config, CrawlLimits, CrawlOptions, ForceMethod};
pub use validation::{
    validate, CHILD_LINKS_CAP, DELAY_MS_RANGE, MAX_DEPTH_CAP, MAX_PAGES_CAP,
};

use crate::ConfigResult;
use std::path::Path;

/// Loads and validates a TOML configuration file
///
/// # Arguments
///
/// * `path` - Path to the TOML file
///
/// # Returns
///
/// * `Ok(Config)` - Parsed, validated configuration
/// * `Err(ConfigError)` - The file could not be read, parsed, or validated
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    validate(&config)?;
    Ok(config)
}
