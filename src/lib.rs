//! Karasu: a hybrid web crawl engine
//!
//! Given a URL, Karasu decides whether a plain HTTP fetch-and-parse is
//! enough or a headless-browser render is required, extracts links and
//! metadata, and can expand recursively from a seed URL under depth and
//! page budgets while streaming lifecycle events to a caller-supplied sink.

pub mod cancel;
pub mod classify;
pub mod config;
pub mod crawler;
pub mod events;
pub mod url;

use thiserror::Error;

/// Main error type for Karasu operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Browser protocol error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Disallowed URL scheme in '{0}'")]
    DisallowedScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Karasu operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use classify::{ErrorKind, Severity};
pub use config::{CrawlLimits, CrawlOptions, ForceMethod};
pub use crawler::{crawl_batch, crawl_one, crawl_recursive, CrawlSession, FetchMethod, PageResult};
pub use events::{CollectingSink, CrawlEvent, EventSink, NullSink};
