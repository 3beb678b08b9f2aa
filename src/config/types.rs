use serde::{Deserialize, Serialize};

/// Which fetch method the caller wants, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForceMethod {
    /// Let the engine decide (static first, detector-driven upgrade)
    #[default]
    Auto,
    /// Always use the static HTTP fetcher
    Static,
    /// Always use the headless browser
    Dynamic,
}

/// Per-URL crawl options
///
/// Library callers construct this directly; the CLI deserializes it from
/// the `[crawl]` table of a TOML file. Defaults match the documented
/// option table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlOptions {
    /// Fetch method override
    #[serde(rename = "force-method")]
    pub force_method: ForceMethod,

    /// Detector confidence above which the dynamic path is taken
    #[serde(rename = "detection-threshold")]
    pub detection_threshold: f64,

    /// Strict-profile retry budget for the static fetcher
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Per-operation timeout in milliseconds (static fetch, browser navigation)
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Block images, stylesheets, fonts, media, and analytics in the browser
    #[serde(rename = "block-resources")]
    pub block_resources: bool,

    /// Scroll the rendered page to trigger lazy content
    #[serde(rename = "auto-scroll")]
    pub auto_scroll: bool,

    /// Maximum autoscroll steps
    #[serde(rename = "max-scrolls")]
    pub max_scrolls: u32,

    /// Capture a full-page PNG during dynamic fetches
    pub screenshot: bool,

    /// Directory screenshots are written to
    #[serde(rename = "screenshot-dir")]
    pub screenshot_dir: Option<std::path::PathBuf>,

    /// Parallelism for batch single-page crawling
    pub concurrency: usize,

    /// Opaque owner identifier, passed through to results and never
    /// interpreted by the engine
    pub credential: Option<String>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            force_method: ForceMethod::Auto,
            detection_threshold: 0.5,
            max_retries: 2,
            timeout_ms: 30_000,
            block_resources: true,
            auto_scroll: false,
            max_scrolls: 10,
            screenshot: false,
            screenshot_dir: None,
            concurrency: 3,
            credential: None,
        }
    }
}

/// Budgets for a recursive crawl session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlLimits {
    /// Maximum link depth from the seed (seed is depth 0)
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Maximum pages visited across the whole session
    #[serde(rename = "max-pages")]
    pub max_pages: usize,

    /// How many of a page's links are followed, in emitted order
    #[serde(rename = "child-links-per-page")]
    pub child_links_per_page: usize,

    /// Minimum wait between consecutive page fetches, in milliseconds
    #[serde(rename = "delay-ms")]
    pub delay_ms: u64,

    /// Restrict the crawl to the seed URL's host
    #[serde(rename = "same-domain-only")]
    pub same_domain_only: bool,
}

impl Default for CrawlLimits {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_pages: 50,
            child_links_per_page: 3,
            delay_ms: 1500,
            same_domain_only: true,
        }
    }
}

/// Top-level TOML configuration for the CLI
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawl: CrawlOptions,
    pub limits: CrawlLimits,
}
