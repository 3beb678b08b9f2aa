//! Karasu main entry point
//!
//! Command-line driver for the hybrid crawl engine: crawl one URL or
//! expand recursively from a seed, printing results as JSON.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use karasu::config::{load_config, Config, ForceMethod};
use karasu::events::{CrawlEvent, EventSink};
use karasu::{crawl_one, crawl_recursive, CancelToken};

/// Karasu: a hybrid web crawl engine
///
/// Fetches a page statically and upgrades to a headless browser when the
/// content calls for it. With --recursive, expands from the seed URL
/// under depth and page budgets.
#[derive(Parser, Debug)]
#[command(name = "karasu")]
#[command(version)]
#[command(about = "A hybrid web crawl engine", long_about = None)]
struct Cli {
    /// URL to crawl
    #[arg(value_name = "URL")]
    url: String,

    /// Expand recursively from the seed URL
    #[arg(long)]
    recursive: bool,

    /// Maximum link depth (recursive mode)
    #[arg(long)]
    depth: Option<u32>,

    /// Maximum pages to visit (recursive mode)
    #[arg(long)]
    max_pages: Option<usize>,

    /// Links followed per page (recursive mode)
    #[arg(long)]
    children: Option<usize>,

    /// Minimum delay between fetches in milliseconds (recursive mode)
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Follow links to other hosts too
    #[arg(long)]
    any_domain: bool,

    /// Force a fetch method instead of auto-detecting
    #[arg(long, value_name = "static|dynamic")]
    method: Option<String>,

    /// Capture full-page screenshots into this directory
    #[arg(long, value_name = "DIR")]
    screenshot_dir: Option<PathBuf>,

    /// Path to a TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print lifecycle events as they happen
    #[arg(long)]
    events: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

/// Sink that prints each event as a JSON line
struct StdoutSink;

impl EventSink for StdoutSink {
    fn publish(&self, event: CrawlEvent) {
        if let Ok(json) = serde_json::to_string(&event) {
            println!("{}", json);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("loading configuration from {}", path.display());
            load_config(path)?
        }
        None => Config::default(),
    };
    apply_cli_overrides(&mut config, &cli)?;

    let cancel = CancelToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling crawl");
            ctrl_c_cancel.cancel();
        }
    });

    let sink: Arc<dyn EventSink> = if cli.events {
        Arc::new(StdoutSink)
    } else {
        Arc::new(karasu::NullSink)
    };

    if cli.recursive {
        let session = crawl_recursive(
            &cli.url,
            &config.crawl,
            &config.limits,
            sink.as_ref(),
            &cancel,
        )
        .await;
        println!("{}", serde_json::to_string_pretty(&session)?);
    } else {
        let result = crawl_one(&cli.url, &config.crawl, sink.as_ref(), &cancel).await;
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    Ok(())
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("karasu=info,warn"),
            1 => EnvFilter::new("karasu=debug,info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Folds command-line flags over the loaded configuration
fn apply_cli_overrides(config: &mut Config, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(method) = &cli.method {
        config.crawl.force_method = match method.as_str() {
            "static" => ForceMethod::Static,
            "dynamic" => ForceMethod::Dynamic,
            "auto" => ForceMethod::Auto,
            other => return Err(format!("unknown method '{}'", other).into()),
        };
    }

    if let Some(dir) = &cli.screenshot_dir {
        config.crawl.screenshot = true;
        config.crawl.screenshot_dir = Some(dir.clone());
    }

    let limits = &mut config.limits;
    if let Some(depth) = cli.depth {
        limits.max_depth = depth;
    }
    if let Some(pages) = cli.max_pages {
        limits.max_pages = pages;
    }
    if let Some(children) = cli.children {
        limits.child_links_per_page = children;
    }
    if let Some(delay) = cli.delay_ms {
        limits.delay_ms = delay;
    }
    if cli.any_domain {
        limits.same_domain_only = false;
    }
    *limits = limits.clamped();

    Ok(())
}
