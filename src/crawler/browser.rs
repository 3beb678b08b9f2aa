//! Dynamic fetcher: headless-browser rendering via CDP
//!
//! Drives a fresh Chromium process per call through chromiumoxide. The
//! browser executes page scripts, optionally blocks heavy resources and
//! autoscrolls for lazy content, then hands the rendered document back
//! for the same extraction pipeline the static path uses.
//!
//! Lifecycle guarantee: the browser process and its CDP handler task are
//! torn down on every exit path, including cancellation and mid-render
//! errors.

use chromiumoxide::cdp::browser_protocol::network::{
    SetBlockedUrLsParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use url::Url;

use crate::cancel::CancelToken;
use crate::classify::ErrorKind;
use crate::config::CrawlOptions;
use crate::crawler::types::{FetchOutcome, FetchSuccess, TlsInfo};
use crate::CrawlError;

/// Same desktop user agent the static fetcher presents
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Default viewport
const VIEWPORT: (u32, u32) = (1920, 1080);

/// Autoscroll step size in pixels
const SCROLL_STEP_PX: u32 = 100;

/// Autoscroll cadence
const SCROLL_INTERVAL: Duration = Duration::from_millis(100);

/// Settle window after navigation and after autoscroll
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Idle wait after autoscroll so lazy content can land
const POST_SCROLL_IDLE: Duration = Duration::from_secs(1);

/// URL patterns dropped when resource blocking is enabled
///
/// Covers the image / stylesheet / font / media resource classes plus a
/// list of well-known analytics hosts.
const BLOCKED_URL_PATTERNS: &[&str] = &[
    "*.png",
    "*.jpg",
    "*.jpeg",
    "*.gif",
    "*.svg",
    "*.webp",
    "*.ico",
    "*.css",
    "*.woff",
    "*.woff2",
    "*.ttf",
    "*.otf",
    "*.mp4",
    "*.webm",
    "*.mp3",
    "*.ogg",
    "*google-analytics.com*",
    "*googletagmanager.com*",
    "*doubleclick.net*",
    "*facebook.net*",
    "*hotjar.com*",
    "*segment.io*",
    "*mixpanel.com*",
];

/// Common Chromium executable locations, checked in order
const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/google/chrome/google-chrome",
];

/// The rendered page an inner navigation produces
struct Rendered {
    final_url: Url,
    html: String,
    screenshot: Option<PathBuf>,
}

/// Headless-browser fetcher
///
/// Stateless between calls: every `fetch` launches its own browser
/// process, so crawl sessions never share rendering state.
pub struct DynamicFetcher {
    options: CrawlOptions,
    timeout: Duration,
}

impl DynamicFetcher {
    pub fn new(options: &CrawlOptions) -> Self {
        Self {
            options: options.clone(),
            timeout: Duration::from_millis(options.timeout_ms),
        }
    }

    /// Renders a URL in a fresh headless browser
    ///
    /// Returns the rendered HTML as the outcome body (content type
    /// `text/html`). CDP does not surface the HTTP status, so successful
    /// renders report 200.
    pub async fn fetch(&self, url: &Url, cancel: &CancelToken) -> FetchOutcome {
        if cancel.is_cancelled() {
            return cancelled_outcome();
        }

        let start = Instant::now();

        let (mut browser, handler_task) = match self.launch().await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!("browser launch failed for {}: {}", url, e);
                return FetchOutcome::failure(ErrorKind::Unknown);
            }
        };

        let result = self.render(&browser, url, cancel).await;

        // Teardown runs on every path before the result is inspected
        if let Err(e) = browser.close().await {
            tracing::debug!("browser close failed: {}", e);
        }
        let _ = browser.wait().await;
        handler_task.abort();

        match result {
            Ok(rendered) => {
                let body = rendered.html.into_bytes();
                FetchOutcome::Success(FetchSuccess {
                    final_url: rendered.final_url,
                    status: 200,
                    response_size: body.len(),
                    body,
                    content_type: "text/html".to_string(),
                    tls: TlsInfo::browser_managed(),
                    duration: start.elapsed(),
                    screenshot: rendered.screenshot,
                })
            }
            Err(CrawlError::Cancelled) => cancelled_outcome(),
            Err(CrawlError::Timeout { url }) => {
                tracing::debug!("browser navigation timed out for {}", url);
                FetchOutcome::failure(ErrorKind::Timeout)
            }
            Err(e) => {
                tracing::warn!("browser render failed for {}: {}", url, e);
                FetchOutcome::failure(ErrorKind::Unknown)
            }
        }
    }

    /// Launches a fresh browser and spawns its CDP handler task
    async fn launch(&self) -> crate::Result<(Browser, tokio::task::JoinHandle<()>)> {
        let chrome_path = find_chrome()?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(VIEWPORT.0, VIEWPORT.1)
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--metrics-recording-only")
            .arg("--mute-audio")
            .build()
            .map_err(CrawlError::Browser)?;

        let (browser, mut handler) = Browser::launch(config).await?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok((browser, handler_task))
    }

    /// Navigates, waits, optionally scrolls and screenshots, and extracts
    ///
    /// The caller owns teardown; this only touches the page.
    async fn render(
        &self,
        browser: &Browser,
        url: &Url,
        cancel: &CancelToken,
    ) -> crate::Result<Rendered> {
        let page = browser.new_page("about:blank").await?;

        page.execute(SetUserAgentOverrideParams::new(USER_AGENT.to_string()))
            .await?;

        if self.options.block_resources {
            let patterns: Vec<String> = BLOCKED_URL_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect();
            page.execute(SetBlockedUrLsParams::new(patterns)).await?;
        }

        if cancel.is_cancelled() {
            return Err(CrawlError::Cancelled);
        }

        tracing::debug!("navigating to {}", url);
        tokio::time::timeout(self.timeout, page.goto(url.as_str()))
            .await
            .map_err(|_| CrawlError::Timeout {
                url: url.to_string(),
            })??;

        self.wait_for_ready(&page).await;

        if cancel.is_cancelled() {
            return Err(CrawlError::Cancelled);
        }

        if self.options.auto_scroll {
            self.auto_scroll(&page, cancel).await?;
        }

        let screenshot = if self.options.screenshot {
            self.capture_screenshot(&page).await?
        } else {
            None
        };

        let final_url = page
            .url()
            .await?
            .map(|u| u.to_string())
            .and_then(|u| Url::parse(&u).ok())
            .unwrap_or_else(|| url.clone());

        let html = page.content().await?;

        let _ = page.close().await;

        Ok(Rendered {
            final_url,
            html,
            screenshot,
        })
    }

    /// Waits for the document to report readiness, then a settle window
    ///
    /// Approximates the network-idle contract: readyState first, then a
    /// short quiet period for late XHRs to land.
    async fn wait_for_ready(&self, page: &Page) {
        let script = r#"
            new Promise((resolve) => {
                if (document.readyState === 'complete' || document.readyState === 'interactive') {
                    resolve(document.readyState);
                } else {
                    document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
                    setTimeout(() => resolve('timeout'), 10000);
                }
            })
        "#;

        match tokio::time::timeout(self.timeout, page.evaluate(script.to_string())).await {
            Ok(Ok(result)) => {
                let state: String = result
                    .into_value()
                    .unwrap_or_else(|_| "unknown".to_string());
                tracing::debug!("page ready state: {}", state);
            }
            Ok(Err(e)) => {
                tracing::debug!("could not check ready state: {}", e);
            }
            Err(_) => {
                tracing::warn!("timeout waiting for page ready state");
            }
        }

        tokio::time::sleep(SETTLE_DELAY).await;
    }

    /// Scrolls down in fixed steps until the body is covered or the step
    /// budget runs out, then idles so lazy content can settle
    async fn auto_scroll(&self, page: &Page, cancel: &CancelToken) -> crate::Result<()> {
        let mut scrolled: u64 = 0;

        for _ in 0..self.options.max_scrolls {
            if cancel.is_cancelled() {
                return Err(CrawlError::Cancelled);
            }

            let script = format!(
                "window.scrollBy(0, {}); document.body ? document.body.scrollHeight : 0",
                SCROLL_STEP_PX
            );
            let height: u64 = match page.evaluate(script).await {
                Ok(result) => result.into_value().unwrap_or(0),
                Err(e) => {
                    tracing::debug!("autoscroll step failed: {}", e);
                    break;
                }
            };

            scrolled += SCROLL_STEP_PX as u64;
            if scrolled >= height {
                break;
            }

            tokio::time::sleep(SCROLL_INTERVAL).await;
        }

        tokio::time::sleep(POST_SCROLL_IDLE).await;
        Ok(())
    }

    /// Captures a full-page PNG into the configured directory
    async fn capture_screenshot(&self, page: &Page) -> crate::Result<Option<PathBuf>> {
        let dir = match &self.options.screenshot_dir {
            Some(dir) => dir.clone(),
            None => {
                tracing::warn!("screenshot requested without a directory, skipping");
                return Ok(None);
            }
        };

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        let bytes = page.screenshot(params).await?;

        std::fs::create_dir_all(&dir)?;
        let path = dir.join(screenshot_file_name());
        std::fs::write(&path, bytes)?;

        tracing::debug!("screenshot written to {}", path.display());
        Ok(Some(path))
    }
}

/// Produces `screenshot-<unix-ms>.png`
fn screenshot_file_name() -> String {
    format!("screenshot-{}.png", chrono::Utc::now().timestamp_millis())
}

/// Locates a Chromium executable
///
/// Checks the well-known install locations first, then `$PATH`.
fn find_chrome() -> crate::Result<PathBuf> {
    for path in CHROME_PATHS {
        let candidate = std::path::Path::new(path);
        if candidate.exists() {
            tracing::debug!("found Chrome at {}", path);
            return Ok(candidate.to_path_buf());
        }
    }

    for cmd in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    tracing::debug!("found Chrome in PATH: {}", path);
                    return Ok(PathBuf::from(path));
                }
            }
        }
    }

    Err(CrawlError::Browser(
        "Chrome/Chromium not found; install chromium or google-chrome".to_string(),
    ))
}

/// The outcome used when cancellation interrupts a render
fn cancelled_outcome() -> FetchOutcome {
    FetchOutcome::Failure {
        kind: ErrorKind::Unknown,
        message: "cancelled".to_string(),
    }
}
