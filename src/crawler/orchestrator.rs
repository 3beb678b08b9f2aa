//! Hybrid per-URL orchestration
//!
//! One decision tree per URL: try the static fetcher, judge its output,
//! and upgrade to the headless browser only when the result demands it.
//! The orchestrator is the engine's never-throws boundary: whatever
//! happens underneath, the caller gets a [`PageResult`].

use chrono::Utc;
use std::time::Instant;
use url::Url;
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::classify::ErrorKind;
use crate::config::{CrawlOptions, ForceMethod};
use crate::crawler::browser::DynamicFetcher;
use crate::crawler::detector::{detect, DetectionVerdict};
use crate::crawler::fetcher::StaticFetcher;
use crate::crawler::parser::{parse_html, ParsedPage};
use crate::crawler::types::{
    Diagnostics, FetchMethod, FetchOutcome, FetchSuccess, PageResult,
};
use crate::events::{CrawlEvent, CrawlType, EventSink};
use crate::url::sanitize_links;

/// Crawls a single URL as its own session
///
/// Wraps [`crawl_url`] with the session bookkeeping a standalone call
/// needs: a `crawl:start` first, a `crawl:complete` last, and a non-fatal
/// `crawl:error` in between if the page failed.
pub async fn crawl_one(
    url: &str,
    options: &CrawlOptions,
    sink: &dyn EventSink,
    cancel: &CancelToken,
) -> PageResult {
    let session_id = Uuid::new_v4();
    let start = Instant::now();

    sink.publish(CrawlEvent::Start {
        session_id,
        seed_url: url.to_string(),
        max_depth: 0,
        crawl_type: CrawlType::Single,
        timestamp: Utc::now(),
    });

    let result = crawl_url(url, options, sink, cancel).await;

    if let Some(error) = &result.error {
        sink.publish(CrawlEvent::Error {
            session_id,
            error_kind: error.kind,
            error_message: error.message.clone(),
            failed_url: url.to_string(),
            fatal: false,
            depth: None,
            timestamp: Utc::now(),
        });
    }

    sink.publish(CrawlEvent::Complete {
        session_id,
        total_pages: 1,
        total_links: result.links.len(),
        duration_ms: start.elapsed().as_millis() as u64,
        method: Some(result.fetch_method),
        max_depth_reached: None,
        success_rate: None,
        average_response_time_ms: None,
        unique_domains: None,
        timestamp: Utc::now(),
    });

    result
}

/// Publishes the method a URL's crawl will start with
///
/// The initial commitment depends only on the options. Upgrades decided
/// mid-crawl (empty static result, detector verdict, static failure) are
/// announced by the decision tree as they happen. The scheduler calls
/// this before a URL's progress snapshot so the commitment always
/// precedes it in the event stream.
pub fn announce_method(sink: &dyn EventSink, url: &str, options: &CrawlOptions) {
    match options.force_method {
        ForceMethod::Static => publish_method(sink, url, FetchMethod::Static, "forced"),
        ForceMethod::Dynamic => publish_method(sink, url, FetchMethod::Dynamic, "forced"),
        ForceMethod::Auto => publish_method(sink, url, FetchMethod::Static, "initial fast path"),
    }
}

/// Crawls one URL without session framing
///
/// Validates, announces the initial method, and runs the decision tree.
/// Never returns an error: terminal failures come back as
/// `success: false` with a classified kind.
pub async fn crawl_url(
    url_str: &str,
    options: &CrawlOptions,
    sink: &dyn EventSink,
    cancel: &CancelToken,
) -> PageResult {
    let url = match crate::url::validate_absolute(url_str) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!("rejected URL {}: {}", url_str, e);
            return fail(url_str, FetchMethod::Static, ErrorKind::InvalidUrl, options);
        }
    };

    if cancel.is_cancelled() {
        return cancelled(url_str, FetchMethod::Static, options);
    }

    announce_method(sink, url_str, options);
    dispatch(&url, url_str, options, sink, cancel).await
}

/// Crawls a pre-validated URL whose method was already announced
///
/// The scheduler validates frontier URLs itself and publishes the
/// initial `method-detected` before the progress snapshot, so this
/// entry point runs the decision tree without re-announcing.
pub(crate) async fn crawl_announced(
    url: &Url,
    options: &CrawlOptions,
    sink: &dyn EventSink,
    cancel: &CancelToken,
) -> PageResult {
    if cancel.is_cancelled() {
        return cancelled(url.as_str(), FetchMethod::Static, options);
    }
    dispatch(url, url.as_str(), options, sink, cancel).await
}

async fn dispatch(
    url: &Url,
    url_str: &str,
    options: &CrawlOptions,
    sink: &dyn EventSink,
    cancel: &CancelToken,
) -> PageResult {
    match options.force_method {
        ForceMethod::Static => {
            let outcome = fetch_static(url, options, cancel).await;
            finish(url_str, FetchMethod::Static, outcome, None, options)
        }
        ForceMethod::Dynamic => {
            let outcome = DynamicFetcher::new(options).fetch(url, cancel).await;
            finish(url_str, FetchMethod::Dynamic, outcome, None, options)
        }
        ForceMethod::Auto => crawl_auto(url, url_str, options, sink, cancel).await,
    }
}

/// True for SSL failures the policy table rules out entirely
///
/// Mirrors the fetcher's legacy-fallback gate: an expired certificate is
/// a terminal condition the caller must see, not a rendering problem the
/// browser could paper over.
fn ssl_terminal(kind: ErrorKind) -> bool {
    kind.is_ssl() && !kind.retryable()
}

/// The auto path: static first, upgrade when the result demands it
async fn crawl_auto(
    url: &Url,
    url_str: &str,
    options: &CrawlOptions,
    sink: &dyn EventSink,
    cancel: &CancelToken,
) -> PageResult {
    let static_outcome = fetch_static(url, options, cancel).await;

    let success = match static_outcome {
        FetchOutcome::Failure { kind, message } => {
            if cancel.is_cancelled() {
                return cancelled(url_str, FetchMethod::Static, options);
            }
            if ssl_terminal(kind) {
                return finish(
                    url_str,
                    FetchMethod::Static,
                    FetchOutcome::Failure { kind, message },
                    None,
                    options,
                );
            }
            // Static is spent (retries and legacy fallback included);
            // the browser is the last resort.
            let reason = format!("static error: {}", kind.as_str());
            publish_method(sink, url_str, FetchMethod::Dynamic, &reason);
            let outcome = DynamicFetcher::new(options).fetch(url, cancel).await;
            let result = finish(url_str, FetchMethod::Dynamic, outcome, None, options);
            if !result.success {
                // Report the dynamic failure; it is the later attempt
                tracing::debug!(
                    "both paths failed for {}; static failure was {} ({})",
                    url_str,
                    kind.as_str(),
                    message
                );
            }
            return result;
        }
        FetchOutcome::Success(success) => success,
    };

    let body = String::from_utf8_lossy(&success.body).into_owned();
    let parsed = parse_html(&body, &success.final_url);
    let links = sanitize_links(&parsed.raw_links, &success.final_url);

    if links.is_empty() {
        publish_method(sink, url_str, FetchMethod::Dynamic, "empty static result");
        return upgrade_or_keep_static(
            url, url_str, options, cancel, success, parsed, links, None,
        )
        .await;
    }

    let verdict = detect(&body, links.len(), parsed.script_count, parsed.text_length);

    if verdict.needs_dynamic && verdict.confidence >= options.detection_threshold {
        publish_method(sink, url_str, FetchMethod::Dynamic, &verdict.reason);
        return upgrade_or_keep_static(
            url,
            url_str,
            options,
            cancel,
            success,
            parsed,
            links,
            Some(verdict),
        )
        .await;
    }

    build_success(
        url_str,
        FetchMethod::Static,
        &success,
        parsed,
        links,
        Some(verdict),
        options,
    )
}

/// Tries the browser after a successful-but-insufficient static fetch
///
/// If the render fails, the static result is still a real page; it is
/// returned (annotated) rather than discarded for a worse answer.
#[allow(clippy::too_many_arguments)]
async fn upgrade_or_keep_static(
    url: &Url,
    url_str: &str,
    options: &CrawlOptions,
    cancel: &CancelToken,
    static_success: FetchSuccess,
    static_parsed: ParsedPage,
    static_links: Vec<Url>,
    verdict: Option<DetectionVerdict>,
) -> PageResult {
    let outcome = DynamicFetcher::new(options).fetch(url, cancel).await;

    match outcome {
        FetchOutcome::Success(rendered) => {
            let body = String::from_utf8_lossy(&rendered.body).into_owned();
            let parsed = parse_html(&body, &rendered.final_url);
            let links = sanitize_links(&parsed.raw_links, &rendered.final_url);
            build_success(
                url_str,
                FetchMethod::Dynamic,
                &rendered,
                parsed,
                links,
                verdict,
                options,
            )
        }
        FetchOutcome::Failure { kind, .. } => {
            tracing::warn!(
                "dynamic upgrade failed for {} ({}), keeping static result",
                url_str,
                kind.as_str()
            );
            build_success(
                url_str,
                FetchMethod::Static,
                &static_success,
                static_parsed,
                static_links,
                verdict,
                options,
            )
        }
    }
}

async fn fetch_static(url: &Url, options: &CrawlOptions, cancel: &CancelToken) -> FetchOutcome {
    match StaticFetcher::new(options) {
        Ok(fetcher) => fetcher.fetch(url, cancel).await,
        Err(e) => {
            tracing::warn!("failed to build HTTP client: {}", e);
            FetchOutcome::failure(ErrorKind::Unknown)
        }
    }
}

/// Turns a terminal outcome into a `PageResult`
fn finish(
    url_str: &str,
    method: FetchMethod,
    outcome: FetchOutcome,
    detection: Option<DetectionVerdict>,
    options: &CrawlOptions,
) -> PageResult {
    match outcome {
        FetchOutcome::Success(success) => {
            let body = String::from_utf8_lossy(&success.body).into_owned();
            let parsed = parse_html(&body, &success.final_url);
            let links = sanitize_links(&parsed.raw_links, &success.final_url);
            build_success(url_str, method, &success, parsed, links, detection, options)
        }
        FetchOutcome::Failure { kind, message } => {
            let mut result = PageResult::failed(url_str, method, kind, message);
            result.credential = options.credential.clone();
            result
        }
    }
}

/// Assembles the successful `PageResult` from fetched and parsed parts
fn build_success(
    url_str: &str,
    method: FetchMethod,
    success: &FetchSuccess,
    parsed: ParsedPage,
    links: Vec<Url>,
    detection: Option<DetectionVerdict>,
    options: &CrawlOptions,
) -> PageResult {
    let mut metadata = parsed.metadata;
    if !success.content_type.is_empty() {
        metadata.content_type = Some(success.content_type.clone());
    }

    PageResult {
        url: url_str.to_string(),
        final_url: Some(success.final_url.to_string()),
        title: parsed.title,
        links: links.iter().map(|u| u.to_string()).collect(),
        metadata,
        headings: parsed.headings,
        fetch_method: method,
        diagnostics: Diagnostics {
            duration_ms: success.duration.as_millis() as u64,
            status_code: Some(success.status),
            response_size: Some(success.response_size),
            tls: Some(success.tls.clone()),
        },
        detection,
        success: true,
        error: None,
        screenshot: success.screenshot.clone(),
        credential: options.credential.clone(),
    }
}

fn fail(url: &str, method: FetchMethod, kind: ErrorKind, options: &CrawlOptions) -> PageResult {
    let mut result = PageResult::failed(url, method, kind, kind.user_message().to_string());
    result.credential = options.credential.clone();
    result
}

fn cancelled(url: &str, method: FetchMethod, options: &CrawlOptions) -> PageResult {
    let mut result =
        PageResult::failed(url, method, ErrorKind::Unknown, "cancelled".to_string());
    result.credential = options.credential.clone();
    result
}

fn publish_method(sink: &dyn EventSink, url: &str, method: FetchMethod, reason: &str) {
    sink.publish(CrawlEvent::MethodDetected {
        url: url.to_string(),
        method,
        reason: reason.to_string(),
        timestamp: Utc::now(),
    });
}
