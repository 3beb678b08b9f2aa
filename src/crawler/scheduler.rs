//! Bounded traversal scheduling
//!
//! This module handles:
//! - Depth-first recursive expansion from a seed URL under strict budgets
//! - Deduplication by normalized key and same-domain scoping
//! - The politeness floor between fetches, with rate-limit backoff
//! - Lifecycle event emission in the documented order
//! - Batch single-page crawling with a small fixed pool
//!
//! A recursive session runs on one logical worker: page fetches are
//! strictly sequential, which keeps child-link selection and politeness
//! delays deterministic. Only the batch API fans out.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use url::Url;

use crate::cancel::CancelToken;
use crate::classify::ErrorKind;
use crate::config::{CrawlLimits, CrawlOptions};
use crate::crawler::orchestrator::{announce_method, crawl_announced, crawl_one};
use crate::crawler::session::{CrawlSession, SessionState};
use crate::crawler::types::{FetchMethod, PageResult};
use crate::events::{CrawlEvent, CrawlType, EventSink};
use crate::url::{host_of, normalize_key, validate_absolute};

/// How many invocations keep the doubled delay after a 429
const BACKOFF_INVOCATIONS: u32 = 5;

/// Pause between batches in `crawl_batch`
const BATCH_PAUSE: Duration = Duration::from_secs(1);

/// Every Nth discovered link gets a `crawl:link-found` event
const LINK_EVENT_STRIDE: usize = 5;

/// Crawls recursively from a seed URL
///
/// Traversal is depth-first over each page's links in their emitted
/// order. Per URL, in order: the depth bound, the page budget, key
/// deduplication, and domain scoping are checked before any fetch; then
/// `depth-change` (when the depth moved), the initial `method-detected`,
/// and `progress` are published, the politeness delay is observed, and
/// the page is crawled.
///
/// Limits are clamped to their documented caps on entry. Per-URL
/// failures are non-fatal: the session records them and continues.
/// Cancellation stops the traversal, emits one fatal `crawl:error`, and
/// returns the session as accumulated.
pub async fn crawl_recursive(
    seed: &str,
    options: &CrawlOptions,
    limits: &CrawlLimits,
    sink: &dyn EventSink,
    cancel: &CancelToken,
) -> CrawlSession {
    let limits = limits.clamped();
    let started = std::time::Instant::now();

    let seed_parsed = validate_absolute(seed);
    let base_host = seed_parsed.as_ref().ok().and_then(host_of);

    let mut session = CrawlSession::new(seed, base_host, limits.clone());
    session.credential = options.credential.clone();
    session.state = SessionState::Running;

    sink.publish(CrawlEvent::Start {
        session_id: session.session_id,
        seed_url: seed.to_string(),
        max_depth: limits.max_depth,
        crawl_type: CrawlType::Recursive,
        timestamp: Utc::now(),
    });

    let seed_url = match seed_parsed {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("seed URL rejected: {}", e);
            sink.publish(CrawlEvent::Error {
                session_id: session.session_id,
                error_kind: ErrorKind::InvalidUrl,
                error_message: ErrorKind::InvalidUrl.user_message().to_string(),
                failed_url: seed.to_string(),
                fatal: false,
                depth: Some(0),
                timestamp: Utc::now(),
            });
            let mut result = PageResult::failed(
                seed,
                FetchMethod::Static,
                ErrorKind::InvalidUrl,
                ErrorKind::InvalidUrl.user_message().to_string(),
            );
            result.credential = options.credential.clone();
            session.record(0, result);
            session.finish(SessionState::Completed);
            publish_complete(sink, &session, started.elapsed());
            return session;
        }
    };

    // Depth-first frontier: children are pushed in reverse so the first
    // link of a page is also the first one fetched.
    let mut frontier: Vec<(Url, u32)> = vec![(seed_url, 0)];
    let mut pages_at_depth: HashMap<u32, usize> = HashMap::new();
    let mut last_depth: Option<u32> = None;
    let mut backoff_remaining: u32 = 0;
    let mut fetched_any = false;
    let mut aborted_at: Option<String> = None;

    while let Some((url, depth)) = frontier.pop() {
        if cancel.is_cancelled() {
            aborted_at = Some(url.to_string());
            break;
        }

        if depth > limits.max_depth {
            continue;
        }
        if session.visited.len() >= limits.max_pages {
            tracing::debug!("page budget spent, stopping traversal");
            break;
        }

        let key = normalize_key(&url);
        if session.visited.contains(&key) {
            continue;
        }
        if limits.same_domain_only && host_of(&url) != session.base_host {
            continue;
        }
        session.visited.insert(key);

        let at_depth = pages_at_depth.entry(depth).or_insert(0);
        *at_depth += 1;
        if last_depth != Some(depth) {
            sink.publish(CrawlEvent::DepthChange {
                current_depth: depth,
                max_depth: limits.max_depth,
                pages_at_this_depth: *at_depth,
                timestamp: Utc::now(),
            });
            last_depth = Some(depth);
        }

        // The URL's method commitment precedes its progress snapshot
        announce_method(sink, url.as_str(), options);

        let processed = session.visited.len();
        sink.publish(CrawlEvent::Progress {
            percentage: (100 * processed / limits.max_pages).min(100) as u32,
            pages_processed: processed,
            total_estimate: limits.max_pages,
            current_url: url.to_string(),
            status: "crawling".to_string(),
        });

        // Politeness floor between consecutive fetches; doubled while a
        // rate-limit backoff window is open.
        if fetched_any {
            let factor = if backoff_remaining > 0 { 2 } else { 1 };
            if cancel.is_cancelled() {
                aborted_at = Some(url.to_string());
                break;
            }
            tokio::time::sleep(Duration::from_millis(limits.delay_ms * factor)).await;
        }
        if cancel.is_cancelled() {
            aborted_at = Some(url.to_string());
            break;
        }

        let result = crawl_announced(&url, options, sink, cancel).await;
        fetched_any = true;
        backoff_remaining = backoff_remaining.saturating_sub(1);

        if let Some(error) = &result.error {
            if error.kind == ErrorKind::RateLimited {
                tracing::info!(
                    "rate limited at {}, doubling delay for the next {} fetches",
                    url,
                    BACKOFF_INVOCATIONS
                );
                backoff_remaining = BACKOFF_INVOCATIONS;
            }
            sink.publish(CrawlEvent::Error {
                session_id: session.session_id,
                error_kind: error.kind,
                error_message: error.message.clone(),
                failed_url: url.to_string(),
                fatal: false,
                depth: Some(depth),
                timestamp: Utc::now(),
            });
        }

        let succeeded = result.success;
        let links = result.links.clone();
        session.record(depth, result);

        if succeeded && depth < limits.max_depth {
            let children = select_children(
                &links,
                &url,
                depth,
                &session,
                &limits,
                sink,
            );
            for child in children.into_iter().rev() {
                frontier.push((child, depth + 1));
            }
        }
    }

    if let Some(failed_url) = aborted_at {
        sink.publish(CrawlEvent::Error {
            session_id: session.session_id,
            error_kind: ErrorKind::Unknown,
            error_message: "crawl cancelled".to_string(),
            failed_url,
            fatal: true,
            depth: None,
            timestamp: Utc::now(),
        });
        session.finish(SessionState::Aborted);
    } else {
        session.finish(SessionState::Completed);
    }

    publish_complete(sink, &session, started.elapsed());
    session
}

/// Selects the child links a page contributes to the frontier
///
/// Walks the page's sanitized links in emitted order, publishing
/// `crawl:link-found` for every 5th one, and keeps the first
/// `child_links_per_page` links that survive dedup and domain scoping.
fn select_children(
    links: &[String],
    source: &Url,
    depth: u32,
    session: &CrawlSession,
    limits: &CrawlLimits,
    sink: &dyn EventSink,
) -> Vec<Url> {
    let mut selected = Vec::new();
    let mut link_count = 0usize;

    for link in links {
        link_count += 1;
        if link_count % LINK_EVENT_STRIDE == 0 {
            sink.publish(CrawlEvent::LinkFound {
                url: link.clone(),
                source_url: source.to_string(),
                depth,
                link_count,
            });
        }

        if selected.len() >= limits.child_links_per_page {
            continue; // keep counting links for the event stride
        }

        let child = match Url::parse(link) {
            Ok(url) => url,
            Err(_) => continue,
        };
        if session.visited.contains(&normalize_key(&child)) {
            continue;
        }
        if limits.same_domain_only && host_of(&child) != session.base_host {
            continue;
        }

        selected.push(child);
    }

    selected
}

fn publish_complete(sink: &dyn EventSink, session: &CrawlSession, elapsed: Duration) {
    let stats = session.stats();
    sink.publish(CrawlEvent::Complete {
        session_id: session.session_id,
        total_pages: stats.total_pages,
        total_links: stats.total_links,
        duration_ms: elapsed.as_millis() as u64,
        method: None,
        max_depth_reached: Some(session.max_depth_reached),
        success_rate: Some(stats.success_rate),
        average_response_time_ms: Some(stats.average_response_time_ms),
        unique_domains: Some(stats.unique_domains),
        timestamp: Utc::now(),
    });
}

/// Crawls a batch of independent URLs with a small fixed pool
///
/// Runs up to `options.concurrency` orchestrator calls in parallel and
/// pauses one second between batches. Each URL is its own session: no
/// `visited` state is shared, and results come back in input order.
pub async fn crawl_batch(
    urls: &[String],
    options: &CrawlOptions,
    sink: Arc<dyn EventSink>,
    cancel: &CancelToken,
) -> Vec<PageResult> {
    let concurrency = options.concurrency.max(1);
    let mut slots: Vec<Option<PageResult>> = urls.iter().map(|_| None).collect();

    for (batch_index, batch) in urls.chunks(concurrency).enumerate() {
        if batch_index > 0 {
            tokio::time::sleep(BATCH_PAUSE).await;
        }
        if cancel.is_cancelled() {
            break;
        }

        let mut tasks: JoinSet<(usize, PageResult)> = JoinSet::new();
        for (offset, url) in batch.iter().enumerate() {
            let index = batch_index * concurrency + offset;
            let url = url.clone();
            let options = options.clone();
            let sink = sink.clone();
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let result = crawl_one(&url, &options, sink.as_ref(), &cancel).await;
                (index, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => tracing::warn!("batch task failed: {}", e),
            }
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                let mut result = PageResult::failed(
                    &urls[index],
                    FetchMethod::Static,
                    ErrorKind::Unknown,
                    "cancelled".to_string(),
                );
                result.credential = options.credential.clone();
                result
            })
        })
        .collect()
}
