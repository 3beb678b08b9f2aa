//! Session state for recursive crawls

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;
use uuid::Uuid;

use crate::config::CrawlLimits;
use crate::crawler::types::PageResult;
use crate::url::host_of;

/// Lifecycle of one crawl session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Running,
    Completed,
    /// Reached only through caller-supplied cancellation
    Aborted,
}

/// One crawled page inside a session, with its traversal position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub depth: u32,
    pub crawled_at: DateTime<Utc>,
    #[serde(flatten)]
    pub result: PageResult,
}

/// Summary numbers computed when a session is frozen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_pages: usize,
    pub total_links: usize,
    /// Fraction of pages that crawled successfully, in [0, 1]
    pub success_rate: f64,
    /// Mean fetch duration over successful pages
    pub average_response_time_ms: u64,
    pub unique_domains: usize,
}

/// Process-local aggregation of one recursive crawl
///
/// Created at entry, mutated only by the scheduler's single worker, and
/// frozen (state set, `finished_at` stamped) before being returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSession {
    pub session_id: Uuid,
    pub seed_url: String,
    /// Lowercase host of the seed, used for same-domain scoping
    pub base_host: Option<String>,
    /// Normalized keys of every URL accepted into the traversal
    pub visited: HashSet<String>,
    pub results: Vec<PageRecord>,
    pub max_depth_reached: u32,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub limits: CrawlLimits,
    pub state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl CrawlSession {
    /// Creates an idle session for a seed URL
    ///
    /// `seed` is kept as submitted; `base_host` is `None` when the seed
    /// did not validate (such a session fails its only page and completes).
    pub fn new(seed: &str, base_host: Option<String>, limits: CrawlLimits) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            seed_url: seed.to_string(),
            base_host,
            visited: HashSet::new(),
            results: Vec::new(),
            max_depth_reached: 0,
            started_at: Utc::now(),
            finished_at: None,
            limits,
            state: SessionState::Idle,
            credential: None,
        }
    }

    /// Appends a crawled page at the given depth
    pub fn record(&mut self, depth: u32, result: PageResult) {
        self.max_depth_reached = self.max_depth_reached.max(depth);
        self.results.push(PageRecord {
            depth,
            crawled_at: Utc::now(),
            result,
        });
    }

    /// Freezes the session in a terminal state
    pub fn finish(&mut self, state: SessionState) {
        self.state = state;
        self.finished_at = Some(Utc::now());
    }

    /// Computes the summary used by the completion event
    pub fn stats(&self) -> SessionStats {
        let total_pages = self.results.len();
        let total_links: usize = self.results.iter().map(|r| r.result.links.len()).sum();

        let succeeded: Vec<_> = self.results.iter().filter(|r| r.result.success).collect();
        let success_rate = if total_pages > 0 {
            succeeded.len() as f64 / total_pages as f64
        } else {
            0.0
        };

        let average_response_time_ms = if succeeded.is_empty() {
            0
        } else {
            let total: u64 = succeeded
                .iter()
                .map(|r| r.result.diagnostics.duration_ms)
                .sum();
            total / succeeded.len() as u64
        };

        let unique_domains = self
            .results
            .iter()
            .filter_map(|r| {
                let url = r.result.final_url.as_ref().unwrap_or(&r.result.url);
                Url::parse(url).ok().and_then(|u| host_of(&u))
            })
            .collect::<HashSet<_>>()
            .len();

        SessionStats {
            total_pages,
            total_links,
            success_rate,
            average_response_time_ms,
            unique_domains,
        }
    }
}
