//! Crawl lifecycle event types and the caller-supplied sink
//!
//! The engine does not own any transport. Every crawl operation takes an
//! [`EventSink`] and publishes typed events through it; the sink decides
//! what delivery means (a websocket, a channel, a log, nothing at all).
//! Publishing is best-effort: a sink must not panic, and the engine never
//! lets event delivery affect a crawl.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

use crate::classify::ErrorKind;
use crate::crawler::FetchMethod;

/// Whether a session is a single-page call or a recursive expansion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlType {
    Single,
    Recursive,
}

/// Events emitted during crawl operations
///
/// Each variant serializes as internally-tagged JSON (`"type": "crawl:..."`)
/// so downstream transports can forward the payloads verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CrawlEvent {
    /// A crawl session has begun; always the first event.
    #[serde(rename = "crawl:start")]
    Start {
        session_id: Uuid,
        seed_url: String,
        max_depth: u32,
        crawl_type: CrawlType,
        timestamp: DateTime<Utc>,
    },

    /// The engine committed to a fetch method for one URL.
    #[serde(rename = "crawl:method-detected")]
    MethodDetected {
        url: String,
        method: FetchMethod,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Aggregate progress snapshot, emitted before each page fetch.
    #[serde(rename = "crawl:progress")]
    Progress {
        percentage: u32,
        pages_processed: usize,
        total_estimate: usize,
        current_url: String,
        status: String,
    },

    /// The traversal moved to a different depth.
    #[serde(rename = "crawl:depth-change")]
    DepthChange {
        current_depth: u32,
        max_depth: u32,
        pages_at_this_depth: usize,
        timestamp: DateTime<Utc>,
    },

    /// A link was discovered (throttled: every 5th link per page).
    #[serde(rename = "crawl:link-found")]
    LinkFound {
        url: String,
        source_url: String,
        depth: u32,
        link_count: usize,
    },

    /// A URL failed, or the session was cancelled (`fatal: true`).
    #[serde(rename = "crawl:error")]
    Error {
        session_id: Uuid,
        error_kind: ErrorKind,
        error_message: String,
        failed_url: String,
        fatal: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        depth: Option<u32>,
        timestamp: DateTime<Utc>,
    },

    /// The session finished; always the last event, emitted exactly once.
    #[serde(rename = "crawl:complete")]
    Complete {
        session_id: Uuid,
        total_pages: usize,
        total_links: usize,
        duration_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        method: Option<FetchMethod>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_depth_reached: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        success_rate: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        average_response_time_ms: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        unique_domains: Option<usize>,
        timestamp: DateTime<Utc>,
    },
}

impl CrawlEvent {
    /// Returns the wire name of this event
    pub fn event_name(&self) -> &'static str {
        match self {
            CrawlEvent::Start { .. } => "crawl:start",
            CrawlEvent::MethodDetected { .. } => "crawl:method-detected",
            CrawlEvent::Progress { .. } => "crawl:progress",
            CrawlEvent::DepthChange { .. } => "crawl:depth-change",
            CrawlEvent::LinkFound { .. } => "crawl:link-found",
            CrawlEvent::Error { .. } => "crawl:error",
            CrawlEvent::Complete { .. } => "crawl:complete",
        }
    }
}

/// Caller-supplied consumer of crawl events
///
/// Implementations must not panic; the engine treats delivery as
/// fire-and-forget.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: CrawlEvent);
}

/// Sink that drops every event
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: CrawlEvent) {}
}

/// Sink that records every event in memory
///
/// Used by tests to assert on event content and ordering.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<CrawlEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything published so far
    pub fn events(&self) -> Vec<CrawlEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Returns the wire names of everything published so far, in order
    pub fn event_names(&self) -> Vec<&'static str> {
        self.events().iter().map(|e| e.event_name()).collect()
    }
}

impl EventSink for CollectingSink {
    fn publish(&self, event: CrawlEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
