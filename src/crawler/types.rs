//! Core result types shared by both fetch paths

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::classify::ErrorKind;
use crate::crawler::detector::DetectionVerdict;

/// How a page was (or will be) fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMethod {
    /// HTTP request + HTML parse, no script execution
    Static,
    /// Headless-browser navigation with scripts executed
    Dynamic,
}

impl std::fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static => write!(f, "static"),
            Self::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// TLS details for a completed fetch
///
/// reqwest does not expose the negotiated protocol version, so this
/// records the profile that produced the response rather than handshake
/// specifics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsInfo {
    pub protocol: String,
    pub min_version: String,
    pub cert_valid: bool,
}

impl TlsInfo {
    /// The strict profile: verified certificates, TLS 1.2 or newer
    pub fn strict() -> Self {
        Self {
            protocol: "TLS 1.2+".to_string(),
            min_version: "TLS 1.2".to_string(),
            cert_valid: true,
        }
    }

    /// The legacy fallback profile: verification off, TLS 1.0 or newer
    pub fn legacy() -> Self {
        Self {
            protocol: "TLS 1.0+ (legacy)".to_string(),
            min_version: "TLS 1.0".to_string(),
            cert_valid: false,
        }
    }

    /// The dynamic path: the browser negotiates and verifies on its own
    pub fn browser_managed() -> Self {
        Self {
            protocol: "browser-managed".to_string(),
            min_version: "TLS 1.2".to_string(),
            cert_valid: true,
        }
    }
}

/// A successfully fetched (or rendered) page body
#[derive(Debug, Clone)]
pub struct FetchSuccess {
    /// URL after redirects
    pub final_url: Url,
    /// HTTP status (the browser path reports 200; CDP hides the real code)
    pub status: u16,
    /// Raw body bytes
    pub body: Vec<u8>,
    /// Declared content type
    pub content_type: String,
    /// Body size in bytes
    pub response_size: usize,
    /// Profile-level TLS details
    pub tls: TlsInfo,
    /// Wall time for the fetch
    pub duration: Duration,
    /// Path of the captured screenshot, when one was requested
    pub screenshot: Option<PathBuf>,
}

/// Outcome of a single fetch attempt chain
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The page was fetched; body and diagnostics attached
    Success(FetchSuccess),

    /// The fetch failed terminally after retries and fallbacks
    Failure {
        /// Classified failure kind
        kind: ErrorKind,
        /// User-facing message from the classifier
        message: String,
    },
}

impl FetchOutcome {
    /// Builds a failure from a classified kind, using its canonical message
    pub fn failure(kind: ErrorKind) -> Self {
        Self::Failure {
            kind,
            message: kind.user_message().to_string(),
        }
    }
}

/// Metadata extracted from a page's head
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub og_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub og_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter_card: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Timing and transport diagnostics for one crawled page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsInfo>,
}

/// Classified failure attached to an unsuccessful [`PageResult`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Semantic record produced for every crawled URL
///
/// This is the engine's per-URL output: the orchestrator always returns
/// one, successful or not, and never raises across its boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// The URL as submitted
    pub url: String,
    /// URL after redirects, when a fetch happened
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Sanitized, deduplicated outbound links in document order
    pub links: Vec<String>,
    pub metadata: PageMetadata,
    /// Top-two heading levels, as a content-structure diagnostic
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub headings: Vec<String>,
    pub fetch_method: FetchMethod,
    pub diagnostics: Diagnostics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection: Option<DetectionVerdict>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PageError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<PathBuf>,
    /// Opaque owner identifier, passed through untouched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl PageResult {
    /// Builds a failed result for a URL that produced no page
    pub fn failed(url: &str, method: FetchMethod, kind: ErrorKind, message: String) -> Self {
        Self {
            url: url.to_string(),
            final_url: None,
            title: None,
            links: Vec::new(),
            metadata: PageMetadata::default(),
            headings: Vec::new(),
            fetch_method: method,
            diagnostics: Diagnostics::default(),
            detection: None,
            success: false,
            error: Some(PageError { kind, message }),
            screenshot: None,
            credential: None,
        }
    }
}
