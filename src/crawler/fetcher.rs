//! Static HTTP fetcher
//!
//! This module performs plain HTTP(S) fetches for the crawler, including:
//! - Building clients for the strict and legacy TLS profiles
//! - Retry logic with linear backoff for transient failures
//! - A single-shot legacy-TLS fallback on recoverable certificate errors
//! - Error classification through the shared taxonomy

use reqwest::{header, redirect::Policy, Client};
use std::time::{Duration, Instant};
use url::Url;

use crate::cancel::CancelToken;
use crate::classify::{classify_status, classify_transport, ErrorKind};
use crate::config::CrawlOptions;
use crate::crawler::types::{FetchOutcome, FetchSuccess, TlsInfo};

/// Fixed desktop user agent for all requests
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Base backoff between strict retries, multiplied by the attempt number
const RETRY_BACKOFF_MS: u64 = 1500;

/// Maximum redirects followed per request
const MAX_REDIRECTS: usize = 5;

/// Static fetcher holding the strict-profile client
///
/// The legacy-profile client is built on demand; it exists only as a
/// targeted fallback and most crawls never construct it.
pub struct StaticFetcher {
    client: Client,
    max_retries: u32,
    timeout: Duration,
}

impl StaticFetcher {
    /// Creates a fetcher with the strict TLS profile
    ///
    /// # Arguments
    ///
    /// * `options` - Crawl options (timeout and retry budget are read here)
    pub fn new(options: &CrawlOptions) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_millis(options.timeout_ms);
        Ok(Self {
            client: build_strict_client(timeout)?,
            max_retries: options.max_retries.max(1),
            timeout,
        })
    }

    /// Fetches a URL under the documented retry and fallback policy
    ///
    /// # Algorithm
    ///
    /// 1. Attempt with the strict profile, up to `max_retries` times
    /// 2. A recoverable SSL failure switches to one legacy-profile attempt
    ///    whose outcome is final; an expired certificate is terminal with
    ///    no legacy attempt
    /// 3. Other retryable failures back off `1500 × attempt` ms and retry
    /// 4. The terminal outcome is returned; this function never panics
    ///
    /// Cancellation is observed before every attempt and before every
    /// backoff sleep.
    pub async fn fetch(&self, url: &Url, cancel: &CancelToken) -> FetchOutcome {
        let mut attempt = 1;

        loop {
            if cancel.is_cancelled() {
                return cancelled_outcome();
            }

            let outcome = attempt_fetch(&self.client, url, TlsInfo::strict()).await;

            let (kind, message) = match outcome {
                FetchOutcome::Success(success) => return FetchOutcome::Success(success),
                FetchOutcome::Failure { kind, message } => (kind, message),
            };

            if should_try_legacy(kind) {
                tracing::debug!(
                    "strict TLS failed for {} ({}), trying legacy profile once",
                    url,
                    kind.as_str()
                );
                return self.fetch_legacy(url, cancel).await;
            }

            if kind.retryable() && attempt < self.max_retries {
                let backoff = Duration::from_millis(RETRY_BACKOFF_MS * attempt as u64);
                tracing::debug!(
                    "retry {}/{} for {} after {:?} ({})",
                    attempt,
                    self.max_retries,
                    url,
                    backoff,
                    kind.as_str()
                );
                if cancel.is_cancelled() {
                    return cancelled_outcome();
                }
                tokio::time::sleep(backoff).await;
                attempt += 1;
                continue;
            }

            return FetchOutcome::Failure { kind, message };
        }
    }

    /// Performs the single-shot legacy-profile attempt
    ///
    /// Whatever this returns is the fetch's terminal outcome; it consumes
    /// no retries.
    async fn fetch_legacy(&self, url: &Url, cancel: &CancelToken) -> FetchOutcome {
        if cancel.is_cancelled() {
            return cancelled_outcome();
        }

        let client = match build_legacy_client(self.timeout) {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!("failed to build legacy TLS client: {}", e);
                return FetchOutcome::failure(ErrorKind::SslOther);
            }
        };

        attempt_fetch(&client, url, TlsInfo::legacy()).await
    }
}

/// Decides whether a failure kind warrants the legacy-TLS fallback
///
/// Expired certificates are excluded: the policy table marks them
/// non-retryable, and re-fetching with verification off would only hide
/// a condition the caller needs to see.
fn should_try_legacy(kind: ErrorKind) -> bool {
    kind.is_ssl() && kind != ErrorKind::SslCertExpired
}

/// Builds the strict-profile client: verified certs, TLS 1.2+
fn build_strict_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    base_builder(timeout)
        .min_tls_version(reqwest::tls::Version::TLS_1_2)
        .build()
}

/// Builds the legacy-profile client: verification off, TLS 1.0+
///
/// Used at most once per fetch, only after a recoverable SSL failure on
/// the strict profile.
fn build_legacy_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    base_builder(timeout)
        .min_tls_version(reqwest::tls::Version::TLS_1_0)
        .danger_accept_invalid_certs(true)
        .build()
}

fn base_builder(timeout: Duration) -> reqwest::ClientBuilder {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::ACCEPT_LANGUAGE,
        header::HeaderValue::from_static("en"),
    );

    Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(timeout)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
}

/// Performs one request and classifies whatever comes back
async fn attempt_fetch(client: &Client, url: &Url, tls: TlsInfo) -> FetchOutcome {
    let start = Instant::now();

    let response = match client.get(url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            let kind = classify_transport(&e);
            tracing::debug!("request failed for {}: {} ({})", url, e, kind.as_str());
            return FetchOutcome::failure(kind);
        }
    };

    let status = response.status().as_u16();
    let final_url = response.url().clone();

    if status >= 400 {
        tracing::debug!("HTTP {} for {}", status, url);
        return FetchOutcome::failure(classify_status(status));
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let body = match response.bytes().await {
        Ok(bytes) => bytes.to_vec(),
        Err(e) => {
            let kind = classify_transport(&e);
            tracing::debug!("body read failed for {}: {} ({})", url, e, kind.as_str());
            return FetchOutcome::failure(kind);
        }
    };

    FetchOutcome::Success(FetchSuccess {
        final_url,
        status,
        response_size: body.len(),
        body,
        content_type,
        tls,
        duration: start.elapsed(),
        screenshot: None,
    })
}

/// The outcome used when cancellation interrupts a fetch
fn cancelled_outcome() -> FetchOutcome {
    FetchOutcome::Failure {
        kind: ErrorKind::Unknown,
        message: "cancelled".to_string(),
    }
}
