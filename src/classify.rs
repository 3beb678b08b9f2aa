//! Error classification for crawl failures
//!
//! This module maps raw transport and HTTP failures onto a closed taxonomy.
//! The taxonomy is the single source of truth for severity, retryability,
//! and user-facing messages; the fetchers, orchestrator, and scheduler all
//! consult it rather than inspecting raw errors themselves.

use serde::{Deserialize, Serialize};

/// Closed taxonomy of crawl failure kinds
///
/// Classification is ordered: when several descriptions could apply to a
/// raw error, the first matching kind in declaration order wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    // ===== TLS failures =====
    /// The server certificate has expired
    SslCertExpired,

    /// The certificate failed verification (untrusted issuer, hostname mismatch)
    SslCertInvalid,

    /// The certificate is self-signed
    SslSelfSigned,

    /// Any other TLS-layer failure (handshake, protocol version)
    SslOther,

    // ===== Transport failures =====
    /// The request exceeded its time budget (includes HTTP 408)
    Timeout,

    /// The remote host actively refused the connection
    ConnectionRefused,

    /// Hostname resolution failed
    DnsError,

    // ===== HTTP failures =====
    /// The server returned HTTP 429
    RateLimited,

    /// Any other 4xx response
    #[serde(rename = "HTTP_4xx")]
    Http4xx,

    /// Any 5xx response
    #[serde(rename = "HTTP_5xx")]
    Http5xx,

    // ===== Local failures =====
    /// The input could not be parsed as a crawlable URL
    InvalidUrl,

    /// Anything the taxonomy does not recognize
    Unknown,
}

/// Severity attached to each failure kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorKind {
    /// Returns the wire name of this kind (matches the serde representation)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SslCertExpired => "SSL_CERT_EXPIRED",
            Self::SslCertInvalid => "SSL_CERT_INVALID",
            Self::SslSelfSigned => "SSL_SELF_SIGNED",
            Self::SslOther => "SSL_OTHER",
            Self::Timeout => "TIMEOUT",
            Self::ConnectionRefused => "CONNECTION_REFUSED",
            Self::DnsError => "DNS_ERROR",
            Self::RateLimited => "RATE_LIMITED",
            Self::Http4xx => "HTTP_4xx",
            Self::Http5xx => "HTTP_5xx",
            Self::InvalidUrl => "INVALID_URL",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Returns the severity of this failure kind
    pub fn severity(&self) -> Severity {
        match self {
            Self::SslCertInvalid => Severity::Critical,
            Self::SslCertExpired | Self::SslOther => Severity::High,
            Self::ConnectionRefused | Self::DnsError | Self::Http5xx => Severity::High,
            Self::SslSelfSigned | Self::Timeout | Self::Http4xx | Self::Unknown => Severity::Medium,
            Self::RateLimited | Self::InvalidUrl => Severity::Low,
        }
    }

    /// Returns true if a request failing with this kind may be retried
    ///
    /// HTTP 408 and 429 never classify as `Http4xx` (they map to `Timeout`
    /// and `RateLimited`), so the blanket 4xx answer here is final.
    pub fn retryable(&self) -> bool {
        !matches!(
            self,
            Self::DnsError
                | Self::InvalidUrl
                | Self::ConnectionRefused
                | Self::SslCertExpired
                | Self::Http4xx
        )
    }

    /// Returns true if this kind belongs to the TLS family
    pub fn is_ssl(&self) -> bool {
        matches!(
            self,
            Self::SslCertExpired | Self::SslCertInvalid | Self::SslSelfSigned | Self::SslOther
        )
    }

    /// Returns the user-facing description of this failure kind
    ///
    /// Crawl results and events carry this text, never raw error output.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::SslCertExpired => "The site's security certificate has expired",
            Self::SslCertInvalid => "The site's security certificate could not be verified",
            Self::SslSelfSigned => "The site uses a self-signed security certificate",
            Self::SslOther => "A secure connection to the site could not be established",
            Self::Timeout => "The site took too long to respond",
            Self::ConnectionRefused => "The site refused the connection",
            Self::DnsError => "The site's address could not be resolved",
            Self::RateLimited => "The site is rate limiting requests",
            Self::Http4xx => "The site rejected the request",
            Self::Http5xx => "The site encountered an internal error",
            Self::InvalidUrl => "The URL is not valid",
            Self::Unknown => "The page could not be fetched",
        }
    }
}

/// Classifies an HTTP status code
///
/// Only statuses >= 400 are failures; callers should not pass success
/// statuses here. 408 maps to `Timeout` and 429 to `RateLimited`, which is
/// why those two stay retryable while the rest of the 4xx range does not.
pub fn classify_status(status: u16) -> ErrorKind {
    match status {
        408 => ErrorKind::Timeout,
        429 => ErrorKind::RateLimited,
        400..=499 => ErrorKind::Http4xx,
        500..=599 => ErrorKind::Http5xx,
        _ => ErrorKind::Unknown,
    }
}

/// Classifies a transport-level reqwest error
///
/// The TLS sub-kinds are distinguished by inspecting the error chain text,
/// since reqwest does not expose a structured verification failure. Matching
/// follows taxonomy order: the first kind whose description fits wins.
pub fn classify_transport(error: &reqwest::Error) -> ErrorKind {
    let chain = error_chain_text(error);

    if chain.contains("expired") && (chain.contains("certificate") || chain.contains("cert")) {
        return ErrorKind::SslCertExpired;
    }
    if chain.contains("certificate verify failed")
        || chain.contains("invalid certificate")
        || chain.contains("unable to get local issuer")
        || chain.contains("hostname mismatch")
    {
        return ErrorKind::SslCertInvalid;
    }
    if chain.contains("self signed") || chain.contains("self-signed") {
        return ErrorKind::SslSelfSigned;
    }
    if chain.contains("ssl") || chain.contains("tls") || chain.contains("handshake") {
        return ErrorKind::SslOther;
    }
    if error.is_timeout() || chain.contains("timed out") {
        return ErrorKind::Timeout;
    }
    if chain.contains("connection refused") {
        return ErrorKind::ConnectionRefused;
    }
    if chain.contains("dns error")
        || chain.contains("failed to lookup")
        || chain.contains("name or service not known")
        || chain.contains("nodename nor servname")
    {
        return ErrorKind::DnsError;
    }
    if error.is_connect() {
        return ErrorKind::ConnectionRefused;
    }
    if error.is_builder() || error.is_request() && chain.contains("url") {
        return ErrorKind::InvalidUrl;
    }

    ErrorKind::Unknown
}

/// Flattens an error and its sources into one lowercase string
fn error_chain_text(error: &reqwest::Error) -> String {
    let mut text = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(inner) = source {
        text.push_str("; ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text.to_lowercase()
}
