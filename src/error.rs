//! Error taxonomy for retrieval, discovery and extraction.
//!
//! [`ScrapeError`] is what the pipeline stages return. Its variant name is
//! recorded verbatim as the `error_kind` of a
//! [`FailedExtraction`](crate::models::FailedExtraction) when a single link
//! fails, so the names are part of the output format.

use std::fmt;
use thiserror::Error;

/// Why a single HTTP attempt failed.
///
/// The retry policy in [`crate::retrieval::retry_delay`] is keyed on this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The transport-level timeout elapsed.
    Timeout,
    /// DNS, TCP or TLS failure before a response arrived.
    Connection,
    /// The server answered with a non-2xx status.
    Status(u16),
    /// Anything else: request build failure, body decode error, redirect loop.
    Other(String),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Connection => write!(f, "connection failure"),
            FailureKind::Status(code) => write!(f, "HTTP status {code}"),
            FailureKind::Other(msg) => write!(f, "request error: {msg}"),
        }
    }
}

/// A failed retrieval, tagged with the URL and how many attempts were made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} while fetching {url} (attempts: {attempts})")]
pub struct TransportError {
    pub url: String,
    pub attempts: u32,
    pub kind: FailureKind,
}

impl TransportError {
    pub fn new(url: impl Into<String>, kind: FailureKind) -> Self {
        Self {
            url: url.into(),
            attempts: 1,
            kind,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Classify a `reqwest` error into a [`FailureKind`].
    pub fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            FailureKind::Timeout
        } else if err.is_connect() {
            FailureKind::Connection
        } else if let Some(status) = err.status() {
            FailureKind::Status(status.as_u16())
        } else {
            FailureKind::Other(err.to_string())
        };
        Self::new(url, kind)
    }
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("announcements section not found: {0}")]
    SectionNotFound(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid date filter '{0}': expected YYYY-MM (e.g. 2026-01), year 2000-2100, month 01-12")]
    InvalidFormat(String),
}

impl ScrapeError {
    /// Stable name of the variant, used as `error_kind` in failure records.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Transport(_) => "TransportError",
            ScrapeError::SectionNotFound(_) => "SectionNotFound",
            ScrapeError::Parse(_) => "ParseError",
            ScrapeError::InvalidFormat(_) => "InvalidFormat",
        }
    }
}
