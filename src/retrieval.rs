//! HTTP retrieval with User-Agent rotation and status-keyed retry policy.
//!
//! # Architecture
//!
//! - [`PageFetch`]: core trait, one GET per call, no retries
//! - [`HttpClient`]: the `reqwest` implementation
//! - [`RetryFetch`]: decorator that adds the retry policy to any [`PageFetch`]
//! - [`retry_delay`]: the policy itself, a pure function of attempt and failure
//!
//! # Retry Strategy
//!
//! | Failure | Delay before next attempt |
//! |---------|---------------------------|
//! | 429 | 5s, 10s, 20s, 20s, ... |
//! | 502 / 503 / 504, timeout, connection | 1s, 2s, 4s, 4s, ... |
//! | other 4xx, anything else | no retry |

use crate::error::{FailureKind, TransportError};
use rand::seq::IndexedRandom;
use reqwest::header::USER_AGENT;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Browser identities rotated across requests.
pub const DEFAULT_USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:89.0) Gecko/20100101 Firefox/89.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:89.0) Gecko/20100101 Firefox/89.0",
];

const RATE_LIMIT_SCHEDULE_SECS: [u64; 3] = [5, 10, 20];
const MAX_BACKOFF_SECS: u64 = 4;

/// Trait for fetching a page body.
///
/// Implementors perform exactly one request per call. Retrying is layered on
/// top by [`RetryFetch`].
pub trait PageFetch {
    /// Fetch `url` and return the response body as text.
    ///
    /// `timeout` overrides the implementor's session default.
    async fn fetch(&self, url: &str, timeout: Option<Duration>) -> Result<String, TransportError>;
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

/// Retry policy for a failed attempt.
///
/// `attempt` is the 0-based index of the attempt that just failed. The
/// caller is responsible for enforcing the retry budget.
pub fn retry_delay(attempt: u32, kind: &FailureKind) -> RetryDecision {
    match kind {
        FailureKind::Status(429) => {
            let idx = (attempt as usize).min(RATE_LIMIT_SCHEDULE_SECS.len() - 1);
            RetryDecision::RetryAfter(Duration::from_secs(RATE_LIMIT_SCHEDULE_SECS[idx]))
        }
        FailureKind::Status(502 | 503 | 504) | FailureKind::Timeout | FailureKind::Connection => {
            let secs = 2u64.saturating_pow(attempt).min(MAX_BACKOFF_SECS);
            RetryDecision::RetryAfter(Duration::from_secs(secs))
        }
        FailureKind::Status(_) | FailureKind::Other(_) => RetryDecision::GiveUp,
    }
}

/// Fetch `url` through `fetcher`, retrying according to [`retry_delay`].
///
/// Makes at most `max_retries + 1` attempts. The returned error is the last
/// one observed, with `attempts` set to the number of attempts made.
#[instrument(level = "info", skip_all, fields(%url, max_retries))]
pub async fn fetch_with_retry<F>(
    fetcher: &F,
    url: &str,
    max_retries: u32,
    timeout: Option<Duration>,
) -> Result<String, TransportError>
where
    F: PageFetch + ?Sized,
{
    let total_t0 = Instant::now();
    let mut attempt = 0u32;

    loop {
        match fetcher.fetch(url, timeout).await {
            Ok(body) => {
                if attempt > 0 {
                    info!(attempt = attempt + 1, "Fetched after retry");
                }
                return Ok(body);
            }
            Err(e) => {
                let attempts_made = attempt + 1;
                let decision = retry_delay(attempt, &e.kind);

                let delay = match decision {
                    RetryDecision::GiveUp => {
                        error!(attempt = attempts_made, error = %e.kind, "Non-retryable failure");
                        return Err(e.with_attempts(attempts_made));
                    }
                    RetryDecision::RetryAfter(_) if attempt >= max_retries => {
                        error!(
                            attempt = attempts_made,
                            max = max_retries,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e.kind,
                            "fetch exhausted retries"
                        );
                        return Err(e.with_attempts(attempts_made));
                    }
                    RetryDecision::RetryAfter(delay) => delay,
                };

                warn!(
                    attempt = attempts_made,
                    max = max_retries,
                    ?delay,
                    error = %e.kind,
                    "fetch attempt failed; backing off"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Decorator that adds the retry policy to any [`PageFetch`] implementation.
pub struct RetryFetch<T> {
    inner: T,
    max_retries: u32,
}

impl<T> RetryFetch<T>
where
    T: PageFetch,
{
    pub fn new(inner: T, max_retries: u32) -> Self {
        Self { inner, max_retries }
    }

    #[cfg(test)]
    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl<T> PageFetch for RetryFetch<T>
where
    T: PageFetch,
{
    async fn fetch(&self, url: &str, timeout: Option<Duration>) -> Result<String, TransportError> {
        fetch_with_retry(&self.inner, url, self.max_retries, timeout).await
    }
}

/// `reqwest`-backed client with a session timeout and User-Agent rotation.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    default_timeout: Duration,
    user_agents: Vec<String>,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("default_timeout", &self.default_timeout)
            .field("user_agents", &self.user_agents.len())
            .finish()
    }
}

impl HttpClient {
    /// Build a client. An empty `user_agents` list falls back to
    /// [`DEFAULT_USER_AGENTS`].
    pub fn new(default_timeout: Duration, user_agents: Vec<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(default_timeout)
            .build()?;
        let user_agents = if user_agents.is_empty() {
            DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect()
        } else {
            user_agents
        };
        info!(timeout_secs = default_timeout.as_secs(), "HttpClient initialized");
        Ok(Self {
            client,
            default_timeout,
            user_agents,
        })
    }

    fn pick_user_agent(&self) -> &str {
        self.user_agents
            .choose(&mut rand::rng())
            .map(String::as_str)
            .unwrap_or(DEFAULT_USER_AGENTS[0])
    }

}

impl PageFetch for HttpClient {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &str, timeout: Option<Duration>) -> Result<String, TransportError> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let user_agent = self.pick_user_agent();
        debug!(user_agent, "Rotated User-Agent");

        let t0 = Instant::now();
        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                let err = TransportError::from_reqwest(url, &e);
                warn!(error = %err.kind, "Request failed");
                err
            })?;

        let status = resp.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Non-success status");
            return Err(TransportError::new(url, FailureKind::Status(status.as_u16())));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(url, &e))?;

        info!(
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(body)
    }
}
