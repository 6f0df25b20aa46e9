//! The scraping pipeline: landing page, date filter, detail pages.
//!
//! One run is strictly sequential. The landing page is fetched once, the
//! discovered links are filtered by month, and each remaining link is
//! extracted in turn with a fixed pause between consecutive fetches.
//! Per-link failures are recorded and never stop the batch.

use crate::config::{Language, ScraperConfig};
use crate::date_filter::{filter_by_date, YearMonth};
use crate::error::ScrapeError;
use crate::models::{FailedExtraction, ScrapingResult};
use crate::retrieval::{PageFetch, RetryFetch};
use crate::scrapers::detail::ContentExtractor;
use crate::scrapers::landing::LandingPageParser;
use crate::utils::truncate_for_log;
use chrono::Local;
use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

const PROGRESS_EVERY: usize = 10;
const SUMMARY_FAILURES_SHOWN: usize = 5;

/// Per-run knobs, usually derived from [`ScraperConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub landing_url: String,
    pub max_retries: u32,
    pub rate_limit_delay: Duration,
    /// `YYYY-MM`, validated when the run starts.
    pub date_filter: Option<String>,
    pub section_headings: Vec<String>,
}

impl From<&ScraperConfig> for RunSettings {
    fn from(config: &ScraperConfig) -> Self {
        Self {
            landing_url: config.landing_url().to_string(),
            max_retries: config.http.max_retries,
            rate_limit_delay: config.rate_limit_delay(),
            date_filter: config.filtering.date_filter.clone(),
            section_headings: config.scraping.section_headings.clone(),
        }
    }
}

/// Drives one scraping run over any [`PageFetch`] implementation.
#[derive(Debug)]
pub struct Scraper<F> {
    extractor: ContentExtractor<RetryFetch<F>>,
    parser: LandingPageParser,
    settings: RunSettings,
}

impl<F: PageFetch> Scraper<F> {
    /// Wrap `fetcher` with the retry policy and prepare the landing parser.
    ///
    /// # Errors
    ///
    /// [`ScrapeError::InvalidFormat`] when the landing URL does not parse.
    pub fn new(fetcher: F, settings: RunSettings) -> Result<Self, ScrapeError> {
        let parser = LandingPageParser::new(&settings.landing_url, settings.section_headings.clone())
            .map_err(|e| {
                ScrapeError::InvalidFormat(format!("landing URL {}: {e}", settings.landing_url))
            })?;
        let extractor = ContentExtractor::new(RetryFetch::new(fetcher, settings.max_retries), None);
        Ok(Self {
            extractor,
            parser,
            settings,
        })
    }

    /// Run until every link is processed or `shutdown` resolves.
    ///
    /// On shutdown the records gathered so far are returned with
    /// `interrupted` set.
    ///
    /// # Errors
    ///
    /// Fatal errors only: a malformed date filter (before any fetch), a
    /// landing page that cannot be fetched, or one with no announcements
    /// section.
    #[instrument(level = "info", skip_all, fields(url = %self.settings.landing_url))]
    pub async fn run_until<S>(&self, shutdown: S) -> Result<ScrapingResult, ScrapeError>
    where
        S: Future<Output = ()>,
    {
        let t0 = Instant::now();
        let date_filter = self.settings.date_filter.as_deref();
        if let Some(filter) = date_filter {
            YearMonth::parse(filter)?;
        }

        info!("Fetching landing page");
        let markup = self
            .extractor
            .fetcher()
            .fetch(&self.settings.landing_url, None)
            .await
            .inspect_err(|e| error!(error = %e, "Landing page fetch failed"))?;
        let links = self.parser.parse_landing_page(&markup)?;
        let links_found = links.len();
        if links.is_empty() {
            warn!("No announcement links found on landing page");
        }

        let links = filter_by_date(links, date_filter)?;
        let total = links.len();
        info!(links_found, selected = total, "Starting content extraction");

        let mut result = ScrapingResult {
            links_found,
            ..Default::default()
        };
        let delay = self.settings.rate_limit_delay;
        tokio::pin!(shutdown);

        for (i, link) in links.iter().enumerate() {
            let n = i + 1;
            info!(index = n, total, title = %link.title, "Processing announcement");

            let outcome = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    warn!(processed = i, total, "Interrupted; keeping records gathered so far");
                    result.interrupted = true;
                    break;
                }
                outcome = self.extractor.extract(&link.url, link.publication_date) => outcome,
            };

            match outcome {
                Ok(content) => result.successful_extractions.push(content),
                Err(e) => {
                    error!(url = %link.url, kind = e.kind(), error = %e, "Extraction failed");
                    result.failed_extractions.push(FailedExtraction {
                        url: link.url.clone(),
                        error_message: e.to_string(),
                        error_kind: e.kind().to_string(),
                        timestamp: Local::now().naive_local(),
                    });
                }
            }
            result.total_processed = n;

            if n % PROGRESS_EVERY == 0 || n == total {
                info!(
                    processed = n,
                    total,
                    percent = %format!("{:.1}", n as f64 / total as f64 * 100.0),
                    succeeded = result.successful_extractions.len(),
                    failed = result.failed_extractions.len(),
                    "Progress"
                );
            }

            if n < total && !delay.is_zero() {
                debug!(?delay, "Rate limiting before next request");
                tokio::select! {
                    biased;
                    _ = &mut shutdown => {
                        warn!(processed = n, total, "Interrupted; keeping records gathered so far");
                        result.interrupted = true;
                        break;
                    }
                    _ = sleep(delay) => {}
                }
            }
        }

        result.execution_time = t0.elapsed();
        info!(
            succeeded = result.successful_extractions.len(),
            failed = result.failed_extractions.len(),
            "Content extraction complete"
        );
        Ok(result)
    }
}

/// Log the end-of-run summary.
pub fn log_summary(
    result: &ScrapingResult,
    date_filter: Option<&str>,
    language: Language,
    output: Option<&Path>,
) {
    info!(
        links_found = result.links_found,
        processed = result.total_processed,
        succeeded = result.successful_extractions.len(),
        failed = result.failed_extractions.len(),
        success_rate = %format!("{:.1}%", result.success_rate()),
        elapsed = ?result.execution_time,
        filter = date_filter.unwrap_or("none"),
        %language,
        output = %output.map(|p| p.display().to_string()).unwrap_or_else(|| "not written".into()),
        interrupted = result.interrupted,
        "Run summary"
    );

    for failure in result.failed_extractions.iter().take(SUMMARY_FAILURES_SHOWN) {
        warn!(
            url = %failure.url,
            kind = %failure.error_kind,
            error = %truncate_for_log(&failure.error_message, 200),
            "Failed link"
        );
    }
    let remaining = result
        .failed_extractions
        .len()
        .saturating_sub(SUMMARY_FAILURES_SHOWN);
    if remaining > 0 {
        warn!(remaining, "More failed links not shown");
    }
}
