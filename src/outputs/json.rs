//! JSON output.
//!
//! ```text
//! {
//!   "announcements": [...],
//!   "summary": {...},
//!   "metadata": {...},            // include_metadata only
//!   "failed_extractions": [...]   // include_metadata and failures only
//! }
//! ```
//!
//! Dates are ISO 8601 without offset, as produced by `chrono`'s serde support.

use super::StoreOptions;
use crate::config::{DuplicatePolicy, OutputFormat};
use crate::models::{AnnouncementContent, FailedExtraction, ScrapingResult};
use chrono::NaiveDateTime;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Report<'a> {
    announcements: &'a [AnnouncementContent],
    summary: Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Metadata<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failed_extractions: Option<&'a [FailedExtraction]>,
}

#[derive(Debug, Serialize)]
struct Summary {
    links_found: usize,
    total_processed: usize,
    successful_extractions: usize,
    failed_extractions: usize,
    /// Seconds.
    execution_time: f64,
    interrupted: bool,
}

#[derive(Debug, Serialize)]
struct Metadata<'a> {
    extraction_timestamp: NaiveDateTime,
    scraper_version: &'static str,
    output_format: OutputFormat,
    duplicate_handling: DuplicatePolicy,
    configuration: ConfigExcerpt<'a>,
}

#[derive(Debug, Serialize)]
struct ConfigExcerpt<'a> {
    timeout: u64,
    max_retries: u32,
    date_filter: Option<&'a str>,
}

/// Serialize a run as pretty-printed JSON.
pub fn render(
    records: &[AnnouncementContent],
    result: &ScrapingResult,
    opts: &StoreOptions,
    generated_at: NaiveDateTime,
) -> serde_json::Result<String> {
    let metadata = opts.include_metadata.then(|| Metadata {
        extraction_timestamp: generated_at,
        scraper_version: env!("CARGO_PKG_VERSION"),
        output_format: opts.format,
        duplicate_handling: opts.duplicate_handling,
        configuration: ConfigExcerpt {
            timeout: opts.timeout_secs,
            max_retries: opts.max_retries,
            date_filter: opts.date_filter.as_deref(),
        },
    });
    let failed = (opts.include_metadata && !result.failed_extractions.is_empty())
        .then_some(result.failed_extractions.as_slice());

    let report = Report {
        announcements: records,
        summary: Summary {
            links_found: result.links_found,
            total_processed: result.total_processed,
            successful_extractions: records.len(),
            failed_extractions: result.failed_extractions.len(),
            execution_time: result.execution_time.as_secs_f64(),
            interrupted: result.interrupted,
        },
        metadata,
        failed_extractions: failed,
    };
    serde_json::to_string_pretty(&report)
}
