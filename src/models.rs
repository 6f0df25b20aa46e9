//! Data models for discovered links, extracted announcements and run results.
//!
//! This module defines the value objects passed between pipeline stages:
//! - [`AnnouncementLink`]: an entry found on the landing page
//! - [`AnnouncementContent`]: the structured record extracted from a detail page
//! - [`EmbeddedLink`]: a hyperlink found inside an announcement body
//! - [`FailedExtraction`]: one link whose retrieval or parsing failed
//! - [`ScrapingResult`]: the aggregate of a single run
//!
//! None of them hold back-references; the orchestrator owns the lists.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A link to an announcement found on the landing page.
///
/// The URL is absolute and is the uniqueness key during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AnnouncementLink {
    /// Title shown for the entry on the landing page.
    pub title: String,
    /// Absolute URL of the detail page.
    pub url: String,
    /// Teaser text shown next to the entry, if any.
    pub preview_text: Option<String>,
    /// Publication date, when the landing page carries one.
    pub publication_date: Option<NaiveDateTime>,
}

/// A hyperlink found within announcement content.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EmbeddedLink {
    /// Anchor text, or the href when the anchor has no text.
    pub text: String,
    /// Absolute URL, resolved against the detail page.
    pub url: String,
    /// Text of the anchor's parent element, at most 200 chars plus `...`.
    pub context: String,
}

/// The full content extracted from an announcement detail page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AnnouncementContent {
    pub title: String,
    pub url: String,
    /// Always resolved; falls back to the extraction time.
    pub publication_date: NaiveDateTime,
    /// Flattened body text. Never empty.
    pub content_text: String,
    pub embedded_links: Vec<EmbeddedLink>,
    pub extraction_timestamp: NaiveDateTime,
}

/// A link whose retrieval or parsing failed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FailedExtraction {
    pub url: String,
    pub error_message: String,
    /// Name of the error variant, e.g. `TransportError` or `ParseError`.
    pub error_kind: String,
    pub timestamp: NaiveDateTime,
}

/// The complete result of one scraping run.
#[derive(Debug, Clone, Default)]
pub struct ScrapingResult {
    pub successful_extractions: Vec<AnnouncementContent>,
    pub failed_extractions: Vec<FailedExtraction>,
    /// Links found on the landing page before date filtering.
    pub links_found: usize,
    /// Links that went through content extraction.
    pub total_processed: usize,
    pub execution_time: Duration,
    /// True when the run was cut short (Ctrl-C) before every link was processed.
    pub interrupted: bool,
}

impl ScrapingResult {
    /// Percentage of processed links that produced content.
    pub fn success_rate(&self) -> f64 {
        let denom = self.total_processed.max(1) as f64;
        self.successful_extractions.len() as f64 / denom * 100.0
    }

    /// A run is a total failure when links were processed and none succeeded.
    pub fn is_total_failure(&self) -> bool {
        self.successful_extractions.is_empty() && !self.failed_extractions.is_empty()
    }
}
