//! Output generation for a finished run.
//!
//! One file is written per run, in the configured format:
//!
//! - [`json`]: announcements, summary, optional metadata and failures
//! - [`csv`]: one row per announcement
//! - [`text`]: a plain-text report
//! - [`html`]: a self-contained HTML report
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── aws_announcements_20260115_093000.json
//! └── aws_announcements_20260201_080000.html
//! ```
//!
//! Duplicate handling runs before rendering and only sees the records of the
//! current call.

pub mod csv;
pub mod html;
pub mod json;
pub mod text;

use crate::config::{DuplicatePolicy, OutputFormat, ScraperConfig};
use crate::models::{AnnouncementContent, ScrapingResult};
use chrono::{Local, NaiveDateTime};
use itertools::Itertools;
use std::collections::HashMap;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, error, info, instrument};

/// Where and how to store a run.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreOptions {
    pub directory: PathBuf,
    pub filename_template: String,
    pub format: OutputFormat,
    pub include_metadata: bool,
    pub duplicate_handling: DuplicatePolicy,
    /// Echoed into the metadata block.
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub date_filter: Option<String>,
}

impl From<&ScraperConfig> for StoreOptions {
    fn from(config: &ScraperConfig) -> Self {
        Self {
            directory: config.output.directory.clone(),
            filename_template: config.output.filename_template.clone(),
            format: config.output.format,
            include_metadata: config.output.include_metadata,
            duplicate_handling: config.filtering.duplicate_handling,
            timeout_secs: config.http.timeout,
            max_retries: config.http.max_retries,
            date_filter: config.filtering.date_filter.clone(),
        }
    }
}

impl StoreOptions {
    /// Output path for a run stored at `now`.
    pub fn output_path(&self, now: NaiveDateTime) -> PathBuf {
        let stamp = now.format("%Y%m%d_%H%M%S").to_string();
        let stem = self.filename_template.replace("{timestamp}", &stamp);
        self.directory
            .join(format!("{stem}.{}", self.format.extension()))
    }
}

/// Apply the duplicate policy to successful extractions, keeping order.
pub fn apply_duplicate_policy(
    records: &[AnnouncementContent],
    policy: DuplicatePolicy,
) -> Vec<AnnouncementContent> {
    match policy {
        DuplicatePolicy::Skip => records
            .iter()
            .unique_by(|r| r.url.clone())
            .cloned()
            .collect(),
        DuplicatePolicy::Overwrite => records.to_vec(),
        DuplicatePolicy::Version => {
            let mut seen: HashMap<&str, usize> = HashMap::new();
            records
                .iter()
                .map(|r| {
                    let count = seen.entry(r.url.as_str()).or_insert(0);
                    *count += 1;
                    let mut record = r.clone();
                    if *count > 1 {
                        record.title = format!("{} (v{})", r.title, count);
                    }
                    record
                })
                .collect()
        }
    }
}

/// Render `result` in the configured format and write it.
///
/// # Returns
///
/// The path of the written file.
#[instrument(level = "info", skip_all, fields(dir = %opts.directory.display(), format = %opts.format))]
pub async fn store_result(
    result: &ScrapingResult,
    opts: &StoreOptions,
) -> Result<PathBuf, Box<dyn Error>> {
    let now = Local::now().naive_local();
    let records = apply_duplicate_policy(&result.successful_extractions, opts.duplicate_handling);
    debug!(
        before = result.successful_extractions.len(),
        after = records.len(),
        policy = %opts.duplicate_handling,
        "Applied duplicate handling"
    );

    let rendered = match opts.format {
        OutputFormat::Json => json::render(&records, result, opts, now)?,
        OutputFormat::Csv => csv::render(&records, result, opts),
        OutputFormat::Txt => text::render(&records, result, opts, now),
        OutputFormat::Html => html::render(&records, result, opts, now),
    };

    if let Err(e) = fs::create_dir_all(&opts.directory).await {
        error!(error = %e, "Failed to create output directory");
        return Err(e.into());
    }
    let path = opts.output_path(now);
    info!(path = %path.display(), records = records.len(), "Writing output");
    fs::write(&path, rendered).await?;
    info!(path = %path.display(), "Wrote output file");
    Ok(path)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::models::{EmbeddedLink, FailedExtraction};
    use chrono::NaiveDate;
    use std::time::Duration;

    pub fn ts(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 15)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    pub fn record(title: &str, url: &str) -> AnnouncementContent {
        AnnouncementContent {
            title: title.to_string(),
            url: url.to_string(),
            publication_date: ts(0),
            content_text: format!("{title} body, with \"quotes\" & <markup>.\nSecond line."),
            embedded_links: vec![EmbeddedLink {
                text: "Pricing".to_string(),
                url: "https://www.amazonaws.cn/en/pricing/".to_string(),
                context: "See Pricing for details.".to_string(),
            }],
            extraction_timestamp: ts(9),
        }
    }

    pub fn result(records: Vec<AnnouncementContent>) -> ScrapingResult {
        ScrapingResult {
            total_processed: records.len() + 1,
            links_found: records.len() + 3,
            successful_extractions: records,
            failed_extractions: vec![FailedExtraction {
                url: "https://www.amazonaws.cn/en/new/broken/".to_string(),
                error_message: "HTTP status 404 while fetching".to_string(),
                error_kind: "TransportError".to_string(),
                timestamp: ts(10),
            }],
            execution_time: Duration::from_millis(12_500),
            interrupted: false,
        }
    }

    pub fn options(dir: PathBuf, format: OutputFormat) -> StoreOptions {
        StoreOptions {
            directory: dir,
            filename_template: "aws_announcements_{timestamp}".to_string(),
            format,
            include_metadata: true,
            duplicate_handling: DuplicatePolicy::Skip,
            timeout_secs: 300,
            max_retries: 3,
            date_filter: Some("2026-01".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_duplicate_policies() {
        let records = vec![
            record("First", "https://a/1"),
            record("Second", "https://a/2"),
            record("First again", "https://a/1"),
            record("First thrice", "https://a/1"),
        ];

        let skipped = apply_duplicate_policy(&records, DuplicatePolicy::Skip);
        let titles: Vec<_> = skipped.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second"]);

        assert_eq!(apply_duplicate_policy(&records, DuplicatePolicy::Overwrite), records);

        let versioned = apply_duplicate_policy(&records, DuplicatePolicy::Version);
        let titles: Vec<_> = versioned.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["First", "Second", "First again (v2)", "First thrice (v3)"]
        );
    }

    #[test]
    fn test_output_path_expands_timestamp() {
        let opts = options(PathBuf::from("/tmp/out"), OutputFormat::Csv);
        assert_eq!(
            opts.output_path(ts(9)),
            PathBuf::from("/tmp/out/aws_announcements_20260115_090000.csv")
        );
    }

    #[tokio::test]
    async fn test_store_result_writes_each_format() {
        let tmp = TempDir::new().unwrap();
        let result = result(vec![record("Amazon EC2 launch", "https://a/1")]);
        for format in [
            OutputFormat::Json,
            OutputFormat::Csv,
            OutputFormat::Txt,
            OutputFormat::Html,
        ] {
            let opts = options(tmp.path().join("nested"), format);
            let path = store_result(&result, &opts).await.unwrap();
            assert_eq!(
                path.extension().and_then(|e| e.to_str()),
                Some(format.extension())
            );
            let body = std::fs::read_to_string(&path).unwrap();
            assert!(body.contains("Amazon EC2 launch"), "{format}");
        }
    }
}
