//! Plain-text report.

use super::StoreOptions;
use crate::models::{AnnouncementContent, ScrapingResult};
use chrono::NaiveDateTime;
use std::fmt::Write;

const STAMP: &str = "%Y-%m-%d %H:%M:%S";

pub fn render(
    records: &[AnnouncementContent],
    result: &ScrapingResult,
    opts: &StoreOptions,
    generated_at: NaiveDateTime,
) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, records, result, opts, generated_at);
    out
}

fn write_report(
    out: &mut String,
    records: &[AnnouncementContent],
    result: &ScrapingResult,
    opts: &StoreOptions,
    generated_at: NaiveDateTime,
) -> std::fmt::Result {
    if opts.include_metadata {
        writeln!(out, "AWS Announcements Scraping Results")?;
        writeln!(out, "{}\n", "=".repeat(40))?;
        writeln!(out, "Extraction Date: {}", generated_at.format(STAMP))?;
        writeln!(out, "Links Found: {}", result.links_found)?;
        writeln!(out, "Total Processed: {}", result.total_processed)?;
        writeln!(out, "Successful Extractions: {}", records.len())?;
        writeln!(out, "Failed Extractions: {}", result.failed_extractions.len())?;
        writeln!(
            out,
            "Execution Time: {:.2} seconds",
            result.execution_time.as_secs_f64()
        )?;
        if let Some(filter) = &opts.date_filter {
            writeln!(out, "Date Filter: {filter}")?;
        }
        if result.interrupted {
            writeln!(out, "Interrupted: yes")?;
        }
        writeln!(out, "Duplicate Handling: {}\n", opts.duplicate_handling)?;
    }

    for (i, r) in records.iter().enumerate() {
        writeln!(out, "Announcement {}", i + 1)?;
        writeln!(out, "{}", "-".repeat(20))?;
        writeln!(out, "Title: {}", r.title)?;
        writeln!(out, "URL: {}", r.url)?;
        writeln!(out, "Publication Date: {}", r.publication_date.format(STAMP))?;
        writeln!(out, "Extraction Time: {}", r.extraction_timestamp.format(STAMP))?;
        writeln!(out, "\nContent:\n{}", r.content_text)?;

        if !r.embedded_links.is_empty() {
            writeln!(out, "\nEmbedded Links ({}):", r.embedded_links.len())?;
            for (j, link) in r.embedded_links.iter().enumerate() {
                writeln!(out, "  {}. {} -> {}", j + 1, link.text, link.url)?;
                if !link.context.is_empty() {
                    writeln!(out, "     Context: {}", link.context)?;
                }
            }
        }
        writeln!(out, "\n{}\n", "=".repeat(60))?;
    }

    if opts.include_metadata && !result.failed_extractions.is_empty() {
        writeln!(out, "Failed Extractions")?;
        writeln!(out, "{}\n", "=".repeat(20))?;
        for f in &result.failed_extractions {
            writeln!(out, "URL: {}", f.url)?;
            writeln!(out, "Error: {}", f.error_message)?;
            writeln!(out, "Type: {}", f.error_kind)?;
            writeln!(out, "Time: {}\n", f.timestamp.format(STAMP))?;
        }
    }
    Ok(())
}
