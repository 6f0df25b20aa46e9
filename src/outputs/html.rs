//! Self-contained HTML report.
//!
//! Every piece of scraped text is escaped with `quick_xml::escape::escape`
//! before it is interpolated.

use super::StoreOptions;
use crate::models::{AnnouncementContent, EmbeddedLink, FailedExtraction, ScrapingResult};
use chrono::NaiveDateTime;
use quick_xml::escape::escape;
use std::fmt::Write;

const STAMP: &str = "%Y-%m-%d %H:%M:%S";

const STYLE: &str = r#"
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; max-width: 1200px; margin: 0 auto; padding: 20px; background: #f5f5f5; }
        .header { background: linear-gradient(135deg, #232f3e, #ff9900); color: white; padding: 30px; border-radius: 10px; margin-bottom: 30px; text-align: center; }
        .header h1 { margin: 0; font-weight: 300; }
        .summary, .announcement, .failures, .metadata { background: white; padding: 20px; border-radius: 8px; margin-bottom: 30px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }
        .stats { display: grid; grid-template-columns: repeat(auto-fit, minmax(180px, 1fr)); gap: 15px; }
        .stat-item { background: #f8f9fa; padding: 15px; border-radius: 5px; text-align: center; border-left: 4px solid #ff9900; }
        .stat-value { font-size: 1.8em; font-weight: bold; color: #232f3e; }
        .stat-label { color: #666; font-size: 0.9em; }
        .announcement h2 { margin-top: 0; color: #232f3e; }
        .meta { color: #666; font-size: 0.9em; }
        .content { white-space: pre-wrap; }
        .links li { margin-bottom: 8px; }
        .context { color: #666; font-size: 0.85em; display: block; }
        .failure { border-left: 4px solid #d13212; padding-left: 10px; margin-bottom: 12px; }
"#;

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
    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, "<html lang=\"en\">\n<head>")?;
    writeln!(out, "    <meta charset=\"UTF-8\">")?;
    writeln!(
        out,
        "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">"
    )?;
    writeln!(out, "    <title>AWS Announcements Scraping Results</title>")?;
    writeln!(out, "    <style>{STYLE}    </style>\n</head>\n<body>")?;

    writeln!(out, "<div class=\"header\">")?;
    writeln!(out, "    <h1>AWS Announcements</h1>")?;
    writeln!(out, "    <p>Generated {}</p>", generated_at.format(STAMP))?;
    writeln!(out, "</div>")?;

    writeln!(out, "<div class=\"summary\">\n    <h2>Summary</h2>\n    <div class=\"stats\">")?;
    let stats = [
        ("Links Found", result.links_found.to_string()),
        ("Processed", result.total_processed.to_string()),
        ("Successful", records.len().to_string()),
        ("Failed", result.failed_extractions.len().to_string()),
        (
            "Execution Time",
            format!("{:.1}s", result.execution_time.as_secs_f64()),
        ),
    ];
    for (label, value) in stats {
        writeln!(
            out,
            "        <div class=\"stat-item\"><div class=\"stat-value\">{value}</div><div class=\"stat-label\">{label}</div></div>"
        )?;
    }
    writeln!(out, "    </div>")?;
    if result.interrupted {
        writeln!(out, "    <p><strong>Run was interrupted before all links were processed.</strong></p>")?;
    }
    writeln!(out, "</div>")?;

    for r in records {
        write_announcement(out, r)?;
    }

    if opts.include_metadata {
        writeln!(out, "<div class=\"metadata\">\n    <h2>Metadata</h2>\n    <ul>")?;
        writeln!(out, "        <li>Scraper version: {}</li>", env!("CARGO_PKG_VERSION"))?;
        writeln!(out, "        <li>Duplicate handling: {}</li>", opts.duplicate_handling)?;
        writeln!(out, "        <li>Timeout: {}s</li>", opts.timeout_secs)?;
        writeln!(out, "        <li>Max retries: {}</li>", opts.max_retries)?;
        writeln!(
            out,
            "        <li>Date filter: {}</li>",
            escape(opts.date_filter.as_deref().unwrap_or("none"))
        )?;
        writeln!(out, "    </ul>\n</div>")?;

        if !result.failed_extractions.is_empty() {
            writeln!(out, "<div class=\"failures\">\n    <h2>Failed Extractions</h2>")?;
            for f in &result.failed_extractions {
                write_failure(out, f)?;
            }
            writeln!(out, "</div>")?;
        }
    }

    writeln!(out, "</body>\n</html>")
}

fn write_announcement(out: &mut String, r: &AnnouncementContent) -> std::fmt::Result {
    writeln!(out, "<div class=\"announcement\">")?;
    writeln!(out, "    <h2>{}</h2>", escape(r.title.as_str()))?;
    writeln!(
        out,
        "    <p class=\"meta\"><a href=\"{url}\">{url}</a><br>Published {} &middot; extracted {}</p>",
        r.publication_date.format(STAMP),
        r.extraction_timestamp.format(STAMP),
        url = escape(r.url.as_str()),
    )?;
    writeln!(out, "    <div class=\"content\">{}</div>", escape(r.content_text.as_str()))?;
    if !r.embedded_links.is_empty() {
        writeln!(out, "    <h3>Embedded Links ({})</h3>\n    <ul class=\"links\">", r.embedded_links.len())?;
        for link in &r.embedded_links {
            write_link(out, link)?;
        }
        writeln!(out, "    </ul>")?;
    }
    writeln!(out, "</div>")
}

fn write_link(out: &mut String, link: &EmbeddedLink) -> std::fmt::Result {
    write!(
        out,
        "        <li><a href=\"{}\">{}</a>",
        escape(link.url.as_str()),
        escape(link.text.as_str())
    )?;
    if !link.context.is_empty() {
        write!(out, "<span class=\"context\">{}</span>", escape(link.context.as_str()))?;
    }
    writeln!(out, "</li>")
}

fn write_failure(out: &mut String, f: &FailedExtraction) -> std::fmt::Result {
    writeln!(
        out,
        "    <div class=\"failure\"><strong>{}</strong><br>{}: {}<br><span class=\"meta\">{}</span></div>",
        escape(f.url.as_str()),
        escape(f.error_kind.as_str()),
        escape(f.error_message.as_str()),
        f.timestamp.format(STAMP)
    )
}
