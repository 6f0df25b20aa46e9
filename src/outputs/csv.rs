//! CSV output, one row per announcement.
//!
//! Fields are quoted per RFC 4180 when they contain a comma, a quote or a
//! line break; rows end with CRLF.

use super::StoreOptions;
use crate::models::{AnnouncementContent, ScrapingResult};

const HEADER: [&str; 6] = [
    "title",
    "url",
    "publication_date",
    "content_text",
    "embedded_links_count",
    "extraction_timestamp",
];
const METADATA_HEADER: [&str; 2] = ["total_processed", "execution_time"];

const ISO: &str = "%Y-%m-%dT%H:%M:%S";

pub fn render(records: &[AnnouncementContent], result: &ScrapingResult, opts: &StoreOptions) -> String {
    let mut out = String::new();

    let mut header: Vec<&str> = HEADER.to_vec();
    if opts.include_metadata {
        header.extend(METADATA_HEADER);
    }
    push_row(&mut out, header.into_iter().map(str::to_string));

    for r in records {
        let mut row = vec![
            r.title.clone(),
            r.url.clone(),
            r.publication_date.format(ISO).to_string(),
            r.content_text.clone(),
            r.embedded_links.len().to_string(),
            r.extraction_timestamp.format(ISO).to_string(),
        ];
        if opts.include_metadata {
            row.push(result.total_processed.to_string());
            row.push(format!("{:.3}", result.execution_time.as_secs_f64()));
        }
        push_row(&mut out, row.into_iter());
    }
    out
}

fn push_row(out: &mut String, fields: impl Iterator<Item = String>) {
    let line = fields.map(|f| quote(&f)).collect::<Vec<_>>().join(",");
    out.push_str(&line);
    out.push_str("\r\n");
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
