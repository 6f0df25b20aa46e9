//! Announcement entries embedded as JSON fragments in landing-page markup.
//!
//! The landing page ships its entries as JSON inside script payloads. Rather
//! than modelling the whole payload, this module finds regex hits for the
//! marker field names and widens each hit by brace matching to the smallest
//! enclosing JSON object, which is then parsed with `serde_json`.
//!
//! Everything here sits behind [`try_extract_structured_links`], so a proper
//! streaming scanner can replace it without touching callers.

use crate::models::AnnouncementLink;
use chrono::NaiveDate;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use super::dom::truncate_with_ellipsis;

pub const TITLE_MARKER: &str = "\"itemTitle\"";
pub const LINK_MARKER: &str = "\"itemLink\"";

const TITLE_KEYS: [&str; 3] = ["itemTitle", "title", "heading"];
const URL_KEYS: [&str; 3] = ["itemLink", "url", "linkURL"];
const PREVIEW_KEYS: [&str; 3] = ["itemBody", "body", "subheading"];
const DATE_KEYS: [&str; 3] = ["itemMetadataDate", "publishedDate", "date"];

const PREVIEW_MAX_CHARS: usize = 200;

/// Hits inside a single entry: a `"fields": {...}` wrapper, or a flat object.
static ENTRY_PATTERNS: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r#"(?s)"fields":\s*\{[^}]*"itemTitle":[^}]+\}"#).unwrap(),
        Regex::new(r#"(?s)\{[^}]*"itemTitle":[^}]*"itemBody":[^}]*"itemLink":[^}]*\}"#).unwrap(),
    ]
});
static ITEMS_ARRAY: Lazy<Regex> = Lazy::new(|| Regex::new(r#""items"\s*:\s*\["#).unwrap());
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static ISO_DATE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d{4}-\d{2}-\d{2})").unwrap());

/// Whether the markup carries the structured-data marker fields.
pub fn has_structured_markers(markup: &str) -> bool {
    markup.contains(TITLE_MARKER) && markup.contains(LINK_MARKER)
}

/// Extract announcement links from embedded JSON, or an empty vector.
///
/// Entry objects are tried first; if none yields a link, the first
/// `"items": [...]` container that does is used instead. Relative URLs are
/// resolved against `base`. The result is de-duplicated by URL, keeping the
/// first occurrence.
#[instrument(level = "debug", skip_all, fields(bytes = markup.len()))]
pub fn try_extract_structured_links(markup: &str, base: &Url) -> Vec<AnnouncementLink> {
    if !has_structured_markers(markup) {
        return Vec::new();
    }

    let mut links: Vec<AnnouncementLink> = ENTRY_PATTERNS
        .iter()
        .flat_map(|pattern| pattern.find_iter(markup))
        .filter_map(|hit| enclosing_object(markup, hit.start()))
        .filter_map(|json| match serde_json::from_str::<Value>(json) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(error = %e, "Entry fragment is not valid JSON");
                None
            }
        })
        .filter_map(|value| parse_entry(&value, base))
        .collect();

    if links.is_empty() {
        debug!("No entry objects parsed; scanning for an items container");
        links = extract_from_items_container(markup, base);
    }

    let before = links.len();
    let unique: Vec<AnnouncementLink> = links.into_iter().unique_by(|l| l.url.clone()).collect();
    debug!(found = before, unique = unique.len(), "Structured extraction finished");
    unique
}

fn extract_from_items_container(markup: &str, base: &Url) -> Vec<AnnouncementLink> {
    for hit in ITEMS_ARRAY.find_iter(markup) {
        let Some(json) = enclosing_object(markup, hit.start()) else {
            continue;
        };
        if !json.contains(TITLE_MARKER) {
            continue;
        }
        let value: Value = match serde_json::from_str(json) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "Items container is not valid JSON");
                continue;
            }
        };
        let items = value
            .get("items")
            .or_else(|| value.get("data").and_then(|d| d.get("items")))
            .and_then(Value::as_array);
        let Some(items) = items else { continue };

        let links: Vec<_> = items.iter().filter_map(|item| parse_entry(item, base)).collect();
        if !links.is_empty() {
            return links;
        }
    }
    Vec::new()
}

/// Map one JSON entry to a link. Entries without title or URL yield `None`.
fn parse_entry(value: &Value, base: &Url) -> Option<AnnouncementLink> {
    let fields = value
        .get("fields")
        .filter(|f| f.is_object())
        .unwrap_or(value);

    let title = first_str(fields, &TITLE_KEYS)?;
    let raw_url = first_str(fields, &URL_KEYS)?;
    let url = resolve(base, raw_url)?;

    let preview_text = first_str(fields, &PREVIEW_KEYS)
        .map(|body| HTML_TAG.replace_all(body, "").trim().to_string())
        .filter(|p| !p.is_empty())
        .map(|p| truncate_with_ellipsis(&p, PREVIEW_MAX_CHARS));

    let publication_date = first_str(fields, &DATE_KEYS).and_then(|raw| {
        let day = ISO_DATE_PREFIX.captures(raw)?;
        match NaiveDate::parse_from_str(&day[1], "%Y-%m-%d") {
            Ok(d) => d.and_hms_opt(0, 0, 0),
            Err(e) => {
                debug!(raw, error = %e, "Unparsable entry date");
                None
            }
        }
    });

    Some(AnnouncementLink {
        title: title.to_string(),
        url,
        preview_text,
        publication_date,
    })
}

/// First non-blank string value among `keys`, trimmed.
fn first_str<'v>(fields: &'v Value, keys: &[&str]) -> Option<&'v str> {
    keys.iter()
        .filter_map(|k| fields.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    match Url::parse(href) {
        Ok(abs) => Some(abs.to_string()),
        Err(_) => base.join(href).ok().map(|u| u.to_string()),
    }
}

/// Smallest `{...}` enclosing byte offset `pos`.
///
/// Scans backwards for the unbalanced opening brace, then forwards for its
/// matching close.
fn enclosing_object(text: &str, pos: usize) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut open = None;
    for i in (0..=pos.min(bytes.len().checked_sub(1)?)).rev() {
        match bytes[i] {
            b'}' => depth += 1,
            b'{' if depth == 0 => {
                open = Some(i);
                break;
            }
            b'{' => depth -= 1,
            _ => {}
        }
    }
    let open = open?;
    let close = matching_close(bytes, open)?;
    Some(&text[open..=close])
}

/// Offset of the bracket closing the one at `open`, skipping string contents.
fn matching_close(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
