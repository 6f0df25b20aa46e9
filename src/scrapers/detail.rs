//! Detail-page content extraction.
//!
//! Each field is resolved by an ordered list of candidate functions over the
//! parsed document; the first candidate producing a value wins. Adding a
//! strategy means adding an entry to the relevant list.
//!
//! | Field | Candidates, in order |
//! |-------|----------------------|
//! | title | `h1`, title-class selectors, `<title>` |
//! | date | JSON-LD, `time[datetime]`, date-class selectors, text scan |
//! | body | content selectors, largest text block |

use crate::error::ScrapeError;
use crate::models::{AnnouncementContent, EmbeddedLink};
use crate::retrieval::PageFetch;
use chrono::{Local, NaiveDateTime};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::cmp::Reverse;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::dates::{parse_date_string, scan_text_for_date};
use super::dom::{compact_text, flatten_text, select_one, selector, text_len, truncate_with_ellipsis};

const MIN_TITLE_CHARS: usize = 5;
const MIN_CONTENT_CHARS: usize = 50;
const MIN_BLOCK_CHARS: usize = 100;
const CONTEXT_MAX_CHARS: usize = 200;

const LD_DATE_KEYS: [&str; 3] = ["datePublished", "dateCreated", "dateModified"];

static H1: Lazy<Selector> = Lazy::new(|| selector("h1"));
static TITLE_CLASSES: Lazy<Vec<Selector>> = Lazy::new(|| {
    [".announcement-title", ".post-title", ".article-title"]
        .into_iter()
        .map(selector)
        .collect()
});
static DOC_TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));

static LD_JSON: Lazy<Selector> = Lazy::new(|| selector(r#"script[type="application/ld+json"]"#));
static TIME_DATETIME: Lazy<Selector> = Lazy::new(|| selector("time[datetime]"));
static DATE_CLASSES: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        ".publication-date",
        ".post-date",
        ".article-date",
        ".date",
        "time[datetime]",
        ".published",
    ]
    .into_iter()
    .map(selector)
    .collect()
});

static CONTENT_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "article",
        ".announcement-content",
        ".post-content",
        ".article-content",
        ".content",
        "main",
        "#content",
        ".main-content",
    ]
    .into_iter()
    .map(selector)
    .collect()
});
static BLOCKS: Lazy<Selector> = Lazy::new(|| selector("div, section, article"));
static ANCHOR_WITH_HREF: Lazy<Selector> = Lazy::new(|| selector("a[href]"));

type TitleCandidate = fn(&Html) -> Option<String>;
type DateCandidate = fn(&Html) -> Option<NaiveDateTime>;
type BodyCandidate = for<'a> fn(&'a Html) -> Option<ElementRef<'a>>;

const TITLE_CANDIDATES: [(&str, TitleCandidate); 3] = [
    ("h1", title_from_heading as TitleCandidate),
    ("title classes", title_from_classes as TitleCandidate),
    ("document title", title_from_document as TitleCandidate),
];

const DATE_CANDIDATES: [(&str, DateCandidate); 4] = [
    ("json-ld", date_from_json_ld as DateCandidate),
    ("time element", date_from_time_element as DateCandidate),
    ("date classes", date_from_classes as DateCandidate),
    ("text scan", date_from_text as DateCandidate),
];

const BODY_CANDIDATES: [(&str, BodyCandidate); 2] = [
    ("content selectors", body_from_selectors as BodyCandidate),
    ("largest block", body_from_largest_block as BodyCandidate),
];

/// Fetches detail pages and turns them into [`AnnouncementContent`].
#[derive(Debug)]
pub struct ContentExtractor<F> {
    fetcher: F,
    timeout: Option<Duration>,
}

impl<F: PageFetch> ContentExtractor<F> {
    pub fn new(fetcher: F, timeout: Option<Duration>) -> Self {
        Self { fetcher, timeout }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Fetch `url` and extract its announcement.
    ///
    /// `supplied_date` (from the landing page) takes precedence over any
    /// date found on the page itself.
    ///
    /// # Errors
    ///
    /// [`ScrapeError::Transport`] when the page cannot be fetched, or
    /// [`ScrapeError::Parse`] when no title or body can be found.
    #[instrument(level = "info", skip_all, fields(%url))]
    pub async fn extract(
        &self,
        url: &str,
        supplied_date: Option<NaiveDateTime>,
    ) -> Result<AnnouncementContent, ScrapeError> {
        let markup = self.fetcher.fetch(url, self.timeout).await?;
        let content = parse_announcement_page(&markup, url, supplied_date)?;
        info!(
            title = %content.title,
            chars = content.content_text.chars().count(),
            links = content.embedded_links.len(),
            "Extracted announcement"
        );
        Ok(content)
    }
}

/// Extract an announcement from already fetched markup.
///
/// # Errors
///
/// [`ScrapeError::Parse`] when no title of more than five characters is
/// found, when no content container is found, or when the flattened body is
/// shorter than fifty characters.
pub fn parse_announcement_page(
    markup: &str,
    url: &str,
    supplied_date: Option<NaiveDateTime>,
) -> Result<AnnouncementContent, ScrapeError> {
    let document = Html::parse_document(markup);
    let extraction_timestamp = Local::now().naive_local();

    let title = TITLE_CANDIDATES
        .iter()
        .find_map(|(name, candidate)| {
            candidate(&document).inspect(|t| debug!(strategy = *name, title = %t, "Resolved title"))
        })
        .ok_or_else(|| ScrapeError::Parse(format!("no title found on {url}")))?;

    let publication_date = match supplied_date {
        Some(date) => date,
        None => DATE_CANDIDATES
            .iter()
            .find_map(|(name, candidate)| {
                candidate(&document).inspect(|d| debug!(strategy = *name, date = %d, "Resolved date"))
            })
            .unwrap_or_else(|| {
                warn!(%url, "No publication date found; using extraction time");
                extraction_timestamp
            }),
    };

    let body = BODY_CANDIDATES
        .iter()
        .find_map(|(name, candidate)| {
            candidate(&document).inspect(|_| debug!(strategy = *name, "Resolved content container"))
        })
        .ok_or_else(|| ScrapeError::Parse(format!("no content container on {url}")))?;

    let content_text = flatten_text(body);
    let chars = content_text.chars().count();
    if chars < MIN_CONTENT_CHARS {
        return Err(ScrapeError::Parse(format!(
            "content too short on {url} ({chars} chars)"
        )));
    }

    let embedded_links = match Url::parse(url) {
        Ok(page_url) => embedded_links(body, &page_url),
        Err(e) => {
            warn!(%url, error = %e, "Page URL does not parse; skipping embedded links");
            Vec::new()
        }
    };

    Ok(AnnouncementContent {
        title,
        url: url.to_string(),
        publication_date,
        content_text,
        embedded_links,
        extraction_timestamp,
    })
}

fn long_enough_title(el: ElementRef<'_>) -> Option<String> {
    let text = compact_text(el);
    (text.chars().count() > MIN_TITLE_CHARS).then_some(text)
}

fn title_from_heading(document: &Html) -> Option<String> {
    select_one(document, &H1).and_then(long_enough_title)
}

fn title_from_classes(document: &Html) -> Option<String> {
    TITLE_CLASSES
        .iter()
        .find_map(|sel| select_one(document, sel).and_then(long_enough_title))
}

fn title_from_document(document: &Html) -> Option<String> {
    select_one(document, &DOC_TITLE).and_then(long_enough_title)
}

fn date_from_json_ld(document: &Html) -> Option<NaiveDateTime> {
    document.select(&LD_JSON).find_map(|script| {
        let raw: String = script.text().collect();
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => ld_date(&value),
            Err(e) => {
                debug!(error = %e, "Skipping unparsable JSON-LD block");
                None
            }
        }
    })
}

/// Date from a JSON-LD value: objects, arrays of objects, and `@graph`.
fn ld_date(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Object(map) => LD_DATE_KEYS
            .iter()
            .filter_map(|k| map.get(*k).and_then(Value::as_str))
            .find_map(parse_date_string)
            .or_else(|| map.get("@graph").and_then(ld_date)),
        Value::Array(items) => items.iter().find_map(ld_date),
        _ => None,
    }
}

fn date_from_time_element(document: &Html) -> Option<NaiveDateTime> {
    document
        .select(&TIME_DATETIME)
        .filter_map(|el| el.value().attr("datetime"))
        .find_map(parse_date_string)
}

fn date_from_classes(document: &Html) -> Option<NaiveDateTime> {
    DATE_CLASSES.iter().find_map(|sel| {
        let el = select_one(document, sel)?;
        el.value()
            .attr("datetime")
            .and_then(parse_date_string)
            .or_else(|| parse_date_string(&compact_text(el)))
    })
}

fn date_from_text(document: &Html) -> Option<NaiveDateTime> {
    scan_text_for_date(&compact_text(document.root_element()))
}

fn body_from_selectors(document: &Html) -> Option<ElementRef<'_>> {
    CONTENT_SELECTORS
        .iter()
        .find_map(|sel| select_one(document, sel))
}

fn body_from_largest_block(document: &Html) -> Option<ElementRef<'_>> {
    document
        .select(&BLOCKS)
        .map(|el| (text_len(el), el))
        .filter(|(len, _)| *len > MIN_BLOCK_CHARS)
        // min_by_key keeps the first of equal keys
        .min_by_key(|(len, _)| Reverse(*len))
        .map(|(_, el)| el)
}

/// Hyperlinks inside the content container, resolved against the page URL.
fn embedded_links(body: ElementRef<'_>, page_url: &Url) -> Vec<EmbeddedLink> {
    body.select(&ANCHOR_WITH_HREF)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?.trim();
            if href.is_empty() || href.starts_with('#') {
                return None;
            }
            let url = match page_url.join(href) {
                Ok(u) => u.to_string(),
                Err(e) => {
                    warn!(href, error = %e, "Skipping unresolvable link");
                    return None;
                }
            };
            let text = Some(compact_text(anchor))
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| href.to_string());
            let context = anchor
                .parent()
                .and_then(ElementRef::wrap)
                .map(|parent| truncate_with_ellipsis(&compact_text(parent), CONTEXT_MAX_CHARS))
                .unwrap_or_default();
            Some(EmbeddedLink { text, url, context })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FailureKind, TransportError};
    use chrono::NaiveDate;

    const URL: &str = "https://www.amazonaws.cn/en/new/2026/ec2-instances/";
    const BODY: &str = "Amazon EC2 instances are now available in the Beijing and Ningxia regions with improved performance.";

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn page(head: &str, body: &str) -> String {
        format!("<html><head>{head}</head><body>{body}</body></html>")
    }

    #[test]
    fn test_time_element_date_and_title() {
        let html = page(
            "<title>Site title</title>",
            &format!(
                "<h1>New EC2 instances</h1><time datetime=\"2026-01-15T00:00:00Z\">Jan 15</time><article><p>{BODY}</p></article>"
            ),
        );
        let content = parse_announcement_page(&html, URL, None).unwrap();
        assert_eq!(content.title, "New EC2 instances");
        assert_eq!(content.publication_date, ymd(2026, 1, 15));
        assert_eq!(content.content_text, BODY);
        assert_eq!(content.url, URL);
    }

    #[test]
    fn test_supplied_date_wins() {
        let html = page(
            "",
            &format!("<h1>New EC2 instances</h1><time datetime=\"2026-01-15\"></time><article>{BODY}</article>"),
        );
        let content = parse_announcement_page(&html, URL, Some(ymd(2025, 12, 6))).unwrap();
        assert_eq!(content.publication_date, ymd(2025, 12, 6));
    }

    #[test]
    fn test_json_ld_graph_date() {
        let ld = r#"<script type="application/ld+json">{"@context":"https://schema.org","@graph":[{"@type":"WebPage"},{"@type":"Article","datePublished":"2026-03-02T08:00:00+08:00"}]}</script>"#;
        let html = page(ld, &format!("<h1>Graph dated page</h1><main>{BODY}</main>"));
        let content = parse_announcement_page(&html, URL, None).unwrap();
        assert_eq!(
            content.publication_date,
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap().and_hms_opt(8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_date_from_class_and_text_scan() {
        let html = page("", &format!("<h1>Class dated</h1><span class=\"date\">02/03/2026</span><article>{BODY}</article>"));
        assert_eq!(
            parse_announcement_page(&html, URL, None).unwrap().publication_date,
            ymd(2026, 2, 3)
        );

        let html = page("", &format!("<h1>Text dated</h1><article><p>Posted On: December 6, 2025</p><p>{BODY}</p></article>"));
        assert_eq!(
            parse_announcement_page(&html, URL, None).unwrap().publication_date,
            ymd(2025, 12, 6)
        );
    }

    #[test]
    fn test_missing_date_falls_back_to_extraction_time() {
        let html = page("", &format!("<h1>Undated page</h1><article>{BODY}</article>"));
        let content = parse_announcement_page(&html, URL, None).unwrap();
        assert_eq!(content.publication_date, content.extraction_timestamp);
    }

    #[test]
    fn test_short_heading_falls_through_to_document_title() {
        let html = page(
            "<title>Amazon S3 feature update</title>",
            &format!("<h1>Short</h1><article>{BODY}</article>"),
        );
        let content = parse_announcement_page(&html, URL, None).unwrap();
        assert_eq!(content.title, "Amazon S3 feature update");
    }

    #[test]
    fn test_title_class_beats_document_title() {
        let html = page(
            "<title>Generic site title</title>",
            &format!("<div class=\"post-title\">Post class title</div><article>{BODY}</article>"),
        );
        let content = parse_announcement_page(&html, URL, None).unwrap();
        assert_eq!(content.title, "Post class title");
    }

    #[test]
    fn test_no_title_is_a_parse_error() {
        let html = page("", &format!("<article>{BODY}</article>"));
        let err = parse_announcement_page(&html, URL, None).unwrap_err();
        assert_eq!(err.kind(), "ParseError");
    }

    #[test]
    fn test_short_body_is_a_parse_error() {
        let html = page("", "<h1>Valid heading</h1><article><p>Too short.</p></article>");
        let err = parse_announcement_page(&html, URL, None).unwrap_err();
        assert!(matches!(err, ScrapeError::Parse(_)));
    }

    #[test]
    fn test_largest_block_fallback() {
        let long = "Long paragraph text that describes the new capability in detail. ".repeat(3);
        let html = page(
            "",
            &format!("<h1>Fallback body</h1><div id=\"a\">tiny</div><div id=\"b\"><p>{long}</p></div>"),
        );
        let content = parse_announcement_page(&html, URL, None).unwrap();
        assert_eq!(content.content_text, long.trim());
    }

    #[test]
    fn test_embedded_links() {
        let context = format!("See the {} for details.", "x".repeat(220));
        let html = page(
            "",
            &format!(
                "<h1>Links page</h1><article><p>{BODY}</p>\
                 <p>Read <a href=\"/en/ec2/pricing/\">EC2 pricing</a> now.</p>\
                 <p><a href=\"https://docs.amazonaws.cn/ec2/\"></a></p>\
                 <p><a href=\"#\">skip</a><a href=\"#top\">skip</a><a href=\"\">skip</a></p>\
                 <p>{context}<a href=\"guide/\">guide</a></p></article>"
            ),
        );
        let content = parse_announcement_page(&html, URL, None).unwrap();
        let links = &content.embedded_links;
        assert_eq!(links.len(), 3);
        assert_eq!(links[0].text, "EC2 pricing");
        assert_eq!(links[0].url, "https://www.amazonaws.cn/en/ec2/pricing/");
        assert_eq!(links[0].context, "Read EC2 pricing now.");
        assert_eq!(links[1].text, "https://docs.amazonaws.cn/ec2/");
        assert_eq!(links[2].url, "https://www.amazonaws.cn/en/new/2026/ec2-instances/guide/");
        assert!(links[2].context.ends_with("..."));
        assert_eq!(links[2].context.chars().count(), 203);
    }

    struct FixedFetch(Result<String, FailureKind>);

    impl PageFetch for FixedFetch {
        async fn fetch(&self, url: &str, _timeout: Option<Duration>) -> Result<String, TransportError> {
            self.0.clone().map_err(|kind| TransportError::new(url, kind))
        }
    }

    #[tokio::test]
    async fn test_extract_fetches_and_parses() {
        let html = page("", &format!("<h1>Fetched announcement</h1><article>{BODY}</article>"));
        let extractor = ContentExtractor::new(FixedFetch(Ok(html)), None);
        let content = extractor.extract(URL, Some(ymd(2026, 1, 2))).await.unwrap();
        assert_eq!(content.title, "Fetched announcement");
        assert_eq!(content.publication_date, ymd(2026, 1, 2));
    }

    #[tokio::test]
    async fn test_extract_surfaces_transport_errors() {
        let extractor = ContentExtractor::new(FixedFetch(Err(FailureKind::Status(404))), None);
        let err = extractor.extract(URL, None).await.unwrap_err();
        assert_eq!(err.kind(), "TransportError");
    }
}
