//! Landing-page link discovery.
//!
//! Embedded JSON is preferred when present (see [`super::structured`]).
//! Otherwise the announcements section is located by an ordered list of
//! locators and its anchors are filtered down to announcement URLs.

use crate::error::ScrapeError;
use crate::models::AnnouncementLink;
use crate::utils::truncate_for_log;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::dom::{compact_text, selector, truncate_chars};
use super::structured::{has_structured_markers, try_extract_structured_links};

/// Heading text marking the announcements section on the English page.
pub const DEFAULT_SECTION_HEADING: &str = "Most Recent Announcements from Amazon Web Services";

const SECTION_CLASS_KEYWORDS: [&str; 4] = ["news", "announcement", "recent", "latest"];
const MIN_SECTION_LINKS: usize = 3;
const MAX_ANCESTOR_HOPS: usize = 5;

const SKIP_PATTERNS: [&str; 9] = [
    "/about/",
    "/contact/",
    "/support/",
    "/pricing/",
    "/documentation/",
    "/docs/",
    "/console/",
    "/signin/",
    "/signup/",
];
const ANNOUNCEMENT_PATTERNS: [&str; 7] = [
    "/new/",
    "/announcement/",
    "/blog/",
    "/press/",
    "/release/",
    "/update/",
    "/launch/",
];

const PREVIEW_MIN_CHARS: usize = 20;
const PREVIEW_MAX_CHARS: usize = 200;

static ANCHOR_WITH_HREF: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static ANY_ANCHOR: Lazy<Selector> = Lazy::new(|| selector("a"));
static CLASSED_CONTAINER: Lazy<Selector> =
    Lazy::new(|| selector("div[class], section[class], ul[class]"));
static IMAGE: Lazy<Selector> = Lazy::new(|| selector("img[alt]"));

type SectionLocator = for<'a> fn(&LandingPageParser, &'a Html, &str) -> Option<ElementRef<'a>>;

/// Tried in order; the first hit wins.
const SECTION_LOCATORS: [(&str, SectionLocator); 3] = [
    ("heading", LandingPageParser::section_by_heading as SectionLocator),
    ("class keywords", LandingPageParser::section_by_class as SectionLocator),
    ("whole document", LandingPageParser::section_whole_document as SectionLocator),
];

/// Finds announcement links on a landing page.
#[derive(Debug, Clone)]
pub struct LandingPageParser {
    base_url: Url,
    section_headings: Vec<String>,
}

impl LandingPageParser {
    /// A parser resolving relative links against `base_url`.
    ///
    /// `section_headings` are the heading texts that mark the announcements
    /// section; an empty list falls back to [`DEFAULT_SECTION_HEADING`].
    pub fn new(base_url: &str, section_headings: Vec<String>) -> Result<Self, url::ParseError> {
        let base_url = Url::parse(base_url)?;
        let section_headings = if section_headings.is_empty() {
            vec![DEFAULT_SECTION_HEADING.to_string()]
        } else {
            section_headings
        };
        Ok(Self {
            base_url,
            section_headings,
        })
    }

    /// Extract announcement links from landing-page markup.
    ///
    /// Links are unique by URL, in document order.
    ///
    /// # Errors
    ///
    /// [`ScrapeError::SectionNotFound`] when there is no embedded data and no
    /// locator finds an announcements section.
    #[instrument(level = "info", skip_all, fields(base = %self.base_url))]
    pub fn parse_landing_page(&self, markup: &str) -> Result<Vec<AnnouncementLink>, ScrapeError> {
        if has_structured_markers(markup) {
            let links = try_extract_structured_links(markup, &self.base_url);
            if !links.is_empty() {
                info!(count = links.len(), "Extracted links from embedded data");
                return Ok(links);
            }
            warn!("Embedded data markers present but nothing parsed; falling back to markup");
        }

        let document = Html::parse_document(markup);
        let section = SECTION_LOCATORS
            .iter()
            .find_map(|(name, locate)| {
                let found = locate(self, &document, markup);
                if found.is_some() {
                    debug!(locator = *name, "Located announcements section");
                }
                found
            })
            .ok_or_else(|| {
                debug!(preview = %truncate_for_log(markup, 300), "No locator matched");
                ScrapeError::SectionNotFound(format!(
                    "no announcements section on {}",
                    self.base_url
                ))
            })?;

        let links = self.extract_anchor_links(section);
        info!(count = links.len(), "Extracted links from markup");
        Ok(links)
    }

    fn section_by_heading<'a>(&self, document: &'a Html, _markup: &str) -> Option<ElementRef<'a>> {
        // The phrase may also sit in <title>; keep trying later occurrences.
        document
            .root_element()
            .descendants()
            .filter(|node| {
                node.value().as_text().is_some_and(|text| {
                    self.section_headings
                        .iter()
                        .any(|h| text.contains(h.as_str()))
                })
            })
            .filter_map(|node| node.parent().and_then(ElementRef::wrap))
            .find_map(container_with_anchors)
    }

    fn section_by_class<'a>(&self, document: &'a Html, _markup: &str) -> Option<ElementRef<'a>> {
        document.select(&CLASSED_CONTAINER).find(|el| {
            let class = el.value().attr("class").unwrap_or_default().to_lowercase();
            SECTION_CLASS_KEYWORDS.iter().any(|k| class.contains(k))
                && el.select(&ANCHOR_WITH_HREF).count() >= MIN_SECTION_LINKS
        })
    }

    fn section_whole_document<'a>(&self, document: &'a Html, markup: &str) -> Option<ElementRef<'a>> {
        if has_structured_markers(markup) {
            Some(document.root_element())
        } else {
            None
        }
    }

    fn extract_anchor_links(&self, section: ElementRef<'_>) -> Vec<AnnouncementLink> {
        section
            .select(&ANCHOR_WITH_HREF)
            .filter_map(|anchor| self.link_from_anchor(anchor))
            .unique_by(|link| link.url.clone())
            .collect()
    }

    fn link_from_anchor(&self, anchor: ElementRef<'_>) -> Option<AnnouncementLink> {
        let href = anchor.value().attr("href")?.trim();
        let url = self.resolve_url(href)?;
        if !self.is_announcement_url(&url) {
            return None;
        }
        let title = anchor_title(anchor)?;
        Some(AnnouncementLink {
            title,
            url: url.to_string(),
            preview_text: preview_near(anchor),
            publication_date: None,
        })
    }

    /// Resolve an href against the base URL. Fragments and scripts yield `None`.
    pub fn resolve_url(&self, href: &str) -> Option<Url> {
        if href.is_empty() || href.starts_with('#') {
            return None;
        }
        let url = self.base_url.join(href).ok()?;
        matches!(url.scheme(), "http" | "https").then_some(url)
    }

    /// Whether a resolved URL plausibly points at an announcement.
    ///
    /// The host must be the base host (or a subdomain of it), the path must
    /// not hit a skip pattern, and must either hit an announcement pattern
    /// or be something other than the site root.
    pub fn is_announcement_url(&self, url: &Url) -> bool {
        if !self.same_site(url) {
            return false;
        }
        let path = url.path().to_lowercase();
        if SKIP_PATTERNS.iter().any(|p| path.contains(p)) {
            return false;
        }
        if ANNOUNCEMENT_PATTERNS.iter().any(|p| path.contains(p)) {
            return true;
        }
        !path.is_empty() && path != "/"
    }

    fn same_site(&self, url: &Url) -> bool {
        let (Some(base), Some(host)) = (self.base_url.host_str(), url.host_str()) else {
            return false;
        };
        let base = base.strip_prefix("www.").unwrap_or(base);
        let host = host.strip_prefix("www.").unwrap_or(host);
        host == base || host.ends_with(&format!(".{base}"))
    }
}

/// Nearest `div`, `section` or `article` holding an anchor, at most
/// [`MAX_ANCESTOR_HOPS`] levels up from `start`.
fn container_with_anchors(start: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let mut current = Some(start);
    for _ in 0..MAX_ANCESTOR_HOPS {
        let el = current?;
        let is_container = matches!(el.value().name(), "div" | "section" | "article");
        if is_container && el.select(&ANY_ANCHOR).next().is_some() {
            return Some(el);
        }
        current = el.parent().and_then(ElementRef::wrap);
    }
    None
}

/// Title attribute, then visible text, then the alt text of a nested image.
fn anchor_title(anchor: ElementRef<'_>) -> Option<String> {
    let from_attr = anchor
        .value()
        .attr("title")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    from_attr
        .or_else(|| Some(compact_text(anchor)).filter(|t| !t.is_empty()))
        .or_else(|| {
            anchor
                .select(&IMAGE)
                .filter_map(|img| img.value().attr("alt"))
                .map(str::trim)
                .find(|alt| !alt.is_empty())
                .map(str::to_string)
        })
}

/// Teaser text next to an anchor.
///
/// The first following sibling of the anchor's parent with more than 20
/// characters of text wins; otherwise the parent's text following the link
/// text is used when long enough. Capped at 200 characters.
fn preview_near(anchor: ElementRef<'_>) -> Option<String> {
    let parent = anchor.parent().and_then(ElementRef::wrap)?;

    let sibling = parent
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .map(compact_text)
        .find(|t| t.chars().count() > PREVIEW_MIN_CHARS);
    if let Some(text) = sibling {
        return Some(truncate_chars(&text, PREVIEW_MAX_CHARS).to_string());
    }

    let link_text = compact_text(anchor);
    if link_text.is_empty() {
        return None;
    }
    let parent_text = compact_text(parent);
    let (_, after) = parent_text.split_once(link_text.as_str())?;
    let after = after.trim();
    (after.chars().count() > PREVIEW_MIN_CHARS).then(|| truncate_chars(after, PREVIEW_MAX_CHARS).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.amazonaws.cn/en/new/";

    fn parser() -> LandingPageParser {
        LandingPageParser::new(BASE, vec![]).unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_url_classification() {
        let p = parser();
        assert!(p.is_announcement_url(&url("https://www.amazonaws.cn/new/2026/01/feature-x")));
        assert!(p.is_announcement_url(&url("https://www.amazonaws.cn/en/blog/post")));
        assert!(p.is_announcement_url(&url("https://docs.amazonaws.cn/en/some-page")));
        assert!(!p.is_announcement_url(&url("https://www.amazonaws.cn/about/team")));
        assert!(!p.is_announcement_url(&url("https://www.amazonaws.cn/en/pricing/")));
        assert!(!p.is_announcement_url(&url("https://www.amazonaws.cn/")));
        assert!(!p.is_announcement_url(&url("https://example.com/new/2026/x")));
        assert!(!p.is_announcement_url(&url("https://notamazonaws.cn/new/x")));
    }

    #[test]
    fn test_resolve_url_skips_fragments_and_scripts() {
        let p = parser();
        assert!(p.resolve_url("#top").is_none());
        assert!(p.resolve_url("").is_none());
        assert!(p.resolve_url("javascript:void(0)").is_none());
        assert_eq!(
            p.resolve_url("2026/x/").unwrap().as_str(),
            "https://www.amazonaws.cn/en/new/2026/x/"
        );
        assert_eq!(
            p.resolve_url("/new/2026/y").unwrap().as_str(),
            "https://www.amazonaws.cn/new/2026/y"
        );
    }

    #[test]
    fn test_section_found_by_heading() {
        let html = r##"<html><body>
            <nav><a href="/new/nav-link">Nav</a></nav>
            <div class="wrapper">
              <h2>Most Recent Announcements from Amazon Web Services</h2>
              <ul>
                <li><a href="/new/2026/01/feature-x" title="Feature X launches">Feature X</a></li>
                <li><a href="/about/team">Team</a></li>
                <li><a href="/new/2026/01/feature-x">Duplicate</a></li>
                <li><a href="#">Top</a></li>
              </ul>
            </div>
        </body></html>"##;
        let links = parser().parse_landing_page(html).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].title, "Feature X launches");
        assert_eq!(links[0].url, "https://www.amazonaws.cn/new/2026/01/feature-x");
        assert!(links[0].publication_date.is_none());
    }

    #[test]
    fn test_section_found_by_class_keywords() {
        let html = r#"<html><body>
            <div class="latest-news">
              <div><a href="/en/new/a">Alpha release</a></div>
              <p>Alpha is now available in the Beijing region.</p>
              <div><a href="/en/new/b"><img src="b.png" alt="Beta image"></a></div>
              <div><a href="/en/new/c">Gamma</a> now supports encryption at rest</div>
            </div>
        </body></html>"#;
        let links = parser().parse_landing_page(html).unwrap();
        let titles: Vec<_> = links.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha release", "Beta image", "Gamma"]);
        assert_eq!(
            links[0].preview_text.as_deref(),
            Some("Alpha is now available in the Beijing region.")
        );
        assert_eq!(
            links[2].preview_text.as_deref(),
            Some("now supports encryption at rest")
        );
    }

    #[test]
    fn test_structured_data_is_preferred() {
        let html = r#"<html><body>
            <script>{"fields":{"itemTitle":"From JSON","itemBody":"Body","itemLink":"/en/new/json/","itemMetadataDate":"2026-01-09T00:00:00.000+08:00"}}</script>
            <div class="news"><a href="/en/new/1">1</a><a href="/en/new/2">2</a><a href="/en/new/3">3</a></div>
        </body></html>"#;
        let links = parser().parse_landing_page(html).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].title, "From JSON");
        assert!(links[0].publication_date.is_some());
    }

    #[test]
    fn test_missing_section_is_an_error() {
        let html = "<html><body><p>Nothing to see</p><a href=\"/new/x\">x</a></body></html>";
        let err = parser().parse_landing_page(html).unwrap_err();
        assert!(matches!(err, ScrapeError::SectionNotFound(_)));
        assert_eq!(err.kind(), "SectionNotFound");
    }

    #[test]
    fn test_custom_section_heading() {
        let p = LandingPageParser::new(BASE, vec!["最新公告".to_string()]).unwrap();
        let html = r#"<html><body><section><h3>最新公告</h3>
            <a href="/new/2026/cn-launch">中国区域发布</a></section></body></html>"#;
        let links = p.parse_landing_page(html).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].title, "中国区域发布");
    }

    #[test]
    fn test_heading_in_document_title_is_skipped() {
        let html = r#"<html><head><title>Most Recent Announcements from Amazon Web Services</title></head>
            <body><div><h2>Most Recent Announcements from Amazon Web Services</h2>
            <p><a href="/en/new/2026/x">Amazon RDS adds a new engine version</a></p></div></body></html>"#;
        let links = parser().parse_landing_page(html).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://www.amazonaws.cn/en/new/2026/x");
    }

    #[test]
    fn test_inline_preview_takes_text_after_link_only() {
        let html = r#"<html><body><section class="news">
            <div>New: <a href="/en/new/a">Alpha</a> now supports encryption at rest today</div>
            <a href="/en/new/b">Beta</a><a href="/en/new/c">Gamma</a>
        </section></body></html>"#;
        let links = parser().parse_landing_page(html).unwrap();
        assert_eq!(links[0].title, "Alpha");
        assert_eq!(
            links[0].preview_text.as_deref(),
            Some("now supports encryption at rest today")
        );
    }
}
