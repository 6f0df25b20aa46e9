//! Small DOM helpers shared by the landing-page and detail-page scrapers.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

static MANY_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n\s*\n+").unwrap());
static HORIZONTAL_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
static ANY_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Parse a selector that is known at compile time.
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css:?}: {e}"))
}

/// First element matching `sel` in document order.
pub(crate) fn select_one<'a>(document: &'a Html, sel: &Selector) -> Option<ElementRef<'a>> {
    document.select(sel).next()
}

/// Element text with each piece trimmed and whitespace collapsed to single spaces.
pub(crate) fn compact_text(element: ElementRef<'_>) -> String {
    let joined = element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    ANY_WS.replace_all(&joined, " ").into_owned()
}

/// Number of non-whitespace-edge characters of text under `element`.
pub(crate) fn text_len(element: ElementRef<'_>) -> usize {
    element.text().map(|t| t.trim().chars().count()).sum()
}

/// Flatten an element to readable text.
///
/// `script` and `style` are dropped, `p`/`div`/`br` open a new line,
/// headings open a blank line. Runs of three or more newlines become two,
/// runs of spaces and tabs become one space.
pub(crate) fn flatten_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    push_flat(element, &mut raw);
    let text = MANY_NEWLINES.replace_all(&raw, "\n\n");
    let text = HORIZONTAL_WS.replace_all(&text, " ");
    text.trim().to_string()
}

fn push_flat(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if name == "script" || name == "style" {
                    continue;
                }
                match name {
                    "p" | "div" | "br" => out.push('\n'),
                    "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => out.push_str("\n\n"),
                    _ => {}
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    push_flat(child_el, out);
                }
            }
            _ => {}
        }
    }
}

/// First `max` characters of `s`.
pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncate to `max` characters, appending `...` when anything was cut.
pub(crate) fn truncate_with_ellipsis(s: &str, max: usize) -> String {
    let head = truncate_chars(s, max);
    if head.len() < s.len() {
        format!("{head}...")
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_of(html: &str) -> Html {
        Html::parse_document(html)
    }

    #[test]
    fn test_flatten_inserts_breaks_and_drops_scripts() {
        let doc = body_of(
            "<html><body><article><h2>Heading</h2><p>First   paragraph.</p>\
             <script>var x = 1;</script><style>p{}</style><div>Second<br>line</div></article></body></html>",
        );
        let article = select_one(&doc, &selector("article")).unwrap();
        assert_eq!(
            flatten_text(article),
            "Heading\nFirst paragraph.\nSecond\nline"
        );
    }

    #[test]
    fn test_flatten_collapses_blank_lines() {
        let doc = body_of("<div id=\"c\"><p>a</p>\n\n\n\n<p>b</p></div>");
        let div = select_one(&doc, &selector("#c")).unwrap();
        assert_eq!(flatten_text(div), "a\n\nb");
    }

    #[test]
    fn test_compact_text_joins_pieces() {
        let doc = body_of("<p id=\"x\">  Hello\n   <b>big</b>   world </p>");
        let p = select_one(&doc, &selector("#x")).unwrap();
        assert_eq!(compact_text(p), "Hello big world");
        assert_eq!(text_len(p), "Hellobigworld".len());
    }

    #[test]
    fn test_truncate_helpers_respect_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_with_ellipsis("abcdef", 3), "abc...");
        assert_eq!(truncate_with_ellipsis("abc", 3), "abc");
    }
}
