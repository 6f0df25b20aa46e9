//! Year-month filtering of links and announcements.
//!
//! The filter criterion is a `YYYY-MM` string. A record without a
//! publication date never matches an active filter.

use crate::error::ScrapeError;
use crate::models::{AnnouncementContent, AnnouncementLink};
use chrono::{Datelike, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, instrument};

static YEAR_MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9]{4})-([0-9]{2})$").unwrap());

const MIN_YEAR: i32 = 2000;
const MAX_YEAR: i32 = 2100;

/// Anything carrying an optional publication date.
pub trait Dated {
    fn publication_date(&self) -> Option<NaiveDateTime>;
}

impl Dated for AnnouncementLink {
    fn publication_date(&self) -> Option<NaiveDateTime> {
        self.publication_date
    }
}

/// Month filtering over extracted records. A run itself filters links only,
/// before extraction.
impl Dated for AnnouncementContent {
    fn publication_date(&self) -> Option<NaiveDateTime> {
        Some(self.publication_date)
    }
}

/// A parsed `YYYY-MM` criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    /// Parse a `YYYY-MM` string.
    ///
    /// # Errors
    ///
    /// [`ScrapeError::InvalidFormat`] unless the string is exactly four
    /// digits, a dash and two digits, with the year in 2000..=2100 and the
    /// month in 1..=12.
    pub fn parse(s: &str) -> Result<Self, ScrapeError> {
        let caps = YEAR_MONTH
            .captures(s)
            .ok_or_else(|| ScrapeError::InvalidFormat(s.to_string()))?;
        let year: i32 = caps[1]
            .parse()
            .map_err(|_| ScrapeError::InvalidFormat(s.to_string()))?;
        let month: u32 = caps[2]
            .parse()
            .map_err(|_| ScrapeError::InvalidFormat(s.to_string()))?;

        if !(MIN_YEAR..=MAX_YEAR).contains(&year) || !(1..=12).contains(&month) {
            return Err(ScrapeError::InvalidFormat(s.to_string()));
        }
        debug!(year, month, "Parsed date filter");
        Ok(Self { year, month })
    }

    /// True iff `date` falls in this year and month. `None` never matches.
    pub fn matches(&self, date: Option<NaiveDateTime>) -> bool {
        match date {
            Some(d) => d.year() == self.year && d.month() == self.month,
            None => false,
        }
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Keep the records matching `filter`, preserving their order.
///
/// `None` returns the input unchanged.
///
/// # Errors
///
/// [`ScrapeError::InvalidFormat`] if `filter` is supplied but malformed.
#[instrument(level = "info", skip_all, fields(filter = ?filter, input = records.len()))]
pub fn filter_by_date<T: Dated>(records: Vec<T>, filter: Option<&str>) -> Result<Vec<T>, ScrapeError> {
    let Some(filter) = filter else {
        info!("No date filter specified, keeping all records");
        return Ok(records);
    };
    let criterion = YearMonth::parse(filter)?;
    Ok(apply(records, criterion))
}

/// Keep the records matching an already parsed criterion.
pub fn apply<T: Dated>(records: Vec<T>, criterion: YearMonth) -> Vec<T> {
    let total = records.len();
    let kept: Vec<T> = records
        .into_iter()
        .filter(|r| criterion.matches(r.publication_date()))
        .collect();
    info!(kept = kept.len(), total, %criterion, "Date filtering complete");
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn link(url: &str, date: Option<(i32, u32, u32)>) -> AnnouncementLink {
        AnnouncementLink {
            title: format!("Title for {url}"),
            url: url.to_string(),
            preview_text: None,
            publication_date: date.map(|(y, m, d)| {
                NaiveDate::from_ymd_opt(y, m, d)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            }),
        }
    }

    #[test]
    fn test_parse_round_trips_every_valid_year_month() {
        for year in [2000, 2001, 2026, 2099, 2100] {
            for month in 1..=12u32 {
                let s = format!("{year:04}-{month:02}");
                let parsed = YearMonth::parse(&s).unwrap();
                assert_eq!(parsed, YearMonth { year, month });
                assert_eq!(parsed.to_string(), s);
            }
        }
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        for bad in ["1999-12", "2101-01", "2026-00", "2026-13", "0000-01", "9999-99"] {
            assert!(
                matches!(YearMonth::parse(bad), Err(ScrapeError::InvalidFormat(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "2026-1", "26-01", "2026/01", "2026-01-15", " 2026-01", "2026-01 ", "abcd-ef", "２０２６-01"] {
            assert!(
                matches!(YearMonth::parse(bad), Err(ScrapeError::InvalidFormat(_))),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn test_matches_requires_both_fields_and_a_date() {
        let c = YearMonth { year: 2026, month: 1 };
        assert!(c.matches(link("a", Some((2026, 1, 31))).publication_date));
        assert!(!c.matches(link("b", Some((2025, 1, 15))).publication_date));
        assert!(!c.matches(link("c", Some((2026, 2, 1))).publication_date));
        assert!(!c.matches(None));
    }

    #[test]
    fn test_absent_filter_is_identity() {
        let links = vec![link("a", None), link("b", Some((2020, 5, 5)))];
        let out = filter_by_date(links.clone(), None).unwrap();
        assert_eq!(out, links);
    }

    #[test]
    fn test_filter_preserves_order_and_drops_undated() {
        let links = vec![
            link("a", Some((2026, 1, 3))),
            link("b", None),
            link("c", Some((2026, 2, 1))),
            link("d", Some((2026, 1, 20))),
        ];
        let out = filter_by_date(links, Some("2026-01")).unwrap();
        let urls: Vec<_> = out.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, vec!["a", "d"]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let links = vec![
            link("a", Some((2026, 1, 3))),
            link("b", Some((2025, 1, 3))),
            link("c", Some((2026, 1, 9))),
        ];
        let once = filter_by_date(links, Some("2026-01")).unwrap();
        let twice = filter_by_date(once.clone(), Some("2026-01")).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_content_records_always_carry_a_date() {
        let ts = NaiveDate::from_ymd_opt(2026, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let content = AnnouncementContent {
            title: "Amazon EC2 update".to_string(),
            url: "https://example.com/new/ec2".to_string(),
            publication_date: ts,
            content_text: "Body".to_string(),
            embedded_links: vec![],
            extraction_timestamp: ts,
        };
        assert_eq!(filter_by_date(vec![content.clone()], Some("2026-01")).unwrap().len(), 1);
        assert!(filter_by_date(vec![content], Some("2026-02")).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_filter_is_an_error() {
        let links = vec![link("a", Some((2026, 1, 3)))];
        let err = filter_by_date(links, Some("2026-1")).unwrap_err();
        assert_eq!(err.kind(), "InvalidFormat");
    }
}
