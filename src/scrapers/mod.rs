//! Page scrapers for the announcements site.
//!
//! Scraping follows the same two-phase pattern for every run:
//!
//! 1. **Discovery**: find announcement links on the landing page ([`landing`])
//! 2. **Extraction**: download and parse each detail page ([`detail`])
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`landing`] | Landing-page section location and anchor filtering |
//! | [`structured`] | Entries embedded as JSON in the landing page |
//! | [`detail`] | Title, date, body and links of a detail page |
//! | [`dates`] | Date string parsing and free-text date scanning |
//!
//! Parsing is pure: functions take markup and return values, so every
//! strategy can be tested without the network.

pub mod dates;
pub mod detail;
mod dom;
pub mod landing;
pub mod structured;
