//! Page and crawl-result types.
//!
//! A page is captured once (`Page`), then read-only for the rest of the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An opaque reference to a captured screenshot — either the raw bytes or
/// a storage path, depending on how the caller's `PageCapturer` chose to
/// hand it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScreenshotRef {
    Bytes(Vec<u8>),
    Path(String),
}

impl ScreenshotRef {
    pub fn path(&self) -> Option<&str> {
        match self {
            ScreenshotRef::Path(p) => Some(p),
            ScreenshotRef::Bytes(_) => None,
        }
    }
}

/// Fonts/colors captured for one viewport, plus when they were captured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DesignTokens {
    pub fonts: Vec<String>,
    pub colors: Vec<String>,
    pub captured_at: Option<DateTime<Utc>>,
}

/// Per-viewport design tokens for a page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewportTokens {
    pub desktop: DesignTokens,
    pub mobile: DesignTokens,
}

/// Per-viewport screenshots for a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewportScreenshots {
    pub desktop: ScreenshotRef,
    pub mobile: ScreenshotRef,
}

/// Size/maturity/pricing/decision-maker signals extracted by the crawler's
/// signal-string heuristics. These never fail the crawl on missing data;
/// absent fields just stay `None`/empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusinessIntelligence {
    pub size_signals: Vec<String>,
    pub years_in_business: Option<String>,
    pub pricing_visible: bool,
    pub premium_features: Vec<String>,
    pub decision_maker_accessible: bool,
}

/// Lightweight technology/metadata detected on a page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageMetadata {
    pub tech_stack: Vec<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// A successfully captured page. Created once by the Crawler, read-only
/// for the remainder of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// Relative path this page was discovered/selected under (e.g. `/about`).
    pub url: String,
    /// Fully-qualified URL that was actually fetched.
    pub absolute_url: String,
    pub html: String,
    pub metadata: PageMetadata,
    pub screenshots: ViewportScreenshots,
    pub design_tokens: ViewportTokens,
    pub success: bool,
    pub is_homepage: bool,
    pub business_intelligence: BusinessIntelligence,
}

impl Page {
    pub fn is_homepage_url(url: &str) -> bool {
        url.is_empty() || url == "/"
    }
}

/// A page the crawler attempted and failed to capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedPage {
    pub url: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// The output of the Crawler stage (C5).
///
/// Invariant: `homepage` references an entry in `pages` whenever `pages`
/// is non-empty — enforced by `CrawlResult::new`, which is the only public
/// constructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub pages: Vec<Page>,
    pub failed_pages: Vec<FailedPage>,
    homepage_index: usize,
    pub business_intel: HashMap<String, BusinessIntelligence>,
    pub crawl_time_ms: u64,
}

impl CrawlResult {
    /// Build a `CrawlResult` from the pages successfully captured during a
    /// run. Picks the homepage by URL equal to `/`/empty, else the first
    /// successful page. Returns `None` if `pages` is empty — the caller
    /// (the orchestrator) turns that into `CrawlError::NoPagesSucceeded`.
    pub fn new(
        pages: Vec<Page>,
        failed_pages: Vec<FailedPage>,
        business_intel: HashMap<String, BusinessIntelligence>,
        crawl_time_ms: u64,
    ) -> Option<Self> {
        if pages.is_empty() {
            return None;
        }
        let homepage_index = pages
            .iter()
            .position(|p| Page::is_homepage_url(&p.url))
            .unwrap_or(0);
        Some(Self {
            pages,
            failed_pages,
            homepage_index,
            business_intel,
            crawl_time_ms,
        })
    }

    pub fn homepage(&self) -> &Page {
        &self.pages[self.homepage_index]
    }

    pub fn page_by_url(&self, url: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.url == url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str) -> Page {
        Page {
            url: url.to_string(),
            absolute_url: format!("https://example.com{url}"),
            html: String::new(),
            metadata: PageMetadata::default(),
            screenshots: ViewportScreenshots {
                desktop: ScreenshotRef::Path("d.png".into()),
                mobile: ScreenshotRef::Path("m.png".into()),
            },
            design_tokens: ViewportTokens::default(),
            success: true,
            is_homepage: url.is_empty() || url == "/",
            business_intelligence: BusinessIntelligence::default(),
        }
    }

    #[test]
    fn homepage_found_by_slash() {
        let pages = vec![page("/about"), page("/")];
        let cr = CrawlResult::new(pages, vec![], HashMap::new(), 10).unwrap();
        assert_eq!(cr.homepage().url, "/");
    }

    #[test]
    fn homepage_falls_back_to_first_success() {
        let pages = vec![page("/about"), page("/contact")];
        let cr = CrawlResult::new(pages, vec![], HashMap::new(), 10).unwrap();
        assert_eq!(cr.homepage().url, "/about");
    }

    #[test]
    fn empty_pages_yields_none() {
        assert!(CrawlResult::new(vec![], vec![], HashMap::new(), 0).is_none());
    }
}
