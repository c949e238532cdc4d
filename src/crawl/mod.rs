//! Bounded-concurrency crawl stage (C5): fetches each selected page's HTML
//! and captures one desktop and one mobile screenshot via the caller's
//! `PageCapturer`, extracting design tokens and business-intelligence
//! signals along the way.
//!
//! Per-page failures never fail the crawl; they are collected into
//! `CrawlResult::failed_pages`. The crawl fails fatally only when zero
//! pages succeed or no homepage can be identified among the successes —
//! both are `CrawlError` variants the orchestrator (C13) treats as fatal.

pub mod business_intel;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use url::Url;

use crate::error::{CrawlError, CrawlResult as CrawlOutcome};
use crate::security::UrlValidator;
use crate::traits::browser::{PageCapturer, Viewport};
use crate::types::config::CrawlConfig;
use crate::types::page::{BusinessIntelligence, CrawlResult, FailedPage, Page, PageMetadata, ViewportScreenshots, ViewportTokens};

/// Per-page progress callback: `(completed, total, last_url)`.
pub type ProgressCallback<'a> = dyn Fn(usize, usize, &str) + Send + Sync + 'a;

pub struct Crawler<'a> {
    capturer: &'a dyn PageCapturer,
    validator: UrlValidator,
    config: CrawlConfig,
}

impl<'a> Crawler<'a> {
    pub fn new(capturer: &'a dyn PageCapturer, config: CrawlConfig) -> Self {
        Self {
            capturer,
            validator: UrlValidator::new(),
            config,
        }
    }

    pub fn with_validator(mut self, validator: UrlValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Fetch and capture every URL in `urls` (relative paths resolved
    /// against `site_root`), bounded to `config.concurrency` in flight at
    /// once. `on_progress` is invoked once per completed page, in
    /// completion order (not necessarily input order) — the Crawler makes
    /// no ordering guarantee beyond what `CrawlResult` stores.
    pub async fn crawl(
        &self,
        site_root: &str,
        urls: &[String],
        on_progress: Option<&ProgressCallback<'_>>,
    ) -> CrawlOutcome<CrawlResult> {
        let started = Instant::now();
        let root = Url::parse(site_root).map_err(|e| {
            CrawlError::Transport(format!("invalid site root {site_root}: {e}"))
        })?;

        let urls: Vec<String> = urls.iter().take(self.config.max_pages).cloned().collect();
        let total = urls.len();
        let completed = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let results: Vec<Result<Page, FailedPage>> = stream::iter(urls.into_iter())
            .map(|relative| {
                let root = root.clone();
                let completed = completed.clone();
                async move {
                    let outcome = self.capture_one(&root, &relative).await;
                    let n = completed.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                    if let Some(cb) = on_progress {
                        cb(n, total, &relative);
                    }
                    outcome
                }
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut pages = Vec::new();
        let mut failed_pages = Vec::new();
        let mut business_intel = HashMap::new();

        for result in results {
            match result {
                Ok(page) => {
                    business_intel.insert(page.url.clone(), page.business_intelligence.clone());
                    pages.push(page);
                }
                Err(failed) => failed_pages.push(failed),
            }
        }

        if pages.is_empty() {
            return Err(CrawlError::NoPagesSucceeded);
        }

        let crawl_time_ms = started.elapsed().as_millis() as u64;
        CrawlResult::new(pages, failed_pages, business_intel, crawl_time_ms).ok_or(CrawlError::NoHomepage)
    }

    async fn capture_one(&self, root: &Url, relative: &str) -> Result<Page, FailedPage> {
        let now = chrono::Utc::now();
        let absolute = resolve(root, relative);

        if let Err(e) = self.validator.validate(&absolute) {
            return Err(FailedPage {
                url: relative.to_string(),
                error: format!("security validation failed: {e}"),
                timestamp: now,
            });
        }

        let timeout = Duration::from_secs(self.config.page_timeout_secs);

        let desktop = tokio::time::timeout(timeout, self.capturer.capture(&absolute, Viewport::Desktop)).await;
        let desktop = match desktop {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(FailedPage {
                    url: relative.to_string(),
                    error: format!("desktop capture failed: {e}"),
                    timestamp: now,
                })
            }
            Err(_) => {
                return Err(FailedPage {
                    url: relative.to_string(),
                    error: "desktop capture timed out".to_string(),
                    timestamp: now,
                })
            }
        };

        let mobile = tokio::time::timeout(timeout, self.capturer.capture(&absolute, Viewport::Mobile)).await;
        let mobile = match mobile {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(FailedPage {
                    url: relative.to_string(),
                    error: format!("mobile capture failed: {e}"),
                    timestamp: now,
                })
            }
            Err(_) => {
                return Err(FailedPage {
                    url: relative.to_string(),
                    error: "mobile capture timed out".to_string(),
                    timestamp: now,
                })
            }
        };

        let business_intelligence = business_intel::extract(&desktop.html);
        let is_homepage = Page::is_homepage_url(relative);

        Ok(Page {
            url: relative.to_string(),
            absolute_url: absolute,
            html: desktop.html,
            metadata: PageMetadata::default(),
            screenshots: ViewportScreenshots {
                desktop: desktop.screenshot,
                mobile: mobile.screenshot,
            },
            design_tokens: ViewportTokens {
                desktop: desktop.design_tokens,
                mobile: mobile.design_tokens,
            },
            success: true,
            is_homepage,
            business_intelligence,
        })
    }
}

fn resolve(root: &Url, relative: &str) -> String {
    if relative.starts_with("http://") || relative.starts_with("https://") {
        return relative.to_string();
    }
    root.join(relative)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("{}{}", root.as_str().trim_end_matches('/'), relative))
}

/// Merge per-viewport business-intelligence signals extracted independently;
/// kept separate from `business_intel::extract` since a page only ever
/// carries one set, derived from its desktop capture (the richer markup).
pub fn merge_business_intel(signals: &[BusinessIntelligence]) -> BusinessIntelligence {
    let mut merged = BusinessIntelligence::default();
    for s in signals {
        merged.size_signals.extend(s.size_signals.iter().cloned());
        merged.premium_features.extend(s.premium_features.iter().cloned());
        merged.pricing_visible |= s.pricing_visible;
        merged.decision_maker_accessible |= s.decision_maker_accessible;
        if merged.years_in_business.is_none() {
            merged.years_in_business = s.years_in_business.clone();
        }
    }
    merged.size_signals.sort();
    merged.size_signals.dedup();
    merged.premium_features.sort();
    merged.premium_features.dedup();
    merged
}
