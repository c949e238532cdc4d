//! The opaque headless-browser capability.
//!
//! Grounded in the `other_examples` screenshot-capture reference: a
//! capturer takes a URL plus viewport and hands back bytes (or a storage
//! path) and whatever design tokens it could read off the rendered page.
//! The pipeline never launches a browser itself.

use async_trait::async_trait;

use crate::error::CrawlError;
use crate::types::page::{DesignTokens, ScreenshotRef};

/// Viewport a page should be captured at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewport {
    Desktop,
    Mobile,
}

impl Viewport {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Viewport::Desktop => (1440, 900),
            Viewport::Mobile => (390, 844),
        }
    }
}

/// One viewport's capture: screenshot plus whatever design tokens the
/// capturer could read off the rendered DOM.
#[derive(Debug, Clone)]
pub struct CaptureOutput {
    pub screenshot: ScreenshotRef,
    pub design_tokens: DesignTokens,
    pub html: String,
}

/// The opaque page-capture capability the Crawler stage (C5) drives.
#[async_trait]
pub trait PageCapturer: Send + Sync {
    /// Render `url` at `viewport` and capture a screenshot plus the DOM.
    async fn capture(&self, url: &str, viewport: Viewport) -> Result<CaptureOutput, CrawlError>;
}
