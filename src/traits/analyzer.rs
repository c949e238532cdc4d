//! The `Analyzer` interface the registry (C6) resolves toggles into and
//! the runtime (C7) fans out over.
//!
//! Per the unified-mode design: a unified analyzer (technical or visual)
//! implements this same trait and produces one `AnalyzerResult` per call;
//! the registry is responsible for wrapping it so the runtime still only
//! ever sees six canonical per-category analyzers.

use async_trait::async_trait;

use crate::context::ContextAccumulator;
use crate::error::DegradedAnalyzerError;
use crate::types::issue::{AnalyzerResult, Category};
use crate::types::page::Page;

/// What a single analyzer invocation receives.
pub struct AnalyzerInput<'a> {
    pub pages: &'a [Page],
    /// Present only when cross-analyzer context sharing is enabled.
    pub context: Option<&'a ContextAccumulator>,
    /// An opaque, caller-supplied prompt override/addendum. The core
    /// never inspects its contents.
    pub custom_prompt: Option<&'a str>,
}

#[async_trait]
pub trait Analyzer: Send + Sync {
    fn category(&self) -> Category;

    async fn analyze(&self, input: AnalyzerInput<'_>) -> Result<AnalyzerResult, DegradedAnalyzerError>;
}

/// A unified analyzer produces two category results from one underlying
/// call. The registry splits it via these fixed accessors so the runtime
/// still sees independent per-category `Analyzer`s.
#[async_trait]
pub trait UnifiedAnalyzer: Send + Sync {
    /// Run the unified call once, returning both category results.
    async fn analyze_both(
        &self,
        input: AnalyzerInput<'_>,
    ) -> Result<(AnalyzerResult, AnalyzerResult), DegradedAnalyzerError>;
}
