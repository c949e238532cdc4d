//! Parallel analyzer execution with per-analyzer isolation (C7).
//!
//! Every resolved category runs concurrently; any panic or error from an
//! analyzer is caught and replaced with `AnalyzerResult::degraded` rather
//! than unwinding the whole run. Results are always returned in the
//! canonical category order (`Category::CANONICAL_ORDER`) regardless of
//! completion order, so the aggregated output is deterministic given
//! deterministic analyzer outputs.
//!
//! `PageSelection` names four page subsets for six categories:
//! `visualPages` feeds both `desktopVisual` and `mobileVisual`, and
//! `accessibility` — which the selection doesn't carve out a subset for
//! — is run over the full `unique_pages()` union (see DESIGN.md).

use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::context::ContextAccumulator;
use crate::registry::{CategoryPlan, ResolvedPlan};
use crate::traits::analyzer::{Analyzer, AnalyzerInput};
use crate::types::issue::{AnalyzerResult, Category};
use crate::types::page::Page;
use crate::types::selection::PageSelection;

/// Everything a resolved category's run needs beyond the analyzer
/// implementation itself.
struct RunContext<'a> {
    pages: &'a [Page],
    context: Option<&'a ContextAccumulator>,
    custom_prompt: Option<&'a str>,
}

pub struct AnalyzerRuntime<'a> {
    accumulator: Option<&'a ContextAccumulator>,
    custom_prompt: Option<&'a str>,
}

impl<'a> AnalyzerRuntime<'a> {
    pub fn new(accumulator: Option<&'a ContextAccumulator>, custom_prompt: Option<&'a str>) -> Self {
        Self {
            accumulator,
            custom_prompt,
        }
    }

    /// Run every resolved category in parallel; returns results in
    /// canonical order.
    pub async fn run(&self, plan: &ResolvedPlan<'_>, pages: &[Page], selection: &PageSelection) -> Vec<(Category, AnalyzerResult)> {
        let seo_pages = pages_for(pages, &selection.seo_pages);
        let content_pages = pages_for(pages, &selection.content_pages);
        let visual_pages = pages_for(pages, &selection.visual_pages);
        let all_pages: Vec<Page> = pages.to_vec();

        let seo_fut = self.run_slot(Category::Seo, &plan.seo, &seo_pages);
        let content_fut = self.run_slot(Category::Content, &plan.content, &content_pages);
        let desktop_fut = self.run_slot(Category::DesktopVisual, &plan.desktop_visual, &visual_pages);
        let mobile_fut = self.run_slot(Category::MobileVisual, &plan.mobile_visual, &visual_pages);
        let social_fut = self.run_slot(Category::Social, &plan.social, &pages_for(pages, &selection.social_pages));
        let accessibility_fut = self.run_slot(Category::Accessibility, &plan.accessibility, &all_pages);

        let unified_technical_fut = self.run_unified_technical(plan, &seo_pages);
        let unified_visual_fut = self.run_unified_visual(plan, &visual_pages);

        let (seo, content, desktop, mobile, social, accessibility, unified_tech, unified_vis) = tokio::join!(
            seo_fut,
            content_fut,
            desktop_fut,
            mobile_fut,
            social_fut,
            accessibility_fut,
            unified_technical_fut,
            unified_visual_fut,
        );

        let mut results: std::collections::HashMap<Category, AnalyzerResult> = std::collections::HashMap::new();
        if let Some(r) = seo {
            results.insert(Category::Seo, r);
        }
        if let Some(r) = content {
            results.insert(Category::Content, r);
        }
        if let Some(r) = desktop {
            results.insert(Category::DesktopVisual, r);
        }
        if let Some(r) = mobile {
            results.insert(Category::MobileVisual, r);
        }
        if let Some(r) = social {
            results.insert(Category::Social, r);
        }
        if let Some(r) = accessibility {
            results.insert(Category::Accessibility, r);
        }
        if let Some((seo_half, content_half)) = unified_tech {
            results.insert(Category::Seo, seo_half);
            results.insert(Category::Content, content_half);
        }
        if let Some((desktop_half, mobile_half)) = unified_vis {
            results.insert(Category::DesktopVisual, desktop_half);
            results.insert(Category::MobileVisual, mobile_half);
        }

        for category in Category::CANONICAL_ORDER {
            if let Some(result) = results.get(&category) {
                self.record_context(category, result, pages);
            }
        }

        Category::CANONICAL_ORDER
            .into_iter()
            .map(|category| {
                let result = results
                    .remove(&category)
                    .unwrap_or_else(|| AnalyzerResult::disabled(category.as_str()));
                (category, result)
            })
            .collect()
    }

    async fn run_slot(&self, category: Category, plan: &CategoryPlan<'_>, pages: &[Page]) -> Option<AnalyzerResult> {
        match plan {
            CategoryPlan::Disabled => Some(AnalyzerResult::disabled(category.as_str())),
            CategoryPlan::UnifiedHalf => None,
            CategoryPlan::Direct(analyzer) => Some(self.invoke(category, *analyzer, pages).await),
        }
    }

    async fn invoke(&self, category: Category, analyzer: &dyn Analyzer, pages: &[Page]) -> AnalyzerResult {
        let ctx = RunContext {
            pages,
            context: self.accumulator,
            custom_prompt: self.custom_prompt,
        };

        let input = AnalyzerInput {
            pages: ctx.pages,
            context: ctx.context,
            custom_prompt: ctx.custom_prompt,
        };

        let outcome = AssertUnwindSafe(analyzer.analyze(input)).catch_unwind().await;

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::warn!(analyzer = category.as_str(), error = %e, "analyzer returned an error, substituting default result");
                AnalyzerResult::degraded(category.as_str(), e.reason)
            }
            Err(_) => {
                tracing::warn!(analyzer = category.as_str(), "analyzer panicked, substituting default result");
                AnalyzerResult::degraded(category.as_str(), "analyzer panicked")
            }
        }
    }

    async fn run_unified_technical(&self, plan: &ResolvedPlan<'_>, pages: &[Page]) -> Option<(AnalyzerResult, AnalyzerResult)> {
        let unified = plan.unified_technical?;
        if !matches!(plan.seo, CategoryPlan::UnifiedHalf) {
            return None;
        }

        let input = AnalyzerInput {
            pages,
            context: self.accumulator,
            custom_prompt: self.custom_prompt,
        };
        let outcome = AssertUnwindSafe(unified.analyze_both(input)).catch_unwind().await;
        Some(match outcome {
            Ok(Ok((seo, content))) => (seo, content),
            Ok(Err(e)) => (
                AnalyzerResult::degraded("seo", e.reason.clone()),
                AnalyzerResult::degraded("content", e.reason),
            ),
            Err(_) => (
                AnalyzerResult::degraded("seo", "unified technical analyzer panicked"),
                AnalyzerResult::degraded("content", "unified technical analyzer panicked"),
            ),
        })
    }

    async fn run_unified_visual(&self, plan: &ResolvedPlan<'_>, pages: &[Page]) -> Option<(AnalyzerResult, AnalyzerResult)> {
        let unified = plan.unified_visual?;
        if !matches!(plan.desktop_visual, CategoryPlan::UnifiedHalf) {
            return None;
        }

        let input = AnalyzerInput {
            pages,
            context: self.accumulator,
            custom_prompt: self.custom_prompt,
        };
        let outcome = AssertUnwindSafe(unified.analyze_both(input)).catch_unwind().await;
        Some(match outcome {
            Ok(Ok((desktop, mobile))) => (desktop, mobile),
            Ok(Err(e)) => (
                AnalyzerResult::degraded("desktopVisual", e.reason.clone()),
                AnalyzerResult::degraded("mobileVisual", e.reason),
            ),
            Err(_) => (
                AnalyzerResult::degraded("desktopVisual", "unified visual analyzer panicked"),
                AnalyzerResult::degraded("mobileVisual", "unified visual analyzer panicked"),
            ),
        })
    }

    fn record_context(&self, category: Category, result: &AnalyzerResult, pages: &[Page]) {
        let Some(accumulator) = self.accumulator else { return };
        accumulator.add_analyzer_context(category.as_str(), result);
        for page in pages {
            let issues: Vec<_> = result.issues.iter().filter(|i| i.page == page.url).cloned().collect();
            let mut scores = std::collections::HashMap::new();
            scores.insert(category.as_str().to_string(), result.score);
            accumulator.add_page_context(crate::context::PageContext {
                url: &page.url,
                issues: &issues,
                scores: &scores,
            });
        }
    }
}

fn pages_for(all: &[Page], urls: &std::collections::BTreeSet<String>) -> Vec<Page> {
    all.iter().filter(|p| urls.contains(&p.url)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{AnalyzerImpls, AnalyzerRegistry};
    use crate::testing::{FailingAnalyzer, StubAnalyzer};
    use crate::types::config::AnalyzerToggles;
    use crate::types::page::{BusinessIntelligence, PageMetadata, ViewportScreenshots, ViewportTokens};
    use crate::types::page::ScreenshotRef;

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
            is_homepage: url == "/",
            business_intelligence: BusinessIntelligence::default(),
        }
    }

    fn selection_with(urls: &[&str]) -> PageSelection {
        let set: std::collections::BTreeSet<String> = urls.iter().map(|s| s.to_string()).collect();
        PageSelection {
            seo_pages: set.clone(),
            content_pages: set.clone(),
            visual_pages: set.clone(),
            social_pages: set,
            reasoning: String::new(),
        }
    }

    #[tokio::test]
    async fn degraded_analyzer_does_not_block_the_others() {
        let seo = FailingAnalyzer::new(Category::Seo);
        let content = StubAnalyzer::new(Category::Content, 70.0);
        let desktop = StubAnalyzer::new(Category::DesktopVisual, 80.0);
        let mobile = StubAnalyzer::new(Category::MobileVisual, 80.0);
        let social = StubAnalyzer::new(Category::Social, 90.0);
        let accessibility = StubAnalyzer::new(Category::Accessibility, 60.0);

        let impls = AnalyzerImpls {
            seo: Some(&seo),
            content: Some(&content),
            desktop_visual: Some(&desktop),
            mobile_visual: Some(&mobile),
            social: Some(&social),
            accessibility: Some(&accessibility),
            unified_technical: None,
            unified_visual: None,
        };
        let plan = AnalyzerRegistry::resolve(&AnalyzerToggles::default(), &impls);

        let runtime = AnalyzerRuntime::new(None, None);
        let pages = vec![page("/")];
        let selection = selection_with(&["/"]);
        let results = runtime.run(&plan, &pages, &selection).await;

        let by_category: std::collections::HashMap<_, _> = results.into_iter().collect();
        assert_eq!(by_category[&Category::Seo].score, 50.0);
        assert!(by_category[&Category::Seo].meta.error.is_some());
        assert_eq!(by_category[&Category::Content].score, 70.0);
    }

    #[tokio::test]
    async fn results_preserve_canonical_order() {
        let impls = AnalyzerImpls::default();
        let plan = AnalyzerRegistry::resolve(&AnalyzerToggles::default(), &impls);
        let runtime = AnalyzerRuntime::new(None, None);
        let pages = vec![page("/")];
        let selection = selection_with(&["/"]);
        let results = runtime.run(&plan, &pages, &selection).await;
        let order: Vec<Category> = results.into_iter().map(|(c, _)| c).collect();
        assert_eq!(order, Category::CANONICAL_ORDER.to_vec());
    }
}
