//! Analyzer discovery, toggle resolution, and unified-mode dispatch (C6).
//!
//! Resolves a caller-supplied set of analyzer implementations plus the
//! `AnalyzerToggles` configuration into a `ResolvedPlan` the `AnalyzerRuntime`
//! (C7) executes. Disabled analyzers never appear in the plan as callables
//! — the runtime substitutes `AnalyzerResult::disabled` for them directly,
//! so a disabled analyzer costs nothing beyond constructing that fixed
//! value. Unified mode is resolved here too: downstream, the runtime
//! always sees exactly six per-category slots.

use crate::traits::analyzer::{Analyzer, UnifiedAnalyzer};
use crate::types::config::AnalyzerToggles;
use crate::types::issue::Category;

/// How a single category's result should be obtained.
pub enum CategoryPlan<'a> {
    Disabled,
    Direct(&'a dyn Analyzer),
    /// Obtained as one half of a unified call; the runtime calls the
    /// paired `UnifiedAnalyzer` once and splits the two halves out,
    /// rather than invoking this variant's analyzer at all.
    UnifiedHalf,
}

pub struct ResolvedPlan<'a> {
    pub seo: CategoryPlan<'a>,
    pub content: CategoryPlan<'a>,
    pub desktop_visual: CategoryPlan<'a>,
    pub mobile_visual: CategoryPlan<'a>,
    pub social: CategoryPlan<'a>,
    pub accessibility: CategoryPlan<'a>,
    pub unified_technical: Option<&'a dyn UnifiedAnalyzer>,
    pub unified_visual: Option<&'a dyn UnifiedAnalyzer>,
}

/// Caller-supplied analyzer implementations. Any field left `None` is
/// treated as disabled regardless of the toggle — there is nothing to
/// call, so the runtime reports a fixed-shape default result instead.
#[derive(Default)]
pub struct AnalyzerImpls<'a> {
    pub seo: Option<&'a dyn Analyzer>,
    pub content: Option<&'a dyn Analyzer>,
    pub desktop_visual: Option<&'a dyn Analyzer>,
    pub mobile_visual: Option<&'a dyn Analyzer>,
    pub social: Option<&'a dyn Analyzer>,
    pub accessibility: Option<&'a dyn Analyzer>,
    pub unified_technical: Option<&'a dyn UnifiedAnalyzer>,
    pub unified_visual: Option<&'a dyn UnifiedAnalyzer>,
}

pub struct AnalyzerRegistry;

impl AnalyzerRegistry {
    /// Resolve `toggles` against the supplied implementations.
    pub fn resolve<'a>(toggles: &AnalyzerToggles, impls: &AnalyzerImpls<'a>) -> ResolvedPlan<'a> {
        let use_unified_technical = toggles.use_unified_technical_analyzer && impls.unified_technical.is_some();
        let use_unified_visual = toggles.use_unified_visual_analyzer && impls.unified_visual.is_some();

        let seo = if use_unified_technical {
            CategoryPlan::UnifiedHalf
        } else {
            resolve_direct(toggles.enable_seo_analyzer, impls.seo)
        };
        let content = if use_unified_technical {
            CategoryPlan::UnifiedHalf
        } else {
            resolve_direct(toggles.enable_content_analyzer, impls.content)
        };
        let desktop_visual = if use_unified_visual {
            CategoryPlan::UnifiedHalf
        } else {
            resolve_direct(toggles.enable_visual_analyzer, impls.desktop_visual)
        };
        let mobile_visual = if use_unified_visual {
            CategoryPlan::UnifiedHalf
        } else {
            resolve_direct(toggles.enable_visual_analyzer, impls.mobile_visual)
        };
        let social = resolve_direct(toggles.enable_social_analyzer, impls.social);
        let accessibility = resolve_direct(toggles.enable_accessibility_analyzer, impls.accessibility);

        ResolvedPlan {
            seo,
            content,
            desktop_visual,
            mobile_visual,
            social,
            accessibility,
            unified_technical: use_unified_technical.then_some(impls.unified_technical).flatten(),
            unified_visual: use_unified_visual.then_some(impls.unified_visual).flatten(),
        }
    }

    /// Names of categories the plan will report as disabled, for
    /// `AnalysisMetadata::analyzers_disabled`.
    pub fn disabled_categories(plan: &ResolvedPlan<'_>) -> Vec<Category> {
        let slots = [
            (Category::Seo, &plan.seo),
            (Category::Content, &plan.content),
            (Category::DesktopVisual, &plan.desktop_visual),
            (Category::MobileVisual, &plan.mobile_visual),
            (Category::Social, &plan.social),
            (Category::Accessibility, &plan.accessibility),
        ];
        slots
            .into_iter()
            .filter_map(|(cat, plan)| matches!(plan, CategoryPlan::Disabled).then_some(cat))
            .collect()
    }
}

fn resolve_direct<'a>(enabled: bool, analyzer: Option<&'a dyn Analyzer>) -> CategoryPlan<'a> {
    match (enabled, analyzer) {
        (true, Some(a)) => CategoryPlan::Direct(a),
        _ => CategoryPlan::Disabled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubAnalyzer;

    #[test]
    fn disabled_toggle_yields_disabled_plan_even_with_impl_present() {
        let seo = StubAnalyzer::new(Category::Seo, 80.0);
        let impls = AnalyzerImpls {
            seo: Some(&seo),
            ..Default::default()
        };
        let mut toggles = AnalyzerToggles::default();
        toggles.enable_seo_analyzer = false;
        let plan = AnalyzerRegistry::resolve(&toggles, &impls);
        assert!(matches!(plan.seo, CategoryPlan::Disabled));
    }

    #[test]
    fn missing_impl_is_disabled_even_when_toggle_on() {
        let impls = AnalyzerImpls::default();
        let toggles = AnalyzerToggles::default();
        let plan = AnalyzerRegistry::resolve(&toggles, &impls);
        assert!(matches!(plan.seo, CategoryPlan::Disabled));
        assert_eq!(AnalyzerRegistry::disabled_categories(&plan).len(), 6);
    }

    #[test]
    fn unified_technical_covers_both_seo_and_content() {
        struct DummyUnified;
        #[async_trait::async_trait]
        impl crate::traits::analyzer::UnifiedAnalyzer for DummyUnified {
            async fn analyze_both(
                &self,
                _input: crate::traits::analyzer::AnalyzerInput<'_>,
            ) -> Result<(crate::types::issue::AnalyzerResult, crate::types::issue::AnalyzerResult), crate::error::DegradedAnalyzerError>
            {
                unreachable!("not called in this test")
            }
        }
        let unified = DummyUnified;
        let impls = AnalyzerImpls {
            unified_technical: Some(&unified),
            ..Default::default()
        };
        let mut toggles = AnalyzerToggles::default();
        toggles.use_unified_technical_analyzer = true;
        let plan = AnalyzerRegistry::resolve(&toggles, &impls);
        assert!(matches!(plan.seo, CategoryPlan::UnifiedHalf));
        assert!(matches!(plan.content, CategoryPlan::UnifiedHalf));
        assert!(plan.unified_technical.is_some());
    }
}
