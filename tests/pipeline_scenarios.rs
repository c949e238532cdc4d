//! End-to-end scenario tests spanning module boundaries: analyzer
//! degradation through the runtime and aggregator, a dedup→rank chain on
//! a realistic issue set, and the page selector's fallback path staying
//! within the discovered URL set. Each module's own edge cases are
//! covered alongside the module itself; these exercise the seams
//! between them.

use std::collections::BTreeSet;

use webaudit_core::grade::Aggregator;
use webaudit_core::registry::{AnalyzerImpls, AnalyzerRegistry};
use webaudit_core::runtime::AnalyzerRuntime;
use webaudit_core::select::PageSelector;
use webaudit_core::testing::{FailingAnalyzer, MockModelProvider, StubAnalyzer};
use webaudit_core::types::config::{AnalyzerToggles, BusinessContext};
use webaudit_core::types::issue::{Category, Issue, Severity};
use webaudit_core::types::page::{
    BusinessIntelligence, Page, PageMetadata, ScreenshotRef, ViewportScreenshots, ViewportTokens,
};
use webaudit_core::types::selection::PageSelection;

fn issue(id: &str, title: &str, category: Category, source: &str, severity: Severity) -> Issue {
    let mut i = Issue::new(title, category, source, "/", severity);
    i.id = id.to_string();
    i
}

fn homepage() -> Page {
    Page {
        url: "/".to_string(),
        absolute_url: "https://example.com/".to_string(),
        html: "<html></html>".to_string(),
        metadata: PageMetadata::default(),
        screenshots: ViewportScreenshots {
            desktop: ScreenshotRef::Path("desktop.png".to_string()),
            mobile: ScreenshotRef::Path("mobile.png".to_string()),
        },
        design_tokens: ViewportTokens::default(),
        success: true,
        is_homepage: true,
        business_intelligence: BusinessIntelligence::default(),
    }
}

/// S1: one analyzer throws synthetically; the other five still run and
/// the full runtime→aggregator path produces a complete graded result
/// with the failing category represented as a well-formed degraded
/// default rather than aborting the run.
#[tokio::test]
async fn analyzer_degradation_does_not_block_the_other_five() {
    let pages = vec![homepage()];
    let selection = PageSelection {
        seo_pages: ["/".to_string()].into_iter().collect(),
        content_pages: ["/".to_string()].into_iter().collect(),
        visual_pages: ["/".to_string()].into_iter().collect(),
        social_pages: ["/".to_string()].into_iter().collect(),
        reasoning: "all pages".to_string(),
    };

    let seo = FailingAnalyzer::new(Category::Seo);
    let content = StubAnalyzer::new(Category::Content, 75.0);
    let desktop = StubAnalyzer::new(Category::DesktopVisual, 90.0);
    let mobile = StubAnalyzer::new(Category::MobileVisual, 85.0);
    let social = StubAnalyzer::new(Category::Social, 60.0);
    let accessibility = StubAnalyzer::new(Category::Accessibility, 70.0);

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
    let per_category = runtime.run(&plan, &pages, &selection).await;

    let seo_result = &per_category.iter().find(|(c, _)| *c == Category::Seo).unwrap().1;
    assert_eq!(seo_result.score, 50.0);
    assert!(seo_result.meta.error.is_some());
    assert_eq!(per_category.len(), 6, "every category reports a result, including the failed one");

    let graded = Aggregator::with_default_weights().aggregate(&per_category);
    assert!(graded.per_category_scores.all_in_bounds());
    assert!((0.0..=100.0).contains(&graded.overall_score));
}

/// S2: three issues with the same root cause from three different
/// analyzers merge into one on dedup, then survive ranking with
/// `limit=5` exactly once.
#[tokio::test]
async fn full_dedup_and_rank_collapses_duplicate_to_one_top_issue() {
    let mut issues = vec![
        issue("1", "Missing alt text on 33% of images", Category::Seo, "seo", Severity::High),
        issue(
            "2",
            "Missing alt text on 33% of images",
            Category::Accessibility,
            "accessibility",
            Severity::High,
        ),
        issue(
            "3",
            "Missing alt text on 33% of images",
            Category::DesktopVisual,
            "visual",
            Severity::Medium,
        ),
    ];
    for i in 4..=12 {
        issues.push(issue(
            &i.to_string(),
            &format!("Other finding #{i}"),
            Category::Content,
            "content",
            Severity::Low,
        ));
    }

    let dedup_model = MockModelProvider::new().with_json_response(serde_json::json!({
        "groups": [{
            "primaryIssueId": "1",
            "mergedIssues": ["1", "2", "3"],
            "title": "Missing alt text on 33% of images",
            "description": "Multiple analyzers flagged missing alt text across the homepage",
            "impact": "Screen readers cannot describe these images",
            "mergeReason": "same root cause across seo/accessibility/visual"
        }]
    }));
    let deduper = webaudit_core::dedup::IssueDeduper::new(&dedup_model);
    let (deduped, dedup_stats) = deduper.dedupe(issues).await;

    assert_eq!(dedup_stats.groups_formed, 1);
    let merged = deduped.iter().find(|i| i.merged_from_count == 3).expect("merged issue present");
    assert_eq!(merged.severity, Severity::High);
    let mut merged_sources = merged.merged_sources.clone();
    merged_sources.sort();
    assert_eq!(merged_sources, vec!["accessibility".to_string(), "seo".to_string(), "visual".to_string()]);

    let rank_model = MockModelProvider::new().with_json_response(serde_json::json!({
        "topIssues": [{"issueId": merged.id, "rank": 1, "reasoning": "highest severity, affects multiple categories"}],
        "excludedCount": deduped.len() - 1,
        "selectionStrategy": "impact-weighted"
    }));
    let ranker = webaudit_core::rank::TopIssueRanker::new(&rank_model, vec![Severity::High, Severity::Critical]);
    let (top, _stats) = ranker.rank(&deduped, &BusinessContext::default(), 5).await;

    let occurrences = top.iter().filter(|i| i.id == merged.id).count();
    assert_eq!(occurrences, 1, "the merged issue must appear exactly once in the top list");
}

/// S6: the page selector's AI call fails; the heuristic fallback still
/// returns a usable selection — homepage plus up to `maxPagesPerModule -
/// 1` keyword-matched URLs per category, every one of them a member of
/// the discovered set.
#[tokio::test]
async fn fallback_page_selection_stays_within_discovered_urls() {
    let discovered: BTreeSet<String> = [
        "/".to_string(),
        "/about".to_string(),
        "/services".to_string(),
        "/contact".to_string(),
        "/blog/post-1".to_string(),
    ]
    .into_iter()
    .collect();

    let model = MockModelProvider::new().always_error();
    let selector = PageSelector::new(&model);
    let selection = selector.select(&discovered, &BusinessContext::default(), 4).await;

    assert!(selection.unique_pages().is_subset(&discovered));
    assert!(selection.unique_pages().contains("/"));
    assert!(selection.seo_pages.len() <= 4);
    assert!(selection.content_pages.len() <= 4);
    assert!(selection.visual_pages.len() <= 4);
    assert!(selection.social_pages.len() <= 4);
}
