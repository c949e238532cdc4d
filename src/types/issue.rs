//! Issue and analyzer-result types — the heart of the data model.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::types::page::ScreenshotRef;

/// Severity/priority band. Ordered low < medium < high < critical so
/// `max()` and saturating bumps (`ContextAccumulator::enhance_issue`) work
/// with plain comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn bump(self) -> Self {
        match self {
            Severity::Low => Severity::Medium,
            Severity::Medium => Severity::High,
            Severity::High | Severity::Critical => Severity::Critical,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "low" => Severity::Low,
            // Unknown severities default to medium (C10 enrichment rule).
            _ => Severity::Medium,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

/// Scope an issue was detected at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    Page,
    SiteWide,
}

/// The six fixed analyzer categories, in the canonical collection order
/// the AnalyzerRuntime must preserve regardless of completion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Seo,
    Content,
    DesktopVisual,
    MobileVisual,
    Social,
    Accessibility,
}

impl Category {
    pub const CANONICAL_ORDER: [Category; 6] = [
        Category::Seo,
        Category::Content,
        Category::DesktopVisual,
        Category::MobileVisual,
        Category::Social,
        Category::Accessibility,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Seo => "seo",
            Category::Content => "content",
            Category::DesktopVisual => "desktopVisual",
            Category::MobileVisual => "mobileVisual",
            Category::Social => "social",
            Category::Accessibility => "accessibility",
        }
    }
}

/// Per-issue metadata. Everything here is optional because most of it is
/// populated by specific stages (viewport/screenshot numbers by the
/// visual analyzers, keywords by the dedup/accumulator stages).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueMetadata {
    pub viewport: Option<String>,
    #[serde(default)]
    pub screenshot_numbers: Vec<u32>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

impl IssueMetadata {
    pub fn has_visual_evidence(&self) -> bool {
        !self.screenshot_numbers.is_empty()
    }
}

/// A single finding about the analyzed website.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Stable within a single run.
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub priority: Severity,
    pub category: Category,
    /// Analyzer name that produced this issue.
    pub source: String,
    pub impact: String,
    /// Relative URL of the page this issue was observed on.
    pub page: String,
    pub screenshot: Option<ScreenshotRef>,
    #[serde(default)]
    pub additional_screenshots: Vec<ScreenshotRef>,
    pub screenshot_section: Option<String>,
    pub wcag_criterion: Option<String>,
    pub fix: Option<String>,
    pub difficulty: Option<String>,
    pub scope: Option<Scope>,
    pub metadata: Option<IssueMetadata>,

    // Populated by dedup (C10) when this issue is the result of a merge.
    #[serde(default)]
    pub merged_from_count: u32,
    #[serde(default)]
    pub merged_sources: Vec<String>,
    #[serde(default)]
    pub merged_issue_ids: Vec<String>,
    pub deduplication_reason: Option<String>,

    // Populated by the context accumulator when severity was bumped
    // because the issue recurs site-wide.
    pub severity_reason: Option<String>,
    pub appears_on: Option<String>,

    // Populated by the ranker (C11).
    pub rank: Option<u32>,
    pub reasoning: Option<String>,

    // Populated by the vision validator (C9).
    pub rejected: Option<bool>,
    pub rejection_reason: Option<String>,
}

impl Issue {
    pub fn new(
        title: impl Into<String>,
        category: Category,
        source: impl Into<String>,
        page: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: String::new(),
            severity,
            priority: severity,
            category,
            source: source.into(),
            impact: String::new(),
            page: page.into(),
            screenshot: None,
            additional_screenshots: Vec::new(),
            screenshot_section: None,
            wcag_criterion: None,
            fix: None,
            difficulty: None,
            scope: Some(Scope::Page),
            metadata: None,
            merged_from_count: 1,
            merged_sources: Vec::new(),
            merged_issue_ids: Vec::new(),
            deduplication_reason: None,
            severity_reason: None,
            appears_on: None,
            rank: None,
            reasoning: None,
            rejected: None,
            rejection_reason: None,
        }
    }

    /// Lowercased, whitespace-collapsed, punctuation-stripped title, used
    /// as the dedup/context-accumulator join key.
    pub fn normalized_title(&self) -> String {
        normalize_title(&self.title)
    }
}

/// lowercase, strip non-word chars, collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    let lower = title.to_ascii_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut last_was_space = false;
    for ch in lower.chars() {
        if ch.is_alphanumeric() {
            out.push(ch);
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim().to_string()
}

/// Per-category score plus issues/positives for one analyzer invocation.
///
/// Invariant: on any analyzer failure, the result is still well-formed —
/// score 50, empty issues, `meta.error` set. Downstream stages never fail
/// because a single analyzer did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerResult {
    pub score: f32,
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub positives: Vec<String>,
    #[serde(default)]
    pub quick_wins: Vec<String>,
    pub meta: AnalyzerMeta,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzerMeta {
    pub analyzer: String,
    pub disabled: bool,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Neutral score used whenever an analyzer is disabled or failed.
pub const NEUTRAL_SCORE: f32 = 50.0;

impl AnalyzerResult {
    /// Build the fixed-shape result a disabled analyzer reports.
    pub fn disabled(analyzer: impl Into<String>) -> Self {
        let analyzer = analyzer.into();
        Self {
            score: NEUTRAL_SCORE,
            issues: Vec::new(),
            positives: Vec::new(),
            quick_wins: Vec::new(),
            meta: AnalyzerMeta {
                analyzer: analyzer.clone(),
                disabled: true,
                message: Some(format!("{analyzer} analyzer disabled by configuration")),
                error: None,
            },
        }
    }

    /// Build the fixed-shape result substituted when an analyzer panics
    /// or returns an error (`DegradedAnalyzerError`).
    pub fn degraded(analyzer: impl Into<String>, reason: impl Into<String>) -> Self {
        let analyzer = analyzer.into();
        Self {
            score: NEUTRAL_SCORE,
            issues: Vec::new(),
            positives: Vec::new(),
            quick_wins: Vec::new(),
            meta: AnalyzerMeta {
                analyzer,
                disabled: false,
                message: None,
                error: Some(reason.into()),
            },
        }
    }

    pub fn is_well_formed(&self) -> bool {
        (0.0..=100.0).contains(&self.score)
    }
}

/// Letter grade derived from the overall score by threshold bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_score(score: f32) -> Self {
        if score >= 90.0 {
            Grade::A
        } else if score >= 80.0 {
            Grade::B
        } else if score >= 70.0 {
            Grade::C
        } else if score >= 60.0 {
            Grade::D
        } else {
            Grade::F
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerCategoryScores {
    pub design: f32,
    pub seo: f32,
    pub performance: f32,
    pub content: f32,
    pub accessibility: f32,
    pub social: f32,
}

impl PerCategoryScores {
    pub fn all_in_bounds(&self) -> bool {
        [
            self.design,
            self.seo,
            self.performance,
            self.content,
            self.accessibility,
            self.social,
        ]
        .iter()
        .all(|s| (0.0..=100.0).contains(s))
    }
}

/// Metadata attached to the final `AnalysisResult`, tracking what each
/// stage did — which analyzers were disabled, whether unified mode was
/// used, and similar run-shape facts useful for observability and tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub analyzers_disabled: Vec<String>,
    pub used_unified_technical: bool,
    pub used_unified_visual: bool,
    pub validation: Option<crate::vision::ValidationMetadata>,
    pub dedup: Option<crate::dedup::DedupStats>,
    pub ranking: Option<crate::rank::RankingStats>,
}

/// The final, graded output of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub per_category_scores: PerCategoryScores,
    pub overall_score: f32,
    pub grade: Grade,
    pub issues: Vec<Issue>,
    pub top_issues: Vec<Issue>,
    pub metadata: AnalysisMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_bump_saturates_at_critical() {
        assert_eq!(Severity::Critical.bump(), Severity::Critical);
        assert_eq!(Severity::Low.bump(), Severity::Medium);
    }

    #[test]
    fn normalize_title_collapses_whitespace_and_punctuation() {
        assert_eq!(
            normalize_title("Missing Alt-Text!! on  33% of images."),
            "missing alt text on 33 of images"
        );
    }

    #[test]
    fn normalizing_a_normalized_title_is_identity() {
        let once = normalize_title("Missing Alt-Text!!");
        let twice = normalize_title(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn grade_bands() {
        assert_eq!(Grade::from_score(95.0), Grade::A);
        assert_eq!(Grade::from_score(85.0), Grade::B);
        assert_eq!(Grade::from_score(75.0), Grade::C);
        assert_eq!(Grade::from_score(65.0), Grade::D);
        assert_eq!(Grade::from_score(10.0), Grade::F);
    }

    #[test]
    fn disabled_result_is_neutral_and_well_formed() {
        let r = AnalyzerResult::disabled("seo");
        assert_eq!(r.score, 50.0);
        assert!(r.issues.is_empty());
        assert!(r.meta.disabled);
        assert!(r.is_well_formed());
    }
}
