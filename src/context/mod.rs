//! Cross-page and cross-analyzer finding aggregation (C2).
//!
//! Pure in-memory, no I/O, never fails. Analyzers run in parallel within
//! the `AnalyzerRuntime` stage, so every mutating method is serialized
//! under a single mutex; readers take a snapshot copy rather than holding
//! the lock across an `await`. A plain `Mutex` rather than an `RwLock`,
//! since every access here mutates shared counters even on the "read"
//! path (checking for a duplicate also feeds pattern detection).

use std::sync::Mutex;

use indexmap::{IndexMap, IndexSet};

use crate::types::context::{ContextSnapshot, Pattern};
use crate::types::issue::{AnalyzerResult, Category, Issue, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateScope {
    Page,
    SiteWide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateAction {
    MergeOrSkip,
    Contextualize,
    None,
}

#[derive(Debug, Clone)]
pub struct DuplicateInfo {
    pub is_duplicate: bool,
    pub scope: DuplicateScope,
    pub action: DuplicateAction,
}

struct Inner {
    pages_analyzed: Vec<String>,
    issues_found: IndexMap<String, IndexSet<String>>,
    score_trends: IndexMap<String, Vec<f32>>,
    analyzer_results: IndexMap<String, AnalyzerResult>,
    patterns: Vec<Pattern>,
    shared_insights: Vec<String>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            pages_analyzed: Vec::new(),
            issues_found: IndexMap::new(),
            score_trends: IndexMap::new(),
            analyzer_results: IndexMap::new(),
            patterns: Vec::new(),
            shared_insights: Vec::new(),
        }
    }
}

/// Per-page findings to record via `add_page_context`.
pub struct PageContext<'a> {
    pub url: &'a str,
    pub issues: &'a [Issue],
    pub scores: &'a std::collections::HashMap<String, f32>,
}

pub struct ContextAccumulator {
    inner: Mutex<Inner>,
    cross_page: bool,
    cross_analyzer: bool,
}

impl ContextAccumulator {
    pub fn new(cross_page: bool, cross_analyzer: bool) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            cross_page,
            cross_analyzer,
        }
    }

    pub fn add_page_context(&self, ctx: PageContext<'_>) {
        if !self.cross_page {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.pages_analyzed.push(ctx.url.to_string());
        for issue in ctx.issues {
            inner
                .issues_found
                .entry(issue.category.as_str().to_string())
                .or_default()
                .insert(issue.normalized_title());
        }
        for (category, score) in ctx.scores {
            inner.score_trends.entry(category.clone()).or_default().push(*score);
        }
        detect_patterns(&mut inner);
    }

    pub fn add_analyzer_context(&self, analyzer: &str, result: &AnalyzerResult) {
        if !self.cross_analyzer {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.analyzer_results.insert(analyzer.to_string(), result.clone());

        let mut new_insights = Vec::new();
        let has_alt_text_issue = result
            .issues
            .iter()
            .any(|i| i.normalized_title().contains("alt text"));
        if analyzer == "visual" && has_alt_text_issue {
            new_insights
                .push("visual flagged image alt problems → relevant to seo and accessibility".to_string());
        }
        let has_heading_issue = result
            .issues
            .iter()
            .any(|i| i.normalized_title().contains("heading"));
        if analyzer == "seo" && has_heading_issue {
            new_insights.push("seo flagged heading structure → relevant to content and accessibility".to_string());
        }
        inner.shared_insights.extend(new_insights);
    }

    /// A read-only snapshot, safe to pass to analyzers as instructional
    /// context (never a live handle into the lock).
    pub fn snapshot(&self) -> ContextSnapshot {
        let inner = self.inner.lock().unwrap();
        ContextSnapshot {
            pages_analyzed: inner.pages_analyzed.clone(),
            issues_found: inner
                .issues_found
                .iter()
                .map(|(k, v)| (k.clone(), v.iter().cloned().collect()))
                .collect(),
            patterns: inner.patterns.clone(),
            score_trends: inner.score_trends.clone().into_iter().collect(),
            analyzer_results: inner.analyzer_results.clone().into_iter().collect(),
            shared_insights: inner.shared_insights.clone(),
        }
    }

    /// Normalized-title-based duplicate check. Exact match is always
    /// site-wide; ≥0.7 Jaccard token overlap is site-wide but merely
    /// "contextualize"; otherwise not a duplicate.
    pub fn check_duplicate_issue(&self, issue: &Issue) -> DuplicateInfo {
        let inner = self.inner.lock().unwrap();
        let normalized = issue.normalized_title();
        let category = issue.category.as_str();

        let Some(seen) = inner.issues_found.get(category) else {
            return DuplicateInfo {
                is_duplicate: false,
                scope: DuplicateScope::Page,
                action: DuplicateAction::None,
            };
        };

        if seen.contains(&normalized) {
            return DuplicateInfo {
                is_duplicate: true,
                scope: DuplicateScope::SiteWide,
                action: DuplicateAction::MergeOrSkip,
            };
        }

        let best_overlap = seen
            .iter()
            .map(|other| jaccard_token_overlap(&normalized, other))
            .fold(0.0_f32, f32::max);

        if best_overlap >= 0.7 {
            DuplicateInfo {
                is_duplicate: true,
                scope: DuplicateScope::SiteWide,
                action: DuplicateAction::Contextualize,
            }
        } else {
            DuplicateInfo {
                is_duplicate: false,
                scope: DuplicateScope::Page,
                action: DuplicateAction::None,
            }
        }
    }

    /// Bump severity one tier and annotate the issue when it recurs
    /// site-wide; a no-op for page-scoped duplicates.
    pub fn enhance_issue_with_context(&self, issue: &mut Issue, info: &DuplicateInfo) {
        if info.scope != DuplicateScope::SiteWide {
            return;
        }
        let pages_analyzed = self.inner.lock().unwrap().pages_analyzed.len();
        issue.severity = issue.severity.bump();
        issue.severity_reason = Some("recurs across multiple pages".to_string());
        issue.appears_on = Some(format!("{} pages", pages_analyzed + 1));
    }
}

fn jaccard_token_overlap(a: &str, b: &str) -> f32 {
    let set_a: std::collections::HashSet<&str> = a.split_whitespace().collect();
    let set_b: std::collections::HashSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

/// At ≥2 pages: flag a mobile-wide regression if the average mobile
/// score drops below 60, and flag design consistency by the variance of
/// desktop scores. Patterns are uniqued by their `description` prefix
/// (used here as the pattern "type").
fn detect_patterns(inner: &mut Inner) {
    if inner.pages_analyzed.len() < 2 {
        return;
    }

    let mut next_patterns: Vec<Pattern> = Vec::new();

    if let Some(mobile) = inner.score_trends.get(Category::MobileVisual.as_str()) {
        if !mobile.is_empty() {
            let avg = mobile.iter().sum::<f32>() / mobile.len() as f32;
            if avg < 60.0 {
                next_patterns.push(Pattern {
                    description: "site-wide-mobile-issues".to_string(),
                    occurrences: mobile.len() as u32,
                    pages: inner.pages_analyzed.clone(),
                });
            }
        }
    }

    if let Some(desktop) = inner.score_trends.get(Category::DesktopVisual.as_str()) {
        if desktop.len() >= 2 {
            let avg = desktop.iter().sum::<f32>() / desktop.len() as f32;
            let variance = desktop.iter().map(|s| (s - avg).powi(2)).sum::<f32>() / desktop.len() as f32;
            let description = if variance < 100.0 {
                Some("consistent-design-quality")
            } else if variance > 400.0 {
                Some("inconsistent-design-quality")
            } else {
                None
            };
            if let Some(description) = description {
                next_patterns.push(Pattern {
                    description: description.to_string(),
                    occurrences: desktop.len() as u32,
                    pages: inner.pages_analyzed.clone(),
                });
            }
        }
    }

    for pattern in next_patterns {
        if !inner.patterns.iter().any(|p| p.description == pattern.description) {
            inner.patterns.push(pattern);
        } else if let Some(existing) = inner.patterns.iter_mut().find(|p| p.description == pattern.description) {
            existing.occurrences = pattern.occurrences;
            existing.pages = pattern.pages;
        }
    }
}
