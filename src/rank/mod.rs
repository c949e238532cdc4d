//! Severity-filtered, AI-ranked top-issue selection (C11), with a
//! rule-based fallback and a post-AI safety dedup pass that is
//! deliberately independent of the `ContextAccumulator`'s duplicate check:
//! Levenshtein-normalized similarity here, Jaccard token-overlap there —
//! the two thresholds happen to share the value 0.7 but are not the same
//! function.

use serde::{Deserialize, Serialize};

use crate::error::RecoverableAIError;
use crate::traits::model::{ModelProvider, ModelRequest};
use crate::types::config::BusinessContext;
use crate::types::issue::{Issue, Severity};

const SAFETY_DEDUP_THRESHOLD: f32 = 0.7;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankingStats {
    pub ai_used: bool,
    pub candidates_considered: usize,
    pub excluded_count: usize,
    pub duplicates_collapsed: usize,
    pub selection_strategy: Option<String>,
    pub reasoning: String,
}

#[derive(Debug, Deserialize)]
struct RankEntry {
    #[serde(rename = "issueId")]
    issue_id: String,
    rank: u32,
    reasoning: String,
}

#[derive(Debug, Deserialize)]
struct RankResponse {
    #[serde(rename = "topIssues")]
    top_issues: Vec<RankEntry>,
    #[serde(rename = "excludedCount")]
    excluded_count: usize,
    #[serde(rename = "selectionStrategy")]
    selection_strategy: String,
}

pub struct TopIssueRanker<'a> {
    model: &'a dyn ModelProvider,
    severity_filter: Vec<Severity>,
}

impl<'a> TopIssueRanker<'a> {
    pub fn new(model: &'a dyn ModelProvider, severity_filter: Vec<Severity>) -> Self {
        Self { model, severity_filter }
    }

    pub async fn rank(&self, issues: &[Issue], business_context: &BusinessContext, limit: usize) -> (Vec<Issue>, RankingStats) {
        let filtered: Vec<Issue> = issues
            .iter()
            .filter(|i| self.severity_filter.contains(&i.severity))
            .cloned()
            .collect();

        if filtered.len() <= limit {
            let mut ranked = filtered;
            sort_by_severity_then_priority(&mut ranked);
            for (idx, issue) in ranked.iter_mut().enumerate() {
                issue.rank = Some(idx as u32 + 1);
                issue.reasoning = Some("within limit, no filtering needed".to_string());
            }
            let stats = RankingStats {
                ai_used: false,
                candidates_considered: ranked.len(),
                excluded_count: 0,
                duplicates_collapsed: 0,
                selection_strategy: None,
                reasoning: "within limit, no filtering needed".to_string(),
            };
            return (ranked, stats);
        }

        match self.rank_via_model(&filtered, business_context).await {
            Ok((mut ranked, excluded_count, strategy)) => {
                let before = ranked.len();
                dedup_by_title_similarity(&mut ranked);
                let duplicates_collapsed = before - ranked.len();
                ranked.truncate(limit);
                reassign_ranks(&mut ranked);
                let stats = RankingStats {
                    ai_used: true,
                    candidates_considered: filtered.len(),
                    excluded_count,
                    duplicates_collapsed,
                    selection_strategy: Some(strategy),
                    reasoning: "AI-ranked with post-dedup safety pass".to_string(),
                };
                (ranked, stats)
            }
            Err(e) => {
                tracing::warn!(error = %e, "top-issue ranker AI call failed, using severity/priority fallback");
                let mut ranked = filtered;
                sort_by_severity_then_priority(&mut ranked);
                dedup_by_title_similarity(&mut ranked);
                ranked.truncate(limit);
                reassign_ranks(&mut ranked);
                let stats = RankingStats {
                    ai_used: false,
                    candidates_considered: ranked.len(),
                    excluded_count: 0,
                    duplicates_collapsed: 0,
                    selection_strategy: Some("severity-then-priority fallback".to_string()),
                    reasoning: format!("AI ranking failed: {e}"),
                };
                (ranked, stats)
            }
        }
    }

    async fn rank_via_model(
        &self,
        filtered: &[Issue],
        business_context: &BusinessContext,
    ) -> Result<(Vec<Issue>, usize, String), RecoverableAIError> {
        let payload = serde_json::to_value(filtered)
            .map_err(|e| RecoverableAIError(format!("failed to serialize issues for ranking: {e}")))?;
        let prompt = format!(
            "rank the most impactful issues for industry={:?}: {payload}",
            business_context.industry
        );
        let response = self.model.call(ModelRequest::new(prompt)).await?;
        let parsed = response
            .parsed
            .ok_or_else(|| RecoverableAIError("ranker response was not JSON".to_string()))?;
        let parsed: RankResponse = serde_json::from_value(parsed)
            .map_err(|e| RecoverableAIError(format!("ranker response did not match schema: {e}")))?;

        let mut by_id: std::collections::HashMap<&str, &Issue> =
            filtered.iter().map(|i| (i.id.as_str(), i)).collect();

        let mut ranked = Vec::new();
        let mut entries = parsed.top_issues;
        entries.sort_by_key(|e| e.rank);
        for entry in entries {
            if let Some(issue) = by_id.remove(entry.issue_id.as_str()) {
                let mut issue = issue.clone();
                issue.rank = Some(entry.rank);
                issue.reasoning = Some(entry.reasoning);
                ranked.push(issue);
            } else {
                tracing::warn!(issue_id = %entry.issue_id, "ranker referenced unknown issue id, skipping");
            }
        }

        Ok((ranked, parsed.excluded_count, parsed.selection_strategy))
    }
}

fn sort_by_severity_then_priority(issues: &mut [Issue]) {
    issues.sort_by(|a, b| b.severity.cmp(&a.severity).then(b.priority.cmp(&a.priority)));
}

fn reassign_ranks(issues: &mut [Issue]) {
    for (idx, issue) in issues.iter_mut().enumerate() {
        issue.rank = Some(idx as u32 + 1);
    }
}

/// Pairwise Levenshtein-normalized title similarity; collapses any pair
/// at/above `SAFETY_DEDUP_THRESHOLD`, preferring (a) the title containing
/// digits, then (b) the longer title.
fn dedup_by_title_similarity(issues: &mut Vec<Issue>) {
    let mut kept: Vec<Issue> = Vec::with_capacity(issues.len());

    'outer: for candidate in issues.drain(..) {
        for existing in kept.iter_mut() {
            if title_similarity(&candidate.title, &existing.title) >= SAFETY_DEDUP_THRESHOLD {
                if prefer_a_over_b(&candidate.title, &existing.title) {
                    *existing = candidate;
                }
                continue 'outer;
            }
        }
        kept.push(candidate);
    }

    *issues = kept;
}

fn prefer_a_over_b(a: &str, b: &str) -> bool {
    let a_has_digits = a.chars().any(|c| c.is_ascii_digit());
    let b_has_digits = b.chars().any(|c| c.is_ascii_digit());
    if a_has_digits != b_has_digits {
        return a_has_digits;
    }
    a.len() > b.len()
}

fn title_similarity(a: &str, b: &str) -> f32 {
    let a = a.to_ascii_lowercase();
    let b = b.to_ascii_lowercase();
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = edit_distance::edit_distance(&a, &b);
    1.0 - (distance as f32 / max_len as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockModelProvider;
    use crate::types::issue::Category;

    fn issue(id: &str, title: &str, severity: Severity) -> Issue {
        let mut i = Issue::new(title, Category::Seo, "seo", "/", severity);
        i.id = id.to_string();
        i
    }

    #[tokio::test]
    async fn within_limit_skips_ai_and_sorts_by_severity() {
        let model = MockModelProvider::new();
        let ranker = TopIssueRanker::new(&model, vec![Severity::Critical, Severity::High]);
        let issues = vec![issue("a", "x", Severity::High), issue("b", "y", Severity::Critical)];
        let (ranked, stats) = ranker.rank(&issues, &BusinessContext::default(), 5).await;
        assert!(!stats.ai_used);
        assert_eq!(ranked[0].id, "b");
        assert_eq!(ranked[0].rank, Some(1));
    }

    #[tokio::test]
    async fn over_limit_uses_ai_ranking() {
        let model = MockModelProvider::new().with_json_response(serde_json::json!({
            "topIssues": [
                {"issueId": "c", "rank": 1, "reasoning": "most critical"},
                {"issueId": "a", "rank": 2, "reasoning": "second"}
            ],
            "excludedCount": 1,
            "selectionStrategy": "impact-weighted"
        }));
        let ranker = TopIssueRanker::new(&model, vec![Severity::Critical, Severity::High]);
        let issues = vec![
            issue("a", "Missing alt text", Severity::High),
            issue("b", "Slow page load", Severity::High),
            issue("c", "Broken checkout flow", Severity::Critical),
        ];
        let (ranked, stats) = ranker.rank(&issues, &BusinessContext::default(), 2).await;
        assert!(stats.ai_used);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, "c");
    }

    #[tokio::test]
    async fn ai_error_falls_back_to_severity_sort() {
        let model = MockModelProvider::new().always_error();
        let ranker = TopIssueRanker::new(&model, vec![Severity::Critical, Severity::High]);
        let issues = vec![
            issue("a", "x", Severity::High),
            issue("b", "y", Severity::Critical),
            issue("c", "z", Severity::High),
        ];
        let (ranked, stats) = ranker.rank(&issues, &BusinessContext::default(), 2).await;
        assert!(!stats.ai_used);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, "b");
    }

    #[test]
    fn dedup_collapses_similar_titles_preferring_digits() {
        let mut issues = vec![
            issue("a", "Missing alt text on images", Severity::High),
            issue("b", "Missing alt text on 33% of images", Severity::High),
        ];
        dedup_by_title_similarity(&mut issues);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].id, "b");
    }

    #[test]
    fn no_two_survivors_exceed_similarity_threshold() {
        let mut issues = vec![
            issue("a", "Missing alt text on images", Severity::High),
            issue("b", "Missing alt text on pictures", Severity::High),
            issue("c", "Slow largest contentful paint", Severity::Medium),
        ];
        dedup_by_title_similarity(&mut issues);
        for i in 0..issues.len() {
            for j in (i + 1)..issues.len() {
                assert!(title_similarity(&issues[i].title, &issues[j].title) < SAFETY_DEDUP_THRESHOLD);
            }
        }
    }
}
