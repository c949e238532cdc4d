//! Cross-analyzer, cross-page issue deduplication (C10).
//!
//! Calls the AI provider once with the full issue set and a dedup
//! instruction; enrichment (screenshot/severity/source merging) happens
//! locally afterward so it is deterministic and independently testable.
//! On a short input (≤1 issue) or any AI failure, the deduper returns the
//! original issues untouched so the pipeline still produces a report.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::RecoverableAIError;
use crate::traits::model::{ModelProvider, ModelRequest};
use crate::types::issue::{Issue, Severity};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedupStats {
    pub input_count: usize,
    pub output_count: usize,
    pub reduction_percentage: f32,
    pub groups_formed: usize,
    pub groups_dropped: usize,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DedupGroup {
    #[serde(rename = "primaryIssueId")]
    #[allow(dead_code)]
    primary_issue_id: String,
    #[serde(rename = "mergedIssues")]
    merged_issues: Vec<String>,
    title: String,
    description: String,
    impact: Option<String>,
    #[serde(rename = "mergeReason")]
    merge_reason: String,
}

#[derive(Debug, Deserialize)]
struct DedupResponse {
    groups: Vec<DedupGroup>,
}

pub struct IssueDeduper<'a> {
    model: &'a dyn ModelProvider,
}

impl<'a> IssueDeduper<'a> {
    pub fn new(model: &'a dyn ModelProvider) -> Self {
        Self { model }
    }

    pub async fn dedupe(&self, issues: Vec<Issue>) -> (Vec<Issue>, DedupStats) {
        let input_count = issues.len();

        if input_count <= 1 {
            return (
                issues,
                DedupStats {
                    input_count,
                    output_count: input_count,
                    reduction_percentage: 0.0,
                    groups_formed: 0,
                    groups_dropped: 0,
                    error: None,
                },
            );
        }

        match self.dedupe_via_model(&issues).await {
            Ok((merged, groups_formed, groups_dropped)) => {
                let output_count = merged.len();
                let reduction_percentage = if input_count > 0 {
                    100.0 * (1.0 - output_count as f32 / input_count as f32)
                } else {
                    0.0
                };
                (
                    merged,
                    DedupStats {
                        input_count,
                        output_count,
                        reduction_percentage,
                        groups_formed,
                        groups_dropped,
                        error: None,
                    },
                )
            }
            Err(e) => {
                tracing::warn!(error = %e, "issue dedup AI call failed, returning issues untouched");
                (
                    issues,
                    DedupStats {
                        input_count,
                        output_count: input_count,
                        reduction_percentage: 0.0,
                        groups_formed: 0,
                        groups_dropped: 0,
                        error: Some(e.0),
                    },
                )
            }
        }
    }

    async fn dedupe_via_model(&self, issues: &[Issue]) -> Result<(Vec<Issue>, usize, usize), RecoverableAIError> {
        let payload = serde_json::to_value(issues)
            .map_err(|e| RecoverableAIError(format!("failed to serialize issues for dedup: {e}")))?;
        let prompt = format!(
            "deduplicate same-root-cause issues across analyzers/pages, merge cross-device and \
             quantified-vs-generic duplicates, preserve all screenshot/source/wcag metadata: {payload}"
        );
        let response = self.model.call(ModelRequest::new(prompt)).await?;
        let parsed = response
            .parsed
            .ok_or_else(|| RecoverableAIError("dedup response was not JSON".to_string()))?;
        let parsed: DedupResponse = serde_json::from_value(parsed)
            .map_err(|e| RecoverableAIError(format!("dedup response did not match schema: {e}")))?;

        let by_id: HashMap<&str, &Issue> = issues.iter().map(|i| (i.id.as_str(), i)).collect();
        let mut consumed: HashSet<String> = HashSet::new();
        let mut merged_issues = Vec::new();
        let mut groups_dropped = 0usize;

        for group in &parsed.groups {
            let originals: Vec<&Issue> = group
                .merged_issues
                .iter()
                .filter_map(|id| by_id.get(id.as_str()).copied())
                .collect();

            if originals.is_empty() {
                tracing::warn!(group_title = %group.title, "dedup group referenced no known issue ids, dropping");
                groups_dropped += 1;
                continue;
            }

            for original in &originals {
                consumed.insert(original.id.clone());
            }

            merged_issues.push(build_merged_issue(group, &originals));
        }

        // Anything the model didn't mention at all passes through as-is.
        for issue in issues {
            if !consumed.contains(&issue.id) {
                merged_issues.push(issue.clone());
            }
        }

        Ok((merged_issues, parsed.groups.len(), groups_dropped))
    }
}

fn build_merged_issue(group: &DedupGroup, originals: &[&Issue]) -> Issue {
    let base = originals[0];
    let mut merged = (*base).clone();

    merged.title = group.title.clone();
    merged.description = group.description.clone();
    if let Some(impact) = &group.impact {
        merged.impact = impact.clone();
    }

    let mut screenshots = originals.iter().filter_map(|i| i.screenshot.clone());
    merged.screenshot = screenshots.next();
    merged.additional_screenshots = screenshots.chain(originals.iter().flat_map(|i| i.additional_screenshots.clone().into_iter())).collect();

    merged.screenshot_section = originals.iter().find_map(|i| i.screenshot_section.clone());

    merged.severity = originals.iter().map(|i| i.severity).max().unwrap_or(Severity::Medium);
    merged.priority = originals.iter().map(|i| i.priority).max().unwrap_or(Severity::Medium);

    let mut sources: Vec<String> = originals.iter().map(|i| i.source.clone()).collect();
    sources.sort();
    sources.dedup();

    merged.merged_from_count = originals.len() as u32;
    merged.merged_sources = sources;
    merged.merged_issue_ids = originals.iter().map(|i| i.id.clone()).collect();
    merged.deduplication_reason = Some(group.merge_reason.clone());

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockModelProvider;
    use crate::types::issue::{Category, ScreenshotRef};
    use crate::types::page::ScreenshotRef as PageScreenshotRef;

    fn issue(id: &str, title: &str, source: &str, severity: Severity, screenshot: Option<&str>) -> Issue {
        let mut i = Issue::new(title, Category::Seo, source, "/", severity);
        i.id = id.to_string();
        i.screenshot = screenshot.map(|p| PageScreenshotRef::Path(p.to_string()));
        i
    }

    #[tokio::test]
    async fn single_issue_short_circuits() {
        let model = MockModelProvider::new();
        let deduper = IssueDeduper::new(&model);
        let (out, stats) = deduper.dedupe(vec![issue("1", "x", "seo", Severity::Low, None)]).await;
        assert_eq!(out.len(), 1);
        assert_eq!(stats.reduction_percentage, 0.0);
    }

    #[tokio::test]
    async fn merges_group_preserving_first_screenshot_and_max_severity() {
        let issues = vec![
            issue("a", "Missing alt text on 33% of images", "seo", Severity::High, None),
            issue("b", "Missing alt text on 33% of images", "accessibility", Severity::High, Some("shot1.png")),
            issue("c", "Missing alt text on 33% of images", "visual", Severity::Medium, Some("shot2.png")),
        ];

        let model = MockModelProvider::new().with_json_response(serde_json::json!({
            "groups": [{
                "primaryIssueId": "a",
                "mergedIssues": ["a", "b", "c"],
                "title": "Missing alt text on 33% of images",
                "description": "Multiple analyzers flagged missing alt text",
                "impact": "Screen readers cannot describe these images",
                "mergeReason": "same root cause across seo/accessibility/visual"
            }]
        }));

        let deduper = IssueDeduper::new(&model);
        let (out, stats) = deduper.dedupe(issues).await;

        assert_eq!(out.len(), 1);
        let merged = &out[0];
        assert_eq!(merged.merged_from_count, 3);
        assert_eq!(merged.severity, Severity::High);
        assert_eq!(merged.screenshot, Some(ScreenshotRef::Path("shot1.png".to_string())));
        assert_eq!(merged.merged_sources, vec!["accessibility".to_string(), "seo".to_string(), "visual".to_string()]);
        assert_eq!(stats.groups_formed, 1);
    }

    #[tokio::test]
    async fn unknown_id_group_is_dropped() {
        let issues = vec![issue("a", "x", "seo", Severity::Low, None)];
        let model = MockModelProvider::new().with_json_response(serde_json::json!({
            "groups": [{
                "primaryIssueId": "ghost",
                "mergedIssues": ["ghost", "also-ghost"],
                "title": "phantom",
                "description": "d",
                "impact": null,
                "mergeReason": "r"
            }]
        }));
        let deduper = IssueDeduper::new(&model);
        let (out, stats) = deduper.dedupe(issues).await;
        // The original untouched issue still passes through; the dropped
        // group contributes nothing.
        assert_eq!(out.len(), 1);
        assert_eq!(stats.groups_dropped, 1);
    }

    #[tokio::test]
    async fn ai_error_returns_issues_untouched() {
        let issues = vec![
            issue("a", "x", "seo", Severity::Low, None),
            issue("b", "y", "content", Severity::Low, None),
        ];
        let model = MockModelProvider::new().always_error();
        let deduper = IssueDeduper::new(&model);
        let (out, stats) = deduper.dedupe(issues).await;
        assert_eq!(out.len(), 2);
        assert!(stats.error.is_some());
    }
}
