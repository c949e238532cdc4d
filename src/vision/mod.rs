//! Vision-model screenshot-evidence validator (C9).
//!
//! Runs after the artifact pre-classifier (C8): cheap rule-based rejects
//! never touch the vision model at all. Every other visual issue with
//! screenshot evidence gets a verification call; any failure along the
//! way (I/O, parse, model) is treated as **verified** — the validator
//! must never silently drop a real finding because it misbehaved itself.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::artifact;
use crate::traits::model::{ImageAttachment, ModelProvider, ModelRequest};
use crate::types::issue::Issue;

/// Where to find the bytes for a given `screenshotNumbers` entry on an
/// issue's metadata.
#[derive(Debug, Clone)]
pub struct ScreenshotLocation {
    pub filepath: PathBuf,
    pub filename: String,
}

pub type ScreenshotMap = HashMap<u32, ScreenshotLocation>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    ArtifactDetected,
    LowConfidence,
}

impl RejectionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectionReason::ArtifactDetected => "artifact_detected",
            RejectionReason::LowConfidence => "low_confidence",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectionSummaryEntry {
    pub issue_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationMetadata {
    pub enabled: bool,
    pub total_issues_analyzed: usize,
    pub issues_validated: usize,
    pub verified: usize,
    pub rejected: usize,
    pub rejection_rate: f32,
    pub cost: f32,
    pub duration_ms: u64,
    pub confidence_threshold: f32,
    pub rejection_summary: Vec<RejectionSummaryEntry>,
}

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub enabled: bool,
    pub max_issues_to_validate: usize,
    pub confidence_threshold: f32,
    pub skip_low_confidence_artifacts: bool,
    /// Artifact-detector confidence at/above which a flagged issue is
    /// rejected without a model call, when `skip_low_confidence_artifacts`.
    pub artifact_skip_threshold: f32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_issues_to_validate: 50,
            confidence_threshold: 0.5,
            skip_low_confidence_artifacts: true,
            artifact_skip_threshold: 0.8,
        }
    }
}

#[derive(Debug, Deserialize)]
struct VisionResponse {
    verified: bool,
    confidence: f32,
    #[allow(dead_code)]
    evidence: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    potential_artifact: bool,
    #[allow(dead_code)]
    artifact_type: Option<String>,
    #[allow(dead_code)]
    reasoning: Option<String>,
}

/// Counts consecutive vision-call errors so a caller can build a circuit
/// breaker on top of the fail-open validator if it wants one — the
/// validator itself never refuses to run because of this counter.
#[derive(Default)]
pub struct HealthCounter {
    consecutive_errors: std::sync::atomic::AtomicU32,
}

impl HealthCounter {
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors.load(std::sync::atomic::Ordering::Relaxed)
    }

    fn record_success(&self) {
        self.consecutive_errors.store(0, std::sync::atomic::Ordering::Relaxed);
    }

    fn record_error(&self) {
        self.consecutive_errors.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }
}

pub struct VisionValidator<'a> {
    model: &'a dyn ModelProvider,
    config: ValidatorConfig,
    health: HealthCounter,
}

impl<'a> VisionValidator<'a> {
    pub fn new(model: &'a dyn ModelProvider, config: ValidatorConfig) -> Self {
        Self {
            model,
            config,
            health: HealthCounter::default(),
        }
    }

    pub fn health(&self) -> &HealthCounter {
        &self.health
    }

    /// Returns a filtered copy of `issues`: non-verified issues carrying
    /// metadata are dropped, everything else (including non-visual
    /// issues without metadata) passes through untouched. The input is
    /// never mutated.
    pub async fn validate(&self, issues: &[Issue], screenshots: &ScreenshotMap) -> (Vec<Issue>, ValidationMetadata) {
        let started = std::time::Instant::now();

        if !self.config.enabled {
            return (
                issues.to_vec(),
                ValidationMetadata {
                    enabled: false,
                    total_issues_analyzed: issues.len(),
                    ..Default::default()
                },
            );
        }

        let mut out = Vec::with_capacity(issues.len());
        let mut rejection_summary = Vec::new();
        let mut verified_count = 0usize;
        let mut rejected_count = 0usize;
        let mut validated = 0usize;
        let mut cost = 0.0f32;

        for issue in issues {
            let Some(metadata) = &issue.metadata else {
                // Non-visual issues (no metadata) are out of this
                // validator's remit; they pass through untouched.
                out.push(issue.clone());
                continue;
            };
            if metadata.screenshot_numbers.is_empty() {
                out.push(issue.clone());
                continue;
            }
            if validated >= self.config.max_issues_to_validate {
                out.push(issue.clone());
                continue;
            }
            validated += 1;

            let artifact_verdict = artifact::detect(issue);
            if self.config.skip_low_confidence_artifacts
                && artifact_verdict.is_potential_artifact
                && artifact_verdict.confidence >= self.config.artifact_skip_threshold
            {
                rejected_count += 1;
                rejection_summary.push(RejectionSummaryEntry {
                    issue_id: issue.id.clone(),
                    reason: RejectionReason::ArtifactDetected.as_str().to_string(),
                });
                continue;
            }

            match self.verify_with_model(issue, metadata.screenshot_numbers[0], screenshots).await {
                Ok((verified, call_cost)) => {
                    self.health.record_success();
                    cost += call_cost;
                    if verified {
                        verified_count += 1;
                        out.push(issue.clone());
                    } else {
                        rejected_count += 1;
                        rejection_summary.push(RejectionSummaryEntry {
                            issue_id: issue.id.clone(),
                            reason: RejectionReason::LowConfidence.as_str().to_string(),
                        });
                    }
                }
                Err(_) => {
                    // Fail-safe: any error (I/O, parse, transport) treats
                    // the issue as verified rather than dropping a real finding.
                    self.health.record_error();
                    verified_count += 1;
                    out.push(issue.clone());
                }
            }
        }

        let rejection_rate = if validated > 0 {
            rejected_count as f32 / validated as f32
        } else {
            0.0
        };

        let metadata = ValidationMetadata {
            enabled: true,
            total_issues_analyzed: issues.len(),
            issues_validated: validated,
            verified: verified_count,
            rejected: rejected_count,
            rejection_rate,
            cost,
            duration_ms: started.elapsed().as_millis() as u64,
            confidence_threshold: self.config.confidence_threshold,
            rejection_summary,
        };

        (out, metadata)
    }

    async fn verify_with_model(
        &self,
        issue: &Issue,
        screenshot_number: u32,
        screenshots: &ScreenshotMap,
    ) -> Result<(bool, f32), String> {
        let location = screenshots
            .get(&screenshot_number)
            .ok_or_else(|| format!("no screenshot registered for number {screenshot_number}"))?;

        let bytes = tokio::fs::read(&location.filepath)
            .await
            .map_err(|e| format!("failed to read {}: {e}", location.filepath.display()))?;
        let base64_data = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes);

        let request = ModelRequest::new(format!(
            "verify visual issue \"{}\" on page {} against the attached screenshot",
            issue.title, issue.page
        ))
        .with_image(ImageAttachment {
            base64_data,
            media_type: "image/png".to_string(),
        });

        let response = self.model.call(request).await.map_err(|e| e.0)?;
        let parsed = response
            .parsed
            .ok_or_else(|| "vision response was not JSON".to_string())?;
        let parsed: VisionResponse =
            serde_json::from_value(parsed).map_err(|e| format!("vision response did not match schema: {e}"))?;

        let verified = parsed.verified && parsed.confidence >= self.config.confidence_threshold;
        Ok((verified, 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockModelProvider;
    use crate::types::issue::{Category, IssueMetadata, Severity};

    fn visual_issue_with_screenshot(n: u32) -> Issue {
        let mut issue = Issue::new("Misaligned nav bar", Category::DesktopVisual, "visual", "/", Severity::Medium);
        issue.metadata = Some(IssueMetadata {
            screenshot_numbers: vec![n],
            ..Default::default()
        });
        issue
    }

    #[tokio::test]
    async fn issue_without_metadata_passes_through() {
        let model = MockModelProvider::new();
        let validator = VisionValidator::new(&model, ValidatorConfig::default());
        let issue = Issue::new("SEO title missing", Category::Seo, "seo", "/", Severity::Low);
        let (out, meta) = validator.validate(&[issue], &ScreenshotMap::new()).await;
        assert_eq!(out.len(), 1);
        assert_eq!(meta.issues_validated, 0);
    }

    #[tokio::test]
    async fn model_error_fails_open_and_counts_as_verified() {
        let model = MockModelProvider::new().always_error();
        let validator = VisionValidator::new(&model, ValidatorConfig::default());
        let issue = visual_issue_with_screenshot(1);
        let (out, meta) = validator.validate(&[issue], &ScreenshotMap::new()).await;
        assert_eq!(out.len(), 1, "issue must survive a validator error");
        assert_eq!(meta.verified, 1);
        assert_eq!(validator.health().consecutive_errors(), 1);
    }

    #[tokio::test]
    async fn confident_rejection_filters_the_issue_out() {
        let model = MockModelProvider::new().with_json_response(serde_json::json!({
            "verified": false,
            "confidence": 0.9,
            "evidence": "no misalignment visible",
            "potential_artifact": false
        }));
        let mut screenshots = ScreenshotMap::new();
        screenshots.insert(
            1,
            ScreenshotLocation {
                filepath: PathBuf::from("/dev/null"),
                filename: "shot.png".to_string(),
            },
        );
        let validator = VisionValidator::new(&model, ValidatorConfig::default());
        let issue = visual_issue_with_screenshot(1);
        let (out, meta) = validator.validate(&[issue], &screenshots).await;
        assert!(out.is_empty());
        assert_eq!(meta.rejected, 1);
    }

    #[tokio::test]
    async fn verified_high_confidence_passes_even_if_flagged_a_potential_artifact() {
        let model = MockModelProvider::new().with_json_response(serde_json::json!({
            "verified": true,
            "confidence": 0.95,
            "evidence": "misalignment visible",
            "potential_artifact": true
        }));
        let mut screenshots = ScreenshotMap::new();
        screenshots.insert(
            1,
            ScreenshotLocation {
                filepath: PathBuf::from("/dev/null"),
                filename: "shot.png".to_string(),
            },
        );
        let validator = VisionValidator::new(&model, ValidatorConfig::default());
        let issue = visual_issue_with_screenshot(1);
        let (out, meta) = validator.validate(&[issue], &screenshots).await;
        assert_eq!(out.len(), 1);
        assert_eq!(meta.verified, 1);
    }
}
