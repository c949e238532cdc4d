//! Rule-based screenshot-artifact pre-classifier (C8), run before the
//! expensive vision-model call in C9. Pure function over an issue's
//! title/description/category/keywords; never fails.

use crate::types::issue::{Category, Issue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactType {
    ViewportClipping,
    LazyLoadDuplication,
    PartialPaint,
}

impl ArtifactType {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactType::ViewportClipping => "viewport_clipping",
            ArtifactType::LazyLoadDuplication => "lazy_load_duplication",
            ArtifactType::PartialPaint => "partial_paint",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactVerdict {
    pub is_potential_artifact: bool,
    /// 0.0-1.0.
    pub confidence: f32,
    pub artifact_type: Option<ArtifactType>,
    pub reasoning: String,
}

struct Rule {
    artifact_type: ArtifactType,
    phrases: &'static [&'static str],
    confidence: f32,
}

const RULES: &[Rule] = &[
    Rule {
        artifact_type: ArtifactType::ViewportClipping,
        phrases: &["cut off at edge", "clipped at viewport", "content cut off", "edge of screen"],
        confidence: 0.85,
    },
    Rule {
        artifact_type: ArtifactType::LazyLoadDuplication,
        phrases: &["duplicate hero", "image appears twice", "duplicated image", "repeated hero"],
        confidence: 0.9,
    },
    Rule {
        artifact_type: ArtifactType::PartialPaint,
        phrases: &["half rendered", "partially loaded", "blank section", "flash of unstyled"],
        confidence: 0.8,
    },
];

/// Inspect an issue's title/description/keywords for known rendering
/// artifact phrasing. Visual-category issues only — non-visual issues
/// never carry screenshot evidence worth second-guessing this way.
pub fn detect(issue: &Issue) -> ArtifactVerdict {
    if !matches!(issue.category, Category::DesktopVisual | Category::MobileVisual) {
        return ArtifactVerdict {
            is_potential_artifact: false,
            confidence: 0.0,
            artifact_type: None,
            reasoning: "not a visual-category issue".to_string(),
        };
    }

    let haystack = {
        let mut s = format!("{} {}", issue.title, issue.description).to_lowercase();
        if let Some(meta) = &issue.metadata {
            s.push(' ');
            s.push_str(&meta.keywords.join(" ").to_lowercase());
        }
        s
    };

    let mut best: Option<(&Rule, &str)> = None;
    for rule in RULES {
        for phrase in rule.phrases {
            if haystack.contains(phrase) {
                if best.map(|(r, _)| rule.confidence > r.confidence).unwrap_or(true) {
                    best = Some((rule, phrase));
                }
            }
        }
    }

    match best {
        Some((rule, phrase)) => ArtifactVerdict {
            is_potential_artifact: true,
            confidence: rule.confidence,
            artifact_type: Some(rule.artifact_type),
            reasoning: format!("matched known artifact phrasing \"{phrase}\""),
        },
        None => ArtifactVerdict {
            is_potential_artifact: false,
            confidence: 0.0,
            artifact_type: None,
            reasoning: "no known artifact phrasing found".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::issue::Severity;

    fn visual_issue(title: &str) -> Issue {
        Issue::new(title, Category::DesktopVisual, "visual", "/", Severity::Medium)
    }

    #[test]
    fn detects_viewport_clipping() {
        let issue = visual_issue("Hero image cut off at edge of screen on desktop");
        let verdict = detect(&issue);
        assert!(verdict.is_potential_artifact);
        assert!(verdict.confidence >= 0.8);
        assert_eq!(verdict.artifact_type, Some(ArtifactType::ViewportClipping));
    }

    #[test]
    fn non_visual_category_is_never_an_artifact() {
        let issue = Issue::new("Missing alt text", Category::Seo, "seo", "/", Severity::Medium);
        let verdict = detect(&issue);
        assert!(!verdict.is_potential_artifact);
    }

    #[test]
    fn unrelated_text_is_not_an_artifact() {
        let issue = visual_issue("Color contrast too low on call-to-action button");
        let verdict = detect(&issue);
        assert!(!verdict.is_potential_artifact);
    }
}
