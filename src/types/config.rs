//! Pipeline configuration — analyzer toggles, validation thresholds, and
//! crawl limits.
//!
//! Plain structs with `Default` plus consuming `with_*` builder methods,
//! and a `from_env()` constructor that reads the same field names as
//! environment variables.

use serde::{Deserialize, Serialize};

/// Which of the six analyzers should run, and whether a pair of them
/// should be collapsed into a single "unified" model call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerToggles {
    pub enable_seo_analyzer: bool,
    pub enable_content_analyzer: bool,
    pub enable_visual_analyzer: bool,
    pub enable_social_analyzer: bool,
    pub enable_accessibility_analyzer: bool,

    /// Collapse desktop+mobile visual analysis into one model call that
    /// returns both viewports' issues in a single response.
    pub use_unified_visual_analyzer: bool,
    /// Collapse SEO+content analysis into one model call.
    pub use_unified_technical_analyzer: bool,
}

impl Default for AnalyzerToggles {
    fn default() -> Self {
        Self {
            enable_seo_analyzer: true,
            enable_content_analyzer: true,
            enable_visual_analyzer: true,
            enable_social_analyzer: true,
            enable_accessibility_analyzer: true,
            use_unified_visual_analyzer: false,
            use_unified_technical_analyzer: false,
        }
    }
}

/// Vision-validation and top-issue-ranking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub enable_qa_validation: bool,
    pub max_issues_to_validate: usize,
    /// Issues whose validator confidence is below this are rejected.
    pub validation_confidence_threshold: f32,
    /// Skip running the vision validator at all on issues the
    /// `ArtifactDetector` already flagged as low-confidence.
    pub skip_low_confidence_artifacts: bool,
    /// Only issues at or above this severity are eligible for
    /// `TopIssueRanker` consideration.
    pub top_issues_severity_filter: crate::types::issue::Severity,
    /// Model identifier used for the dedup merge call.
    pub deduplication_model: String,
    pub use_ai_grading: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enable_qa_validation: true,
            max_issues_to_validate: 20,
            validation_confidence_threshold: 0.6,
            skip_low_confidence_artifacts: true,
            top_issues_severity_filter: crate::types::issue::Severity::Medium,
            deduplication_model: "default".to_string(),
            use_ai_grading: true,
        }
    }
}

/// Configuration for the Crawler stage (C5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Number of pages fetched concurrently.
    pub concurrency: usize,
    /// Per-page fetch+capture timeout.
    pub page_timeout_secs: u64,
    pub respect_robots: bool,
    /// Hard ceiling on pages fetched regardless of selection size.
    pub max_pages: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            page_timeout_secs: 30,
            respect_robots: true,
            max_pages: 25,
        }
    }
}

impl CrawlConfig {
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    pub fn with_page_timeout_secs(mut self, secs: u64) -> Self {
        self.page_timeout_secs = secs;
        self
    }

    pub fn with_max_pages(mut self, n: usize) -> Self {
        self.max_pages = n;
        self
    }

    pub fn ignore_robots(mut self) -> Self {
        self.respect_robots = false;
        self
    }
}

/// Business-context hints supplied by the caller (or inferred by the
/// crawler's business-intelligence heuristics) to steer the PageSelector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusinessContext {
    pub industry: Option<String>,
    pub company_name: Option<String>,
    #[serde(default)]
    pub known_competitors: Vec<String>,
}

/// Top-level configuration for a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub analyzers: AnalyzerToggles,
    pub validation: ValidationConfig,
    pub crawl: CrawlConfig,
    pub business_context: BusinessContext,
    /// Directory backup records are written under.
    pub backup_dir: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            analyzers: AnalyzerToggles::default(),
            validation: ValidationConfig::default(),
            crawl: CrawlConfig::default(),
            business_context: BusinessContext::default(),
            backup_dir: "./backups".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backup_dir(mut self, dir: impl Into<String>) -> Self {
        self.backup_dir = dir.into();
        self
    }

    /// Build a config from environment variables, falling back to
    /// defaults for anything unset or unparseable. Reads the same flag
    /// names the enumerated toggles are named after (e.g.
    /// `ENABLE_SEO_ANALYZER=false`, `MAX_ISSUES_TO_VALIDATE=30`).
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.analyzers.enable_seo_analyzer = env_bool("ENABLE_SEO_ANALYZER", cfg.analyzers.enable_seo_analyzer);
        cfg.analyzers.enable_content_analyzer =
            env_bool("ENABLE_CONTENT_ANALYZER", cfg.analyzers.enable_content_analyzer);
        cfg.analyzers.enable_visual_analyzer =
            env_bool("ENABLE_VISUAL_ANALYZER", cfg.analyzers.enable_visual_analyzer);
        cfg.analyzers.enable_social_analyzer =
            env_bool("ENABLE_SOCIAL_ANALYZER", cfg.analyzers.enable_social_analyzer);
        cfg.analyzers.enable_accessibility_analyzer = env_bool(
            "ENABLE_ACCESSIBILITY_ANALYZER",
            cfg.analyzers.enable_accessibility_analyzer,
        );
        cfg.analyzers.use_unified_visual_analyzer = env_bool(
            "USE_UNIFIED_VISUAL_ANALYZER",
            cfg.analyzers.use_unified_visual_analyzer,
        );
        cfg.analyzers.use_unified_technical_analyzer = env_bool(
            "USE_UNIFIED_TECHNICAL_ANALYZER",
            cfg.analyzers.use_unified_technical_analyzer,
        );

        cfg.validation.enable_qa_validation =
            env_bool("ENABLE_QA_VALIDATION", cfg.validation.enable_qa_validation);
        cfg.validation.max_issues_to_validate =
            env_usize("MAX_ISSUES_TO_VALIDATE", cfg.validation.max_issues_to_validate);
        cfg.validation.validation_confidence_threshold = env_f32(
            "VALIDATION_CONFIDENCE_THRESHOLD",
            cfg.validation.validation_confidence_threshold,
        );
        cfg.validation.skip_low_confidence_artifacts = env_bool(
            "SKIP_LOW_CONFIDENCE_ARTIFACTS",
            cfg.validation.skip_low_confidence_artifacts,
        );
        if let Ok(model) = std::env::var("DEDUPLICATION_MODEL") {
            cfg.validation.deduplication_model = model;
        }
        cfg.validation.use_ai_grading = env_bool("USE_AI_GRADING", cfg.validation.use_ai_grading);

        cfg
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<f32>().ok())
        .unwrap_or(default)
}
