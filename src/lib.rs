//! # webaudit-core
//!
//! A pipeline for crawling a website and producing a graded, evidence-backed
//! audit of it: design, SEO, content, accessibility, and social presence,
//! scored and ranked against a weighted rubric, with an optional
//! benchmark-comparison mode against a pool of peer sites.
//!
//! ## Architecture
//!
//! ```text
//! DISCOVER → SELECT → CRAWL → ANALYZE → VALIDATE → DEDUPE → RANK → GRADE → PERSIST
//!
//! 1. Discoverer finds candidate URLs (sitemap, robots.txt, link fallback)
//! 2. PageSelector picks which pages feed which analyzer category
//! 3. Crawler captures HTML + dual-viewport screenshots + design tokens
//! 4. AnalyzerRuntime fans out six category analyzers over the crawl
//! 5. VisionValidator checks flagged issues against their screenshot evidence
//! 6. IssueDeduper merges near-duplicate issues across pages/analyzers
//! 7. TopIssueRanker produces a severity-ordered top-issue list
//! 8. Aggregator computes weighted category/overall scores and a letter grade
//! 9. The result is persisted to the caller's DataStore, with a local-first
//!    backup tier as a durability fallback
//! ```
//!
//! A secondary `Mode::Benchmark` run additionally matches the site against
//! a pool of peer sites via `BenchmarkMatcher` and enriches the graded
//! result with the comparison.
//!
//! ## Mechanism vs policy
//!
//! This crate owns the pipeline's control flow and domain types; it does
//! not own a browser, an AI provider, or a database. Callers implement
//! [`traits::browser::PageCapturer`], [`traits::model::ModelProvider`], and
//! [`traits::store::DataStore`] against their own infrastructure (a headless
//! browser pool, an LLM API, Postgres/SQLite/whatever) and hand them to
//! [`orchestrator::PipelineOrchestrator`].
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use webaudit_core::orchestrator::{Mode, PipelineOrchestrator};
//! use webaudit_core::registry::AnalyzerImpls;
//! use webaudit_core::types::config::PipelineConfig;
//!
//! let orchestrator = PipelineOrchestrator::new(
//!     &my_capturer,
//!     &my_model_provider,
//!     &my_data_store,
//!     PipelineConfig::from_env(),
//!     AnalyzerImpls::default(),
//! );
//!
//! let outcome = orchestrator.run("https://example.com", Mode::Grade, None).await?;
//! println!("{:?} — {}", outcome.analysis.grade, outcome.analysis.overall_score);
//! ```
//!
//! ## Modules
//!
//! - [`orchestrator`] — drives all nine stages end to end
//! - [`discover`] — sitemap/robots.txt/link-fallback URL discovery
//! - [`select`] — AI-assisted page-to-category selection
//! - [`crawl`] — HTML + screenshot + design-token capture
//! - [`registry`] / [`runtime`] — analyzer wiring and parallel fan-out
//! - [`context`] — cross-page/cross-analyzer shared context and dedup hints
//! - [`artifact`] — rule-based screenshot-artifact pre-classifier
//! - [`vision`] — screenshot-grounded issue validation
//! - [`dedup`] — cross-category issue deduplication
//! - [`rank`] — top-issue ranking
//! - [`grade`] — weighted scoring and letter grades
//! - [`benchmark`] — peer-site retrieval and AI-assisted matching
//! - [`backup`] — local-first durable persistence fallback
//! - [`ai`] — reference `ModelProvider`/`PromptLoader` implementations
//! - [`security`] — SSRF protection and credential handling
//! - [`traits`] — the external collaborator abstractions (browser/model/store)
//! - [`types`] — domain types shared across every stage
//! - [`testing`] — mock implementations for testing

pub mod artifact;
pub mod backup;
pub mod benchmark;
pub mod context;
pub mod crawl;
pub mod dedup;
pub mod discover;
pub mod error;
pub mod grade;
pub mod orchestrator;
pub mod rank;
pub mod registry;
pub mod runtime;
pub mod security;
pub mod select;
pub mod testing;
pub mod traits;
pub mod types;
pub mod vision;

pub mod ai;

pub use error::{Error, Result};
pub use orchestrator::{Mode, PipelineOrchestrator, RunOutcome};
pub use traits::{
    analyzer::{Analyzer, AnalyzerInput, UnifiedAnalyzer},
    browser::{CaptureOutput, PageCapturer, Viewport},
    model::{ImageAttachment, ModelProvider, ModelRequest, ModelResponse, PromptLoader},
    store::DataStore,
};
pub use types::{
    benchmark::{Benchmark, BenchmarkMatch, ComparisonTier},
    config::{AnalyzerToggles, BusinessContext, CrawlConfig, PipelineConfig, ValidationConfig},
    issue::{AnalysisResult, AnalyzerResult, Category, Grade, Issue, PerCategoryScores, Severity},
    page::{CrawlResult, Page},
    selection::PageSelection,
};
