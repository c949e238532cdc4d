//! Staged end-to-end pipeline execution (C13): discover → select → crawl
//! → analyze → validate → dedupe → rank → grade → persist, optionally
//! followed by benchmark matching instead of (or alongside) grading.
//!
//! Partial-failure policy: discover/crawl (stages 1/3) and persist
//! (stage 9) are fatal — the orchestrator returns `Err` and nothing is
//! reported. Validation/dedup/ranking (5-7) are recoverable: each stage
//! catches its own AI-call failures internally and degrades to a
//! documented fallback, so a failure there only shows up in the stage's
//! stats, never as an orchestrator error. Selection and analysis (4/8 in
//! the numbering above — selection and analyzer fan-out) can never fail
//! the run either, by construction: `PageSelector::select` always
//! returns a `PageSelection` and `AnalyzerRuntime::run` always returns
//! six results.

use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;

use crate::backup::BackupStore;
use crate::benchmark::BenchmarkMatcher;
use crate::context::ContextAccumulator;
use crate::crawl::Crawler;
use crate::dedup::IssueDeduper;
use crate::discover::Discoverer;
use crate::error::{CrawlError, Error};
use crate::grade::Aggregator;
use crate::rank::TopIssueRanker;
use crate::registry::{AnalyzerImpls, AnalyzerRegistry};
use crate::runtime::AnalyzerRuntime;
use crate::select::PageSelector;
use crate::traits::browser::PageCapturer;
use crate::traits::model::ModelProvider;
use crate::traits::store::DataStore;
use crate::types::benchmark::BenchmarkMatch;
use crate::types::config::PipelineConfig;
use crate::types::issue::AnalysisResult;
use crate::vision::{ScreenshotMap, ValidatorConfig, VisionValidator};

/// Which final product the orchestrator should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Weighted scoring against fixed/AI-supplied category weights.
    Grade,
    /// Comparison against a matched peer site instead of absolute grading.
    Benchmark,
}

/// `{step, message, progressFraction?}` emitted once per stage.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub step: &'static str,
    pub message: String,
    pub progress_fraction: Option<f32>,
}

pub type ProgressSink<'a> = dyn Fn(ProgressEvent) + Send + Sync + 'a;

pub struct PipelineOrchestrator<'a> {
    pub capturer: &'a dyn PageCapturer,
    pub model: &'a dyn ModelProvider,
    pub store: &'a dyn DataStore,
    pub config: PipelineConfig,
    pub analyzers: AnalyzerImpls<'a>,
    pub cancellation: CancellationToken,
}

pub struct RunOutcome {
    pub analysis: AnalysisResult,
    pub benchmark: Option<BenchmarkMatch>,
    pub benchmark_enrichment: Option<crate::grade::BenchmarkEnrichment>,
    pub backup_path: Option<std::path::PathBuf>,
}

impl<'a> PipelineOrchestrator<'a> {
    pub fn new(
        capturer: &'a dyn PageCapturer,
        model: &'a dyn ModelProvider,
        store: &'a dyn DataStore,
        config: PipelineConfig,
        analyzers: AnalyzerImpls<'a>,
    ) -> Self {
        Self {
            capturer,
            model,
            store,
            config,
            analyzers,
            cancellation: CancellationToken::new(),
        }
    }

    pub async fn run(&self, site_url: &str, mode: Mode, progress: Option<&ProgressSink<'_>>) -> Result<RunOutcome, Error> {
        if self.cancellation.is_cancelled() {
            return Err(Error::Crawl(CrawlError::NoPagesSucceeded));
        }

        // Stage 1: discover. Fatal on an empty result.
        if let Some(sink) = progress {
            sink(ProgressEvent {
                step: "discover",
                message: format!("discovering pages at {site_url}"),
                progress_fraction: Some(0.0),
            });
        }
        let discovery = Discoverer::new().discover(site_url).await;
        let discovered: BTreeSet<String> = discovery.urls.into_iter().collect();
        if discovered.is_empty() {
            return Err(Error::Crawl(CrawlError::NoPagesSucceeded));
        }

        self.run_from_discovered(site_url, discovered, mode, progress).await
    }

    /// Stages 2-9, taking an already-discovered URL set. Split out from
    /// `run` so the discovery stage's real network I/O doesn't have to be
    /// in the loop for exercising the rest of the pipeline.
    async fn run_from_discovered(
        &self,
        site_url: &str,
        discovered: BTreeSet<String>,
        mode: Mode,
        progress: Option<&ProgressSink<'_>>,
    ) -> Result<RunOutcome, Error> {
        let emit = |step: &'static str, message: String, fraction: Option<f32>| {
            if let Some(sink) = progress {
                sink(ProgressEvent {
                    step,
                    message,
                    progress_fraction: fraction,
                });
            }
        };

        // Stage 2: select.
        emit("select", "selecting pages per analyzer category".to_string(), Some(0.15));
        let selector = PageSelector::new(self.model);
        let selection = selector
            .select(&discovered, &self.config.business_context, self.config.crawl.max_pages)
            .await;

        if self.cancellation.is_cancelled() {
            return Err(Error::Crawl(CrawlError::NoPagesSucceeded));
        }

        // Stage 3: crawl. Fatal on failure.
        emit("crawl", "capturing pages".to_string(), Some(0.3));
        let urls: Vec<String> = selection.unique_pages().into_iter().collect();
        let crawler = Crawler::new(self.capturer, self.config.crawl.clone());
        let crawl_result = crawler.crawl(site_url, &urls, None).await.map_err(Error::Crawl)?;

        // Stage 4: analyze. Never fails by construction.
        emit("analyze", "running analyzers".to_string(), Some(0.5));
        let accumulator = ContextAccumulator::new(true, true);
        let plan = AnalyzerRegistry::resolve(&self.config.analyzers, &self.analyzers);
        let runtime = AnalyzerRuntime::new(Some(&accumulator), None);
        let per_category = runtime.run(&plan, &crawl_result.pages, &selection).await;
        let disabled = AnalyzerRegistry::disabled_categories(&plan);

        let all_issues: Vec<_> = per_category.iter().flat_map(|(_, r)| r.issues.clone()).collect();

        // Stage 5: validate. Recoverable — the validator fails open internally.
        emit("validate", "validating visual issues against screenshots".to_string(), Some(0.65));
        let screenshots = build_screenshot_map(&crawl_result.pages);
        let validator_config = ValidatorConfig {
            enabled: self.config.validation.enable_qa_validation,
            max_issues_to_validate: self.config.validation.max_issues_to_validate,
            confidence_threshold: self.config.validation.validation_confidence_threshold,
            skip_low_confidence_artifacts: self.config.validation.skip_low_confidence_artifacts,
            ..ValidatorConfig::default()
        };
        let validator = VisionValidator::new(self.model, validator_config);
        let (validated_issues, validation_meta) = validator.validate(&all_issues, &screenshots).await;

        // Stage 6: dedupe. Recoverable — returns input untouched on failure.
        emit("dedupe", "deduplicating cross-analyzer findings".to_string(), Some(0.75));
        let deduper = IssueDeduper::new(self.model);
        let (deduped_issues, dedup_stats) = deduper.dedupe(validated_issues).await;

        // Stage 7: rank. Recoverable — falls back to severity/priority sort.
        emit("rank", "selecting top issues".to_string(), Some(0.85));
        let ranker = TopIssueRanker::new(self.model, severity_filter_from(self.config.validation.top_issues_severity_filter));
        let (top_issues, ranking_stats) = ranker.rank(&deduped_issues, &self.config.business_context, 10).await;

        // Stage 8: grade or benchmark. Benchmark mode is `USE_AI_GRADING=false`
        // territory — the site is becoming a pool candidate, not being
        // graded, so it skips the weighted-grade path entirely.
        emit("grade", "scoring and grading".to_string(), Some(0.9));
        let aggregator = Aggregator::with_default_weights();
        let mut graded = match mode {
            Mode::Grade => aggregator.aggregate(&per_category),
            Mode::Benchmark => aggregator.ingest_for_benchmark(&per_category),
        };
        graded.issues = deduped_issues;

        let mut benchmark_enrichment = None;
        let benchmark_match = if mode == Mode::Benchmark {
            let matcher = BenchmarkMatcher::new(self.store, self.model, 20);
            let found = matcher.find_match(&self.config.business_context).await;
            graded = aggregator.enrich_with_benchmark(graded, found.as_ref());
            benchmark_enrichment = graded.benchmark.clone();
            found
        } else {
            None
        };

        let analysis = AnalysisResult {
            per_category_scores: graded.per_category_scores,
            overall_score: graded.overall_score,
            grade: graded.grade,
            issues: graded.issues,
            top_issues,
            metadata: crate::types::issue::AnalysisMetadata {
                analyzers_disabled: disabled.into_iter().map(|c| c.as_str().to_string()).collect(),
                used_unified_technical: plan.unified_technical.is_some(),
                used_unified_visual: plan.unified_visual.is_some(),
                validation: Some(validation_meta),
                dedup: Some(dedup_stats),
                ranking: Some(ranking_stats),
            },
        };

        // Stage 9: persist. Fatal only if both the store and the backup fail.
        emit("persist", "persisting results".to_string(), Some(0.95));
        let backup_path = self.persist(&analysis, site_url, mode).await?;

        emit("complete", "pipeline run complete".to_string(), Some(1.0));

        Ok(RunOutcome {
            analysis,
            benchmark: benchmark_match,
            benchmark_enrichment,
            backup_path,
        })
    }

    async fn persist(&self, analysis: &AnalysisResult, site_url: &str, mode: Mode) -> Result<Option<std::path::PathBuf>, Error> {
        let payload = serde_json::to_value(analysis)?;
        let backup = BackupStore::new(self.config.backup_dir.clone(), "webaudit");

        let store_result = match mode {
            Mode::Grade => self.store.save_lead(&payload).await,
            Mode::Benchmark => self.save_benchmark(analysis, site_url).await,
        };

        match store_result {
            Ok(()) => {
                let path = backup.save(site_url, payload, "results").await?;
                backup.mark_uploaded(&path).await?;
                Ok(Some(path))
            }
            Err(store_error) => match backup.save(site_url, payload, "results").await {
                Ok(path) => {
                    backup.mark_failed(&path, store_error.to_string()).await?;
                    Ok(Some(path))
                }
                Err(backup_error) => Err(Error::Persist(crate::error::PersistError::StoreAndBackupFailed {
                    store_error: store_error.to_string(),
                    backup_error: backup_error.to_string(),
                })),
            },
        }
    }

    /// Update the pool entry for `site_url` if one already exists there,
    /// otherwise insert a new one.
    async fn save_benchmark(&self, analysis: &AnalysisResult, site_url: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let record = crate::types::benchmark::Benchmark {
            id: String::new(),
            company_name: self.config.business_context.company_name.clone().unwrap_or_default(),
            url: site_url.to_string(),
            industry: self.config.business_context.industry.clone(),
            overall_score: analysis.overall_score,
            region: None,
        };

        match self.store.get_benchmark_by_url(site_url).await? {
            Some(existing) => self.store.update_benchmark(&existing.id, &record).await,
            None => self.store.save_benchmark(&record).await.map(|_| ()),
        }
    }
}

fn severity_filter_from(min: crate::types::issue::Severity) -> Vec<crate::types::issue::Severity> {
    use crate::types::issue::Severity::*;
    [Low, Medium, High, Critical].into_iter().filter(|s| *s >= min).collect()
}

/// Number every page's desktop then mobile screenshot sequentially
/// starting at 1, skipping any `ScreenshotRef::Bytes` entries (the
/// validator only reads from disk) and logging a warning for each.
fn build_screenshot_map(pages: &[crate::types::page::Page]) -> ScreenshotMap {
    let mut map = ScreenshotMap::new();
    let mut next = 1u32;
    for page in pages {
        for (label, screenshot) in [("desktop", &page.screenshots.desktop), ("mobile", &page.screenshots.mobile)] {
            match screenshot.path() {
                Some(path) => {
                    map.insert(
                        next,
                        crate::vision::ScreenshotLocation {
                            filepath: std::path::PathBuf::from(path),
                            filename: format!("{}-{label}.png", page.url.trim_start_matches('/')),
                        },
                    );
                    next += 1;
                }
                None => {
                    tracing::warn!(page = %page.url, viewport = label, "in-memory screenshot bytes have no path, vision validator cannot read them");
                }
            }
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockDataStore, MockModelProvider, MockPageCapturer, StubAnalyzer};
    use crate::types::issue::Category;

    #[tokio::test]
    async fn full_run_grade_mode_produces_a_graded_result() {
        let capturer = MockPageCapturer::new()
            .with_page("https://example.com/", "<html><a href=\"/about\">about</a></html>")
            .with_page("https://example.com/about", "<html>about us</html>");
        let model = MockModelProvider::new();
        let store = MockDataStore::new();

        let seo = StubAnalyzer::new(Category::Seo, 80.0);
        let content = StubAnalyzer::new(Category::Content, 75.0);
        let desktop = StubAnalyzer::new(Category::DesktopVisual, 90.0);
        let mobile = StubAnalyzer::new(Category::MobileVisual, 85.0);
        let social = StubAnalyzer::new(Category::Social, 60.0);
        let accessibility = StubAnalyzer::new(Category::Accessibility, 70.0);

        let analyzers = AnalyzerImpls {
            seo: Some(&seo),
            content: Some(&content),
            desktop_visual: Some(&desktop),
            mobile_visual: Some(&mobile),
            social: Some(&social),
            accessibility: Some(&accessibility),
            unified_technical: None,
            unified_visual: None,
        };

        let backup_dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.backup_dir = backup_dir.path().to_string_lossy().to_string();
        config.crawl.respect_robots = false;

        let discovered: BTreeSet<String> = ["/".to_string(), "/about".to_string()].into_iter().collect();
        let orchestrator = PipelineOrchestrator::new(&capturer, &model, &store, config, analyzers);
        let outcome = orchestrator
            .run_from_discovered("https://example.com", discovered, Mode::Grade, None)
            .await
            .unwrap();

        assert!(outcome.analysis.per_category_scores.all_in_bounds());
        assert!(outcome.benchmark.is_none());
        assert_eq!(store.saved_lead_count(), 1);
    }

    #[tokio::test]
    async fn benchmark_mode_saves_to_benchmark_pool_not_leads() {
        let capturer = MockPageCapturer::new().with_page("https://example.com/", "<html></html>");
        let model = MockModelProvider::new();
        let store = MockDataStore::new();
        let analyzers = AnalyzerImpls::default();

        let backup_dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.backup_dir = backup_dir.path().to_string_lossy().to_string();
        config.crawl.respect_robots = false;

        let discovered: BTreeSet<String> = ["/".to_string()].into_iter().collect();
        let orchestrator = PipelineOrchestrator::new(&capturer, &model, &store, config, analyzers);
        let outcome = orchestrator
            .run_from_discovered("https://example.com", discovered, Mode::Benchmark, None)
            .await
            .unwrap();

        assert_eq!(store.saved_lead_count(), 0);
        assert_eq!(store.saved_benchmark_count(), 1);
        assert!(outcome.analysis.per_category_scores.all_in_bounds());
    }

    #[tokio::test]
    async fn store_failure_falls_back_to_backup_without_erroring() {
        let capturer = MockPageCapturer::new().with_page("https://example.com/", "<html></html>");
        let model = MockModelProvider::new();
        let store = MockDataStore::new().failing();
        let analyzers = AnalyzerImpls::default();

        let backup_dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.backup_dir = backup_dir.path().to_string_lossy().to_string();
        config.crawl.respect_robots = false;

        let discovered: BTreeSet<String> = ["/".to_string()].into_iter().collect();
        let orchestrator = PipelineOrchestrator::new(&capturer, &model, &store, config, analyzers);
        let outcome = orchestrator
            .run_from_discovered("https://example.com", discovered, Mode::Grade, None)
            .await
            .unwrap();
        assert!(outcome.backup_path.is_some());
    }
}
