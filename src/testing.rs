//! Mock implementations of every opaque external collaborator
//! (`ModelProvider`, `PageCapturer`, `DataStore`) plus a couple of fixed
//! test `Analyzer`s, so pipeline stages can be exercised without a real
//! AI provider, headless browser, or database.
//!
//! Builder-style mocks with `with_*` configuration methods and call
//! tracking for assertions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{CrawlError, DegradedAnalyzerError, RecoverableAIError};
use crate::traits::analyzer::{Analyzer, AnalyzerInput};
use crate::traits::browser::{CaptureOutput, PageCapturer, Viewport};
use crate::traits::model::{ModelProvider, ModelRequest, ModelResponse};
use crate::traits::store::{DataStore, ProspectMeta};
use crate::types::benchmark::Benchmark;
use crate::types::issue::{AnalyzerResult, Category};
use crate::types::page::{DesignTokens, ScreenshotRef};

/// A mock `ModelProvider` returning deterministic, configurable responses.
#[derive(Default)]
pub struct MockModelProvider {
    responses: Mutex<Vec<Value>>,
    always_error: Mutex<bool>,
    calls: Arc<RwLock<Vec<ModelRequest>>>,
}

impl MockModelProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a JSON response; calls consume queued responses FIFO, and
    /// once the queue is empty the most recently queued response repeats.
    pub fn with_json_response(self, value: Value) -> Self {
        self.responses.lock().unwrap().push(value);
        self
    }

    pub fn always_error(self) -> Self {
        *self.always_error.lock().unwrap() = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl ModelProvider for MockModelProvider {
    async fn call(&self, request: ModelRequest) -> Result<ModelResponse, RecoverableAIError> {
        self.calls.write().unwrap().push(ModelRequest {
            prompt: request.prompt.clone(),
            images: Vec::new(),
            model: request.model.clone(),
            expects_json: request.expects_json,
        });

        if *self.always_error.lock().unwrap() {
            return Err(RecoverableAIError("mock model provider configured to always error".to_string()));
        }

        let mut responses = self.responses.lock().unwrap();
        let value = if responses.len() > 1 {
            responses.remove(0)
        } else {
            responses.last().cloned().unwrap_or(Value::Null)
        };

        Ok(ModelResponse {
            text: value.to_string(),
            parsed: Some(value),
        })
    }
}

/// A mock `PageCapturer` keyed by absolute URL.
#[derive(Default)]
pub struct MockPageCapturer {
    pages: HashMap<String, String>,
    failures: HashMap<String, String>,
}

impl MockPageCapturer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    pub fn with_failure(mut self, url: impl Into<String>, error: impl Into<String>) -> Self {
        self.failures.insert(url.into(), error.into());
        self
    }
}

#[async_trait]
impl PageCapturer for MockPageCapturer {
    async fn capture(&self, url: &str, viewport: Viewport) -> Result<CaptureOutput, CrawlError> {
        if let Some(error) = self.failures.get(url) {
            return Err(CrawlError::Transport(error.clone()));
        }
        let html = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| CrawlError::Transport(format!("no mock page registered for {url}")))?;

        let suffix = match viewport {
            Viewport::Desktop => "desktop",
            Viewport::Mobile => "mobile",
        };

        Ok(CaptureOutput {
            screenshot: ScreenshotRef::Path(format!("{suffix}.png")),
            design_tokens: DesignTokens {
                fonts: vec!["Inter".to_string()],
                colors: vec!["#111111".to_string()],
                captured_at: Some(chrono::Utc::now()),
            },
            html,
        })
    }
}

/// A mock `DataStore` that records what it was asked to persist and can
/// be configured to fail on demand, for exercising the backup tier's
/// retry path.
#[derive(Default)]
pub struct MockDataStore {
    fail_leads: Mutex<bool>,
    saved_leads: Mutex<Vec<Value>>,
    benchmarks: Mutex<Vec<Benchmark>>,
}

impl MockDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(self) -> Self {
        *self.fail_leads.lock().unwrap() = true;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        *self.fail_leads.lock().unwrap() = failing;
    }

    pub fn saved_lead_count(&self) -> usize {
        self.saved_leads.lock().unwrap().len()
    }

    pub fn saved_benchmark_count(&self) -> usize {
        self.benchmarks.lock().unwrap().len()
    }

    pub fn with_benchmark(self, benchmark: Benchmark) -> Self {
        self.benchmarks.lock().unwrap().push(benchmark);
        self
    }
}

type StoreError = Box<dyn std::error::Error + Send + Sync>;

#[async_trait]
impl DataStore for MockDataStore {
    async fn save_lead(&self, record: &Value) -> Result<(), StoreError> {
        if *self.fail_leads.lock().unwrap() {
            return Err("mock data store configured to fail".into());
        }
        self.saved_leads.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn save_benchmark(&self, record: &Benchmark) -> Result<String, StoreError> {
        let id = record.id.clone();
        self.benchmarks.lock().unwrap().push(record.clone());
        Ok(id)
    }

    async fn update_benchmark(&self, id: &str, record: &Benchmark) -> Result<(), StoreError> {
        let mut benchmarks = self.benchmarks.lock().unwrap();
        if let Some(existing) = benchmarks.iter_mut().find(|b| b.id == id) {
            *existing = record.clone();
        }
        Ok(())
    }

    async fn get_benchmark_by_url(&self, url: &str) -> Result<Option<Benchmark>, StoreError> {
        Ok(self.benchmarks.lock().unwrap().iter().find(|b| b.url == url).cloned())
    }

    async fn get_benchmarks(&self, limit: usize) -> Result<Vec<Benchmark>, StoreError> {
        Ok(self.benchmarks.lock().unwrap().iter().take(limit).cloned().collect())
    }

    async fn get_benchmarks_by_industry(&self, industry: &str, limit: usize) -> Result<Vec<Benchmark>, StoreError> {
        Ok(self
            .benchmarks
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.industry.as_deref() == Some(industry))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn save_or_link_prospect(&self, _data: &Value, _meta: &ProspectMeta) -> Result<(), StoreError> {
        Ok(())
    }
}

/// A fixed-score `Analyzer` with no issues, for wiring tests that only
/// care about fan-out/ordering/degradation behavior.
pub struct StubAnalyzer {
    category: Category,
    score: f32,
}

impl StubAnalyzer {
    pub fn new(category: Category, score: f32) -> Self {
        Self { category, score }
    }
}

#[async_trait]
impl Analyzer for StubAnalyzer {
    fn category(&self) -> Category {
        self.category
    }

    async fn analyze(&self, _input: AnalyzerInput<'_>) -> Result<AnalyzerResult, DegradedAnalyzerError> {
        Ok(AnalyzerResult {
            score: self.score,
            issues: Vec::new(),
            positives: Vec::new(),
            quick_wins: Vec::new(),
            meta: crate::types::issue::AnalyzerMeta {
                analyzer: self.category.as_str().to_string(),
                disabled: false,
                message: None,
                error: None,
            },
        })
    }
}

/// An `Analyzer` that always returns `Err`, to exercise the runtime's
/// degradation path (S1: analyzer degradation).
pub struct FailingAnalyzer {
    category: Category,
}

impl FailingAnalyzer {
    pub fn new(category: Category) -> Self {
        Self { category }
    }
}

#[async_trait]
impl Analyzer for FailingAnalyzer {
    fn category(&self) -> Category {
        self.category
    }

    async fn analyze(&self, _input: AnalyzerInput<'_>) -> Result<AnalyzerResult, DegradedAnalyzerError> {
        Err(DegradedAnalyzerError {
            analyzer: self.category.as_str().to_string(),
            reason: "synthetic failure for testing".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_model_provider_returns_queued_json() {
        let provider = MockModelProvider::new().with_json_response(serde_json::json!({"ok": true}));
        let response = provider.call(ModelRequest::new("test")).await.unwrap();
        assert_eq!(response.parsed.unwrap()["ok"], true);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn mock_model_provider_errors_when_configured() {
        let provider = MockModelProvider::new().always_error();
        assert!(provider.call(ModelRequest::new("test")).await.is_err());
    }

    #[tokio::test]
    async fn mock_data_store_records_failure_then_success() {
        let store = MockDataStore::new();
        store.set_failing(true);
        assert!(store.save_lead(&serde_json::json!({})).await.is_err());
        store.set_failing(false);
        assert!(store.save_lead(&serde_json::json!({})).await.is_ok());
        assert_eq!(store.saved_lead_count(), 1);
    }
}
