//! Benchmark retrieval and AI-assisted matching (C14), the secondary
//! pipeline mode that compares the analyzed site against a pool of peer
//! sites rather than grading it in isolation.
//!
//! Candidate retrieval is tiered: national candidates first (broadest
//! pool), then regional, then local, capped at `max_candidates` total.
//! The AI matcher picks among them; if it errors or returns nothing
//! resolvable, `resolve` falls back to a deterministic name match and
//! finally to the highest-scoring candidate with `fallback_used = true`.
//! The matcher never fails its caller — a `BenchmarkMatcher` error always
//! degrades to `None`, never propagates.

use serde::Deserialize;

use crate::traits::model::{ModelProvider, ModelRequest};
use crate::traits::store::DataStore;
use crate::types::benchmark::{Benchmark, BenchmarkMatch, ComparisonTier};
use crate::types::config::BusinessContext;

#[derive(Debug, Deserialize)]
struct MatchResponse {
    #[serde(rename = "benchmarkCompanyName")]
    benchmark_company_name: Option<String>,
    #[serde(rename = "matchScore")]
    match_score: f32,
    #[serde(rename = "matchReasoning")]
    match_reasoning: String,
    #[serde(rename = "keySimilarities", default)]
    key_similarities: Vec<String>,
    #[serde(rename = "keyDifferences", default)]
    key_differences: Vec<String>,
}

pub struct BenchmarkMatcher<'a> {
    store: &'a dyn DataStore,
    model: &'a dyn ModelProvider,
    max_candidates: usize,
}

impl<'a> BenchmarkMatcher<'a> {
    pub fn new(store: &'a dyn DataStore, model: &'a dyn ModelProvider, max_candidates: usize) -> Self {
        Self {
            store,
            model,
            max_candidates,
        }
    }

    /// Find the best comparable benchmark for `business_context`, or
    /// `None` if the pool is empty or every candidate was exhausted
    /// without a resolvable match. Never returns `Err`.
    pub async fn find_match(&self, business_context: &BusinessContext) -> Option<BenchmarkMatch> {
        let candidates = self.retrieve_candidates(business_context).await;
        if candidates.is_empty() {
            return None;
        }

        match self.match_via_model(&candidates, business_context).await {
            Ok(found) => Some(found),
            Err(e) => {
                tracing::warn!(error = %e, "benchmark matcher AI call failed, using fallback resolution");
                Some(self.fallback_match(candidates))
            }
        }
    }

    async fn retrieve_candidates(&self, business_context: &BusinessContext) -> Vec<(Benchmark, ComparisonTier)> {
        let mut candidates = Vec::new();

        if let Some(industry) = business_context.industry.as_deref() {
            match self.store.get_benchmarks_by_industry(industry, self.max_candidates).await {
                Ok(found) => candidates.extend(found.into_iter().map(|b| (b, ComparisonTier::National))),
                Err(e) => tracing::warn!(error = %e, "failed to retrieve industry benchmark candidates"),
            }
        }

        if candidates.len() < self.max_candidates {
            let remaining = self.max_candidates - candidates.len();
            match self.store.get_benchmarks(remaining).await {
                Ok(found) => {
                    let seen: std::collections::HashSet<String> = candidates.iter().map(|(b, _)| b.id.clone()).collect();
                    candidates.extend(
                        found
                            .into_iter()
                            .filter(|b| !seen.contains(&b.id))
                            .map(|b| (b, ComparisonTier::Regional)),
                    );
                }
                Err(e) => tracing::warn!(error = %e, "failed to retrieve general benchmark candidates"),
            }
        }

        candidates.truncate(self.max_candidates);
        candidates
    }

    async fn match_via_model(
        &self,
        candidates: &[(Benchmark, ComparisonTier)],
        business_context: &BusinessContext,
    ) -> Result<BenchmarkMatch, crate::error::RecoverableAIError> {
        let payload = serde_json::to_value(candidates.iter().map(|(b, _)| b).collect::<Vec<_>>())
            .map_err(|e| crate::error::RecoverableAIError(format!("failed to serialize candidates: {e}")))?;
        let prompt = format!(
            "select the best comparison benchmark for industry={:?} company={:?}: {payload}",
            business_context.industry, business_context.company_name
        );
        let response = self.model.call(ModelRequest::new(prompt)).await?;
        let parsed = response
            .parsed
            .ok_or_else(|| crate::error::RecoverableAIError("benchmark matcher response was not JSON".to_string()))?;
        let parsed: MatchResponse = serde_json::from_value(parsed)
            .map_err(|e| crate::error::RecoverableAIError(format!("benchmark matcher response did not match schema: {e}")))?;

        let Some(name) = parsed.benchmark_company_name else {
            return Err(crate::error::RecoverableAIError(
                "benchmark matcher returned no benchmarkCompanyName".to_string(),
            ));
        };

        let (benchmark, tier) = resolve_by_name(candidates, &name).ok_or_else(|| {
            crate::error::RecoverableAIError(format!("benchmark matcher referenced unresolvable name {name:?}"))
        })?;

        Ok(BenchmarkMatch {
            benchmark,
            comparison_tier: tier,
            match_score: parsed.match_score.clamp(0.0, 1.0),
            match_reasoning: parsed.match_reasoning,
            key_similarities: parsed.key_similarities,
            key_differences: parsed.key_differences,
            fallback_used: false,
        })
    }

    /// The AI match failed outright (no response, malformed, or the name
    /// couldn't be resolved); fall back to the highest-scoring candidate.
    fn fallback_match(&self, candidates: Vec<(Benchmark, ComparisonTier)>) -> BenchmarkMatch {
        let fallback = candidates
            .iter()
            .max_by(|(a, _), (b, _)| a.overall_score.total_cmp(&b.overall_score))
            .cloned()
            .expect("candidates is non-empty, checked by find_match");

        BenchmarkMatch {
            benchmark: fallback.0,
            comparison_tier: fallback.1,
            match_score: 0.0,
            match_reasoning: "AI matching unavailable; selected the highest-scoring candidate".to_string(),
            key_similarities: Vec::new(),
            key_differences: Vec::new(),
            fallback_used: true,
        }
    }
}

/// Resolve `name` against `candidates` by company name, trying in order:
/// exact match, case-insensitive match, then bidirectional substring
/// match (`name` contains the candidate's name, or vice versa). Returns
/// the first tier that yields exactly one candidate; ties within a tier
/// fall through to the next tier rather than guessing.
fn resolve_by_name(candidates: &[(Benchmark, ComparisonTier)], name: &str) -> Option<(Benchmark, ComparisonTier)> {
    if let Some(found) = single_match(candidates, |b| b.company_name == name) {
        return Some(found);
    }
    let lower = name.to_lowercase();
    if let Some(found) = single_match(candidates, |b| b.company_name.to_lowercase() == lower) {
        return Some(found);
    }
    single_match(candidates, |b| {
        let candidate_lower = b.company_name.to_lowercase();
        lower.contains(&candidate_lower) || candidate_lower.contains(&lower)
    })
}

fn single_match(
    candidates: &[(Benchmark, ComparisonTier)],
    predicate: impl Fn(&Benchmark) -> bool,
) -> Option<(Benchmark, ComparisonTier)> {
    let mut matches = candidates.iter().filter(|(b, _)| predicate(b));
    let first = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    Some(first.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockDataStore, MockModelProvider};

    fn benchmark(id: &str, industry: &str, score: f32) -> Benchmark {
        Benchmark {
            id: id.to_string(),
            company_name: format!("{id} co"),
            url: format!("https://{id}.example.com"),
            industry: Some(industry.to_string()),
            overall_score: score,
            region: None,
        }
    }

    #[tokio::test]
    async fn empty_pool_yields_no_match() {
        let store = MockDataStore::new();
        let model = MockModelProvider::new();
        let matcher = BenchmarkMatcher::new(&store, &model, 5);
        let result = matcher.find_match(&BusinessContext::default()).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn model_error_falls_back_to_highest_scoring_candidate() {
        let store = MockDataStore::new()
            .with_benchmark(benchmark("a", "dentistry", 70.0))
            .with_benchmark(benchmark("b", "dentistry", 92.0));
        let model = MockModelProvider::new().always_error();
        let matcher = BenchmarkMatcher::new(&store, &model, 5);
        let context = BusinessContext {
            industry: Some("dentistry".to_string()),
            ..Default::default()
        };
        let result = matcher.find_match(&context).await.unwrap();
        assert!(result.fallback_used);
        assert_eq!(result.benchmark.id, "b");
    }

    #[tokio::test]
    async fn model_match_resolves_named_candidate() {
        let store = MockDataStore::new()
            .with_benchmark(benchmark("a", "dentistry", 70.0))
            .with_benchmark(benchmark("b", "dentistry", 92.0));
        let model = MockModelProvider::new().with_json_response(serde_json::json!({
            "benchmarkCompanyName": "a co",
            "matchScore": 0.8,
            "matchReasoning": "similar service area",
            "keySimilarities": ["appointment booking"],
            "keyDifferences": []
        }));
        let matcher = BenchmarkMatcher::new(&store, &model, 5);
        let context = BusinessContext {
            industry: Some("dentistry".to_string()),
            ..Default::default()
        };
        let result = matcher.find_match(&context).await.unwrap();
        assert!(!result.fallback_used);
        assert_eq!(result.benchmark.id, "a");
    }

    #[test]
    fn resolve_by_name_falls_through_tiers() {
        let candidates = vec![
            (benchmark("a", "dentistry", 70.0), ComparisonTier::National),
            (benchmark("b", "dentistry", 92.0), ComparisonTier::National),
        ];

        assert_eq!(resolve_by_name(&candidates, "A Co").unwrap().0.id, "a");
        assert_eq!(resolve_by_name(&candidates, "go see b co today").unwrap().0.id, "b");
        assert!(resolve_by_name(&candidates, "nonexistent").is_none());
    }
}
