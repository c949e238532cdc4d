//! Benchmark data types supporting the `BenchmarkMatcher` (C14).

use serde::{Deserialize, Serialize};

/// How closely a candidate benchmark matches the analyzed site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonTier {
    National,
    Regional,
    Local,
    Manual,
}

/// A peer site stored by the external `DataStore`, used as comparison
/// material for the site under audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Benchmark {
    pub id: String,
    pub company_name: String,
    pub url: String,
    pub industry: Option<String>,
    pub overall_score: f32,
    pub region: Option<String>,
}

/// The result of matching the analyzed site against the benchmark pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkMatch {
    pub benchmark: Benchmark,
    pub comparison_tier: ComparisonTier,
    /// 0.0-1.0 confidence the match is a meaningful comparison.
    pub match_score: f32,
    pub match_reasoning: String,
    pub key_similarities: Vec<String>,
    pub key_differences: Vec<String>,
    /// True when the AI-assisted match failed or returned nothing usable
    /// and the rule-based nearest-industry fallback was used instead.
    pub fallback_used: bool,
}
