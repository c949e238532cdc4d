//! Snapshot type for the cross-analyzer `ContextAccumulator` (C2).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::issue::AnalyzerResult;

/// A pattern the accumulator noticed recurring across pages or analyzers
/// (e.g. "missing alt text appears on 4/5 pages").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub description: String,
    pub occurrences: u32,
    pub pages: Vec<String>,
}

/// A read-only snapshot of everything the accumulator has recorded so
/// far, handed to later-running analyzers so they can build on earlier
/// findings without taking a lock themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub pages_analyzed: Vec<String>,
    /// category → normalized titles of issues seen under it.
    pub issues_found: HashMap<String, Vec<String>>,
    pub patterns: Vec<Pattern>,
    /// Per-category score trend, in completion order.
    pub score_trends: HashMap<String, Vec<f32>>,
    pub analyzer_results: HashMap<String, AnalyzerResult>,
    pub shared_insights: Vec<String>,
}
