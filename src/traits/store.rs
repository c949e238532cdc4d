//! The opaque relational data store capability.
//!
//! Minimal operation set per the external-interfaces contract: the core
//! never assumes a transaction boundary wider than one call, and every
//! operation is expected to surface structured errors rather than panic.

use async_trait::async_trait;
use serde_json::Value;

use crate::types::benchmark::Benchmark;

/// Opaque arguments to `saveOrLinkProspect` — the core passes these
/// through without interpreting them.
#[derive(Debug, Clone, Default)]
pub struct ProspectMeta {
    pub project_id: String,
    pub extra: Value,
}

#[async_trait]
pub trait DataStore: Send + Sync {
    async fn save_lead(&self, record: &Value) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn save_benchmark(
        &self,
        record: &Benchmark,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;

    async fn update_benchmark(
        &self,
        id: &str,
        record: &Benchmark,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn get_benchmark_by_url(
        &self,
        url: &str,
    ) -> Result<Option<Benchmark>, Box<dyn std::error::Error + Send + Sync>>;

    async fn get_benchmarks(
        &self,
        limit: usize,
    ) -> Result<Vec<Benchmark>, Box<dyn std::error::Error + Send + Sync>>;

    async fn get_benchmarks_by_industry(
        &self,
        industry: &str,
        limit: usize,
    ) -> Result<Vec<Benchmark>, Box<dyn std::error::Error + Send + Sync>>;

    async fn save_or_link_prospect(
        &self,
        data: &Value,
        meta: &ProspectMeta,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
