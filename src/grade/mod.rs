//! Weighted scoring and grade assignment (C12), plus benchmark
//! enrichment and the flattening of per-page issues into one list ready
//! for the dedup stage.

use crate::types::benchmark::BenchmarkMatch;
use crate::types::issue::{AnalyzerResult, Category, Grade, Issue, PerCategoryScores};

/// Default category weights, used whenever the caller doesn't supply
/// AI-grading weights (or `use_ai_grading` is off).
pub const DEFAULT_WEIGHTS: CategoryWeights = CategoryWeights {
    design: 0.25,
    seo: 0.25,
    performance: 0.20,
    content: 0.15,
    accessibility: 0.10,
    social: 0.05,
};

#[derive(Debug, Clone, Copy)]
pub struct CategoryWeights {
    pub design: f32,
    pub seo: f32,
    pub performance: f32,
    pub content: f32,
    pub accessibility: f32,
    pub social: f32,
}

/// Benchmark-mode enrichment attached to the graded result.
#[derive(Debug, Clone)]
pub struct BenchmarkEnrichment {
    pub benchmark_company_name: String,
    pub comparison_tier: String,
    pub benchmark_scores: PerCategoryScores,
    pub strengths: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct GradedResult {
    pub per_category_scores: PerCategoryScores,
    pub overall_score: f32,
    pub grade: Grade,
    pub issues: Vec<Issue>,
    pub benchmark: Option<BenchmarkEnrichment>,
}

pub struct Aggregator {
    weights: CategoryWeights,
}

impl Aggregator {
    pub fn new(weights: CategoryWeights) -> Self {
        Self { weights }
    }

    pub fn with_default_weights() -> Self {
        Self::new(DEFAULT_WEIGHTS)
    }

    /// `per_category` maps the six canonical `AnalyzerResult`s; `design`
    /// and `performance` are derived from `desktopVisual`/`mobileVisual`
    /// (design = average of the two visual scores; performance has no
    /// analyzer of its own in the six-category fan-out and is taken as
    /// the mobile visual score — see DESIGN.md).
    pub fn aggregate(&self, per_category: &[(Category, AnalyzerResult)]) -> GradedResult {
        let (scores, issues) = self.category_scores(per_category);
        let overall_score = self.weighted_overall(&scores);
        let grade = Grade::from_score(overall_score);

        GradedResult {
            per_category_scores: scores,
            overall_score,
            grade,
            issues,
            benchmark: None,
        }
    }

    /// Benchmark-mode ingestion: category scores without the weighted,
    /// configured-weight grading step (`USE_AI_GRADING=false` territory) —
    /// the site is becoming a pool candidate, not being graded.
    /// `overall_score` falls back to an unweighted mean of the six
    /// category scores so the result still sorts sensibly as a
    /// `Benchmark.overall_score`.
    pub fn ingest_for_benchmark(&self, per_category: &[(Category, AnalyzerResult)]) -> GradedResult {
        let (scores, issues) = self.category_scores(per_category);
        let overall_score =
            (scores.design + scores.seo + scores.performance + scores.content + scores.accessibility + scores.social)
                / 6.0;
        let grade = Grade::from_score(overall_score);

        GradedResult {
            per_category_scores: scores,
            overall_score,
            grade,
            issues,
            benchmark: None,
        }
    }

    fn category_scores(&self, per_category: &[(Category, AnalyzerResult)]) -> (PerCategoryScores, Vec<Issue>) {
        let mut by_category: std::collections::HashMap<Category, &AnalyzerResult> =
            per_category.iter().map(|(c, r)| (*c, r)).collect();

        let seo = by_category.remove(&Category::Seo).map(|r| r.score).unwrap_or(50.0);
        let content = by_category.remove(&Category::Content).map(|r| r.score).unwrap_or(50.0);
        let desktop = by_category.remove(&Category::DesktopVisual).map(|r| r.score).unwrap_or(50.0);
        let mobile = by_category.remove(&Category::MobileVisual).map(|r| r.score).unwrap_or(50.0);
        let social = by_category.remove(&Category::Social).map(|r| r.score).unwrap_or(50.0);
        let accessibility = by_category.remove(&Category::Accessibility).map(|r| r.score).unwrap_or(50.0);

        let design = (desktop + mobile) / 2.0;
        let performance = mobile;

        let scores = PerCategoryScores {
            design,
            seo,
            performance,
            content,
            accessibility,
            social,
        };

        let issues = per_category.iter().flat_map(|(_, r)| r.issues.clone()).collect();

        (scores, issues)
    }

    fn weighted_overall(&self, scores: &PerCategoryScores) -> f32 {
        (scores.design * self.weights.design
            + scores.seo * self.weights.seo
            + scores.performance * self.weights.performance
            + scores.content * self.weights.content
            + scores.accessibility * self.weights.accessibility
            + scores.social * self.weights.social)
            .clamp(0.0, 100.0)
    }

    /// Attach a benchmark match's comparison data, if the matcher found one.
    pub fn enrich_with_benchmark(&self, mut result: GradedResult, benchmark: Option<&BenchmarkMatch>) -> GradedResult {
        if let Some(bm) = benchmark {
            result.benchmark = Some(BenchmarkEnrichment {
                benchmark_company_name: bm.benchmark.company_name.clone(),
                comparison_tier: format!("{:?}", bm.comparison_tier).to_lowercase(),
                benchmark_scores: PerCategoryScores {
                    design: bm.benchmark.overall_score,
                    seo: bm.benchmark.overall_score,
                    performance: bm.benchmark.overall_score,
                    content: bm.benchmark.overall_score,
                    accessibility: bm.benchmark.overall_score,
                    social: bm.benchmark.overall_score,
                },
                strengths: bm.key_similarities.clone(),
            });
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::issue::AnalyzerMeta;

    fn result(score: f32) -> AnalyzerResult {
        AnalyzerResult {
            score,
            issues: Vec::new(),
            positives: Vec::new(),
            quick_wins: Vec::new(),
            meta: AnalyzerMeta::default(),
        }
    }

    #[test]
    fn all_disabled_yields_all_fifty_and_grade_f() {
        let per_category: Vec<(Category, AnalyzerResult)> = Category::CANONICAL_ORDER
            .into_iter()
            .map(|c| (c, AnalyzerResult::disabled(c.as_str())))
            .collect();

        let aggregator = Aggregator::with_default_weights();
        let graded = aggregator.aggregate(&per_category);

        assert!(graded.per_category_scores.all_in_bounds());
        assert_eq!(graded.overall_score, 50.0);
        assert_eq!(graded.grade, Grade::F);
    }

    #[test]
    fn weighted_overall_in_bounds_for_mixed_scores() {
        let per_category = vec![
            (Category::Seo, result(90.0)),
            (Category::Content, result(80.0)),
            (Category::DesktopVisual, result(95.0)),
            (Category::MobileVisual, result(85.0)),
            (Category::Social, result(60.0)),
            (Category::Accessibility, result(70.0)),
        ];
        let aggregator = Aggregator::with_default_weights();
        let graded = aggregator.aggregate(&per_category);
        assert!(graded.per_category_scores.all_in_bounds());
        assert!((0.0..=100.0).contains(&graded.overall_score));
        assert_eq!(graded.grade, Grade::A);
    }
}
