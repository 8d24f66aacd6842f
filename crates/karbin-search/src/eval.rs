//! Offline evaluation harness.
//!
//! Runs a fixed set of persona users through the engine, with and without
//! re-ranking, and scores each list for precision and recall against a
//! skill-overlap ground truth, plus diversity, novelty and serendipity.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use karbin_core::similarity::cosine_similarity;
use karbin_core::{
    defaults, CandidateFilter, Error, JobId, Recommendations, RecommendationResult, Result, UserId,
};

use crate::engine::RecommendationEngine;

// =============================================================================
// METRICS
// =============================================================================

/// 1 − mean pairwise cosine similarity over all unordered pairs.
///
/// Lists with fewer than two vectors have no pairs and score 1.0.
pub fn diversity(vectors: &[&[f32]]) -> f64 {
    if vectors.len() < 2 {
        return 1.0;
    }

    let mut total = 0.0f64;
    let mut pairs = 0usize;
    for i in 0..vectors.len() {
        for j in (i + 1)..vectors.len() {
            // Mismatched dimensions cannot occur within one index.
            total += cosine_similarity(vectors[i], vectors[j]).unwrap_or(0.0) as f64;
            pairs += 1;
        }
    }
    1.0 - total / pairs as f64
}

/// Scale raw popularity counts into (0, 1] against the largest count.
pub fn normalize_popularity(counts: &HashMap<JobId, u64>) -> HashMap<JobId, f64> {
    let max = counts.values().copied().max().unwrap_or(0);
    if max == 0 {
        return counts.keys().map(|id| (*id, 0.0)).collect();
    }
    counts
        .iter()
        .map(|(id, count)| (*id, *count as f64 / max as f64))
        .collect()
}

/// Mean of −log2(popularity) over the listed jobs.
///
/// Jobs missing from `popularity` count as [`defaults::UNKNOWN_POPULARITY`];
/// popularity is clamped to [`defaults::POPULARITY_EPSILON`] before the log.
/// An empty list scores 0.
pub fn novelty(job_ids: &[JobId], popularity: &HashMap<JobId, f64>) -> f64 {
    mean(job_ids.iter().map(|id| {
        let p = popularity
            .get(id)
            .copied()
            .unwrap_or(defaults::UNKNOWN_POPULARITY)
            .max(defaults::POPULARITY_EPSILON);
        -p.log2()
    }))
    .unwrap_or(0.0)
}

/// Relevant jobs among the first `k` results, divided by `k`.
pub fn precision_at_k(job_ids: &[JobId], ground_truth: &HashSet<JobId>, k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    hits(job_ids, ground_truth, k) as f64 / k as f64
}

/// Relevant jobs among the first `k` results, divided by the ground-truth
/// size. `None` when the ground truth is empty.
pub fn recall_at_k(job_ids: &[JobId], ground_truth: &HashSet<JobId>, k: usize) -> Option<f64> {
    if ground_truth.is_empty() {
        return None;
    }
    Some(hits(job_ids, ground_truth, k) as f64 / ground_truth.len() as f64)
}

/// Mean over results of the score of "surprising" hits: results scoring
/// above `threshold` that share no skill with the user. Other results count
/// as 0. An empty list scores 0.
pub fn serendipity(results: &[RecommendationResult], threshold: f32) -> f64 {
    mean(results.iter().map(|r| {
        if r.score > threshold && r.matched_skills.is_empty() {
            r.score as f64
        } else {
            0.0
        }
    }))
    .unwrap_or(0.0)
}

fn hits(job_ids: &[JobId], ground_truth: &HashSet<JobId>, k: usize) -> usize {
    job_ids
        .iter()
        .take(k)
        .filter(|id| ground_truth.contains(id))
        .count()
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

// =============================================================================
// HARNESS
// =============================================================================

/// Pipeline variant under evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Baseline,
    Reranked,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Baseline => "baseline",
            Variant::Reranked => "reranked",
        }
    }

    fn uses_reranker(&self) -> bool {
        matches!(self, Variant::Reranked)
    }
}

/// Harness settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub personas: Vec<UserId>,
    /// List length scored by the metrics.
    pub evaluate_k: usize,
    /// Number of results kept in each report for display.
    pub display_k: usize,
    pub serendipity_threshold: f32,
    /// Minimum skill overlap for a job to count as relevant.
    pub ground_truth_overlap: u32,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            personas: defaults::EVAL_PERSONAS.to_vec(),
            evaluate_k: defaults::EVAL_TOP_K,
            display_k: defaults::EVAL_DISPLAY_K,
            serendipity_threshold: defaults::SERENDIPITY_THRESHOLD,
            ground_truth_overlap: defaults::MIN_SKILL_OVERLAP,
        }
    }
}

/// Metric values for one persona under one variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaMetrics {
    pub precision: f64,
    /// `None` when the persona has no relevant jobs at all.
    pub recall: Option<f64>,
    pub diversity: f64,
    pub novelty: f64,
    pub serendipity: f64,
}

/// Evaluation of one persona under one variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaReport {
    pub user_id: UserId,
    pub variant: Variant,
    pub incomplete_profile: bool,
    pub result_count: usize,
    pub ground_truth_size: usize,
    /// Absent for incomplete profiles, empty result lists and failed runs.
    pub metrics: Option<PersonaMetrics>,
    /// Leading results, at most `display_k`.
    pub top: Vec<RecommendationResult>,
    /// Why the pipeline failed for this persona, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PersonaReport {
    fn empty(user_id: UserId, variant: Variant, ground_truth_size: usize) -> Self {
        Self {
            user_id,
            variant,
            incomplete_profile: false,
            result_count: 0,
            ground_truth_size,
            metrics: None,
            top: Vec::new(),
            error: None,
        }
    }

    fn failed(user_id: UserId, variant: Variant, error: &Error) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::empty(user_id, variant, 0)
        }
    }
}

/// Mean metrics of one variant across evaluated personas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSummary {
    pub variant: Variant,
    pub personas: usize,
    pub precision: f64,
    /// Mean over personas whose recall is defined.
    pub recall: Option<f64>,
    pub diversity: f64,
    pub novelty: f64,
    pub serendipity: f64,
}

impl VariantSummary {
    fn from_reports(variant: Variant, reports: &[PersonaReport]) -> Self {
        let metrics: Vec<&PersonaMetrics> = reports
            .iter()
            .filter(|r| r.variant == variant)
            .filter_map(|r| r.metrics.as_ref())
            .collect();

        Self {
            variant,
            personas: metrics.len(),
            precision: mean(metrics.iter().map(|m| m.precision)).unwrap_or(0.0),
            recall: mean(metrics.iter().filter_map(|m| m.recall)),
            diversity: mean(metrics.iter().map(|m| m.diversity)).unwrap_or(0.0),
            novelty: mean(metrics.iter().map(|m| m.novelty)).unwrap_or(0.0),
            serendipity: mean(metrics.iter().map(|m| m.serendipity)).unwrap_or(0.0),
        }
    }
}

/// Full output of one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub generated_at: DateTime<Utc>,
    pub evaluate_k: usize,
    pub display_k: usize,
    pub reports: Vec<PersonaReport>,
    pub variants: Vec<VariantSummary>,
}

/// Runs personas through a [`RecommendationEngine`] and scores the lists.
pub struct EvaluationHarness<'a> {
    engine: &'a RecommendationEngine,
    config: EvaluationConfig,
}

impl<'a> EvaluationHarness<'a> {
    pub fn new(engine: &'a RecommendationEngine, config: EvaluationConfig) -> Self {
        Self { engine, config }
    }

    /// Variants this engine can run. Re-ranking is evaluated only when a
    /// scorer is attached.
    pub fn variants(&self) -> Vec<Variant> {
        if self.engine.has_reranker() {
            vec![Variant::Baseline, Variant::Reranked]
        } else {
            vec![Variant::Baseline]
        }
    }

    /// Evaluate every persona under every available variant.
    #[instrument(
        skip(self),
        fields(subsystem = "search", component = "eval", op = "run", personas = self.config.personas.len())
    )]
    pub async fn run(&self) -> Result<EvaluationSummary> {
        let index = self.engine.index()?;
        let popularity = normalize_popularity(&self.engine.job_store().skill_popularity().await?);
        let variants = self.variants();

        let mut reports = Vec::with_capacity(self.config.personas.len() * variants.len());
        for &user_id in &self.config.personas {
            let ground_truth = match self.ground_truth(user_id).await {
                Ok(ground_truth) => ground_truth,
                Err(e) => {
                    warn!(user_id, error = %e, "Ground truth lookup failed, skipping persona");
                    reports.extend(variants.iter().map(|v| PersonaReport::failed(user_id, *v, &e)));
                    continue;
                }
            };

            for &variant in &variants {
                let outcome = match self
                    .engine
                    .recommend(
                        user_id,
                        self.config.evaluate_k,
                        self.engine.config().retrieval_k,
                        variant.uses_reranker(),
                    )
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(e) if e.is_unavailable() => return Err(e),
                    Err(e) => {
                        warn!(
                            user_id,
                            variant = variant.as_str(),
                            error = %e,
                            "Recommendation failed for persona, continuing"
                        );
                        reports.push(PersonaReport::failed(user_id, variant, &e));
                        continue;
                    }
                };

                let report = match outcome {
                    Recommendations::IncompleteProfile => {
                        warn!(user_id, "Persona has an incomplete profile, skipping metrics");
                        PersonaReport {
                            incomplete_profile: true,
                            ..PersonaReport::empty(user_id, variant, ground_truth.len())
                        }
                    }
                    Recommendations::Results(results) if results.is_empty() => {
                        warn!(user_id, "Persona has no recommendations, skipping metrics");
                        PersonaReport::empty(user_id, variant, ground_truth.len())
                    }
                    Recommendations::Results(results) => {
                        let ids: Vec<JobId> = results.iter().map(|r| r.job_id).collect();
                        let vectors: Vec<&[f32]> =
                            ids.iter().filter_map(|id| index.vector_for(*id)).collect();
                        let k = self.config.evaluate_k;

                        let metrics = PersonaMetrics {
                            precision: precision_at_k(&ids, &ground_truth, k),
                            recall: recall_at_k(&ids, &ground_truth, k),
                            diversity: diversity(&vectors),
                            novelty: novelty(&ids, &popularity),
                            serendipity: serendipity(
                                &results,
                                self.config.serendipity_threshold,
                            ),
                        };

                        PersonaReport {
                            result_count: results.len(),
                            metrics: Some(metrics),
                            top: results.into_iter().take(self.config.display_k).collect(),
                            ..PersonaReport::empty(user_id, variant, ground_truth.len())
                        }
                    }
                };
                reports.push(report);
            }
        }

        let summaries: Vec<VariantSummary> = variants
            .iter()
            .map(|v| VariantSummary::from_reports(*v, &reports))
            .collect();

        for s in &summaries {
            info!(
                variant = s.variant.as_str(),
                personas = s.personas,
                precision = s.precision,
                recall = ?s.recall,
                diversity = s.diversity,
                novelty = s.novelty,
                serendipity = s.serendipity,
                "Evaluation variant summary"
            );
        }

        Ok(EvaluationSummary {
            generated_at: Utc::now(),
            evaluate_k: self.config.evaluate_k,
            display_k: self.config.display_k,
            reports,
            variants: summaries,
        })
    }

    /// Active, recent jobs sharing at least the configured number of skills
    /// with the user.
    async fn ground_truth(&self, user_id: UserId) -> Result<HashSet<JobId>> {
        let filter = CandidateFilter::skill_ground_truth(
            user_id,
            self.config.ground_truth_overlap,
            self.engine.config().recency_window_days,
        );
        self.engine.job_store().candidate_ids(&filter).await
    }
}
