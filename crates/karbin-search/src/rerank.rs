//! Pairwise re-ranking of the ranker's shortlist.
//!
//! The re-ranker only reorders and rescores what it is given; it never adds
//! a job. A call that fails, exceeds its deadline or leaves any candidate
//! unscored yields `None` and the caller keeps the cheap ordering.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, trace, warn};

use karbin_core::logging;
use karbin_core::text::job_pair_text;
use karbin_core::{sort_candidates, JobId, JobSummary, PairwiseScorer, ScoredCandidate};

/// A shortlisted job and where its score came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedJob {
    pub job_id: JobId,
    pub score: f32,
    /// True when `score` came from the pairwise scorer.
    pub reranked: bool,
}

impl From<ScoredCandidate> for RankedJob {
    fn from(c: ScoredCandidate) -> Self {
        Self {
            job_id: c.job_id,
            score: c.score,
            reranked: false,
        }
    }
}

/// Re-scores a shortlist with a pairwise model under a deadline.
pub struct Reranker {
    scorer: Arc<dyn PairwiseScorer>,
    timeout: Duration,
}

impl Reranker {
    pub fn new(scorer: Arc<dyn PairwiseScorer>, timeout: Duration) -> Self {
        Self { scorer, timeout }
    }

    pub fn model_name(&self) -> &str {
        self.scorer.model_name()
    }

    /// Re-score `shortlist` against `query` (the user's profile text).
    ///
    /// Every candidate must be scored for the new order to be used, so that
    /// all scores in the list come from the same model. Returns `None`, and
    /// the caller keeps the ranker's order, when the call fails or times out,
    /// when any candidate cannot be scored, or when a candidate has no summary
    /// to describe it.
    #[instrument(
        skip(self, query, shortlist, summaries),
        fields(subsystem = "search", component = "reranker", op = "rerank", input_count = shortlist.len())
    )]
    pub async fn rerank(
        &self,
        query: &str,
        shortlist: &[ScoredCandidate],
        summaries: &HashMap<JobId, JobSummary>,
    ) -> Option<Vec<RankedJob>> {
        let start = Instant::now();

        if shortlist.is_empty() {
            return Some(Vec::new());
        }

        let mut documents = Vec::with_capacity(shortlist.len());
        for candidate in shortlist {
            let Some(summary) = summaries.get(&candidate.job_id) else {
                warn!(
                    job_id = candidate.job_id,
                    fallback = logging::FALLBACK_CHEAP_PATH,
                    "Shortlisted job has no summary, keeping ranker order"
                );
                return None;
            };
            documents.push(job_pair_text(
                &summary.title,
                &summary.company,
                &summary.skills,
            ));
        }

        let scores = match tokio::time::timeout(
            self.timeout,
            self.scorer.score_pairs(query, &documents),
        )
        .await
        {
            Ok(Ok(scores)) if scores.len() == documents.len() => scores,
            Ok(Ok(scores)) => {
                warn!(
                    expected = documents.len(),
                    got = scores.len(),
                    fallback = logging::FALLBACK_CHEAP_PATH,
                    "Scorer returned wrong number of scores, keeping ranker order"
                );
                return None;
            }
            Ok(Err(e)) => {
                warn!(
                    error = %e,
                    fallback = logging::FALLBACK_CHEAP_PATH,
                    "Re-ranking failed, keeping ranker order"
                );
                return None;
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    fallback = logging::FALLBACK_CHEAP_PATH,
                    "Re-ranking timed out, keeping ranker order"
                );
                return None;
            }
        };

        let mut rescored = Vec::with_capacity(shortlist.len());
        for (candidate, score) in shortlist.iter().zip(scores) {
            let job_id = candidate.job_id;
            match score {
                Ok(score) if score.is_finite() => {
                    trace!(job_id, score, "Re-scored candidate");
                    rescored.push(ScoredCandidate::new(job_id, score));
                }
                Ok(_) => {
                    warn!(
                        job_id,
                        fallback = logging::FALLBACK_CHEAP_PATH,
                        "Non-finite re-rank score, keeping ranker order"
                    );
                    return None;
                }
                Err(e) => {
                    warn!(
                        job_id,
                        error = %e,
                        fallback = logging::FALLBACK_CHEAP_PATH,
                        "Candidate could not be re-scored, keeping ranker order"
                    );
                    return None;
                }
            }
        }

        sort_candidates(&mut rescored);
        let result: Vec<RankedJob> = rescored
            .into_iter()
            .map(|c| RankedJob {
                job_id: c.job_id,
                score: c.score,
                reranked: true,
            })
            .collect();

        debug!(
            result_count = result.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Re-ranking complete"
        );
        Some(result)
    }
}
