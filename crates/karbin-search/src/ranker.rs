//! Candidate ranker.
//!
//! Scores only the filtered candidates against the user vector. The index is
//! never searched globally here: filtering first guarantees every ranked job
//! is eligible, however the rest of the index looks.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, instrument, trace};

use karbin_core::similarity::dot;
use karbin_core::{sort_candidates, JobId, Result, ScoredCandidate};

use crate::vector_index::VectorIndex;

/// Ranks a candidate set by cosine similarity to a unit user vector.
pub struct Ranker {
    index: Arc<VectorIndex>,
}

impl Ranker {
    pub fn new(index: Arc<VectorIndex>) -> Self {
        Self { index }
    }

    /// Score every resolvable candidate and return the best `limit`, ordered
    /// by score descending then job id ascending.
    ///
    /// `user_vector` must be unit length. Candidates missing from the index
    /// are dropped; an empty result is a normal outcome.
    #[instrument(
        skip(self, candidates, user_vector),
        fields(subsystem = "search", component = "ranker", op = "rank", candidate_count = candidates.len())
    )]
    pub fn rank(
        &self,
        candidates: &HashSet<JobId>,
        user_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredCandidate>> {
        self.index.check_dimension(user_vector)?;

        let resolved = self.index.resolve(candidates);
        if resolved.is_empty() {
            debug!("No candidate resolved to an index vector");
            return Ok(Vec::new());
        }

        let handles: Vec<_> = resolved.iter().map(|(_, h)| *h).collect();
        let rows = self.index.reconstruct(&handles)?;

        let mut scored: Vec<ScoredCandidate> = resolved
            .iter()
            .zip(rows)
            .map(|((job_id, _), row)| {
                let score = dot(user_vector, row).clamp(-1.0, 1.0);
                trace!(job_id, score, "Scored candidate");
                ScoredCandidate::new(*job_id, score)
            })
            .collect();

        sort_candidates(&mut scored);
        scored.truncate(limit);

        debug!(
            resolved = resolved.len(),
            result_count = scored.len(),
            "Ranking complete"
        );
        Ok(scored)
    }
}
