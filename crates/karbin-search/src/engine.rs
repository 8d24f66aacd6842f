//! Recommendation engine.
//!
//! Composes filter → vectorize → rank → (re-rank) → explain over explicitly
//! injected collaborators. The engine holds no mutable state; the index is
//! loaded once and shared read-only across requests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use karbin_core::logging;
use karbin_core::{
    CandidateFilter, EmbeddingBackend, Error, JobId, JobStore, JobSummary, PairwiseScorer,
    Recommendations, RecommenderConfig, Result, ScoredCandidate, UserId, UserStore,
};

use crate::explain::explain;
use crate::ranker::Ranker;
use crate::rerank::{RankedJob, Reranker};
use crate::vector_index::{IndexState, VectorIndex};
use crate::vectorizer::ProfileVectorizer;

/// The composed recommendation pipeline.
pub struct RecommendationEngine {
    jobs: Arc<dyn JobStore>,
    users: Arc<dyn UserStore>,
    vectorizer: ProfileVectorizer,
    reranker: Option<Reranker>,
    index: IndexState,
    config: RecommenderConfig,
}

impl RecommendationEngine {
    /// Create an engine with no index loaded and no re-ranker.
    pub fn new(
        jobs: Arc<dyn JobStore>,
        users: Arc<dyn UserStore>,
        embedder: Arc<dyn EmbeddingBackend>,
        config: RecommenderConfig,
    ) -> Self {
        Self {
            vectorizer: ProfileVectorizer::new(Arc::clone(&users), embedder),
            jobs,
            users,
            reranker: None,
            index: IndexState::NotLoaded,
            config,
        }
    }

    /// Attach a pairwise scorer, bounded by the configured re-rank timeout.
    pub fn with_scorer(mut self, scorer: Arc<dyn PairwiseScorer>) -> Self {
        self.reranker = Some(Reranker::new(scorer, self.config.rerank_timeout()));
        self
    }

    pub fn with_index_state(mut self, index: IndexState) -> Self {
        self.index = index;
        self
    }

    /// Load the snapshot at the configured path. A bad snapshot leaves the
    /// engine unavailable rather than failing construction.
    pub fn with_snapshot(self) -> Self {
        let state = IndexState::load(&self.config.snapshot_path);
        self.with_index_state(state)
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    pub fn index_state(&self) -> &IndexState {
        &self.index
    }

    /// Whether the vector index loaded successfully.
    pub fn is_available(&self) -> bool {
        self.index.is_ready()
    }

    /// The loaded index, or [`Error::IndexUnavailable`].
    pub fn index(&self) -> Result<Arc<VectorIndex>> {
        self.index.ready()
    }

    /// Job store the engine filters against.
    pub fn job_store(&self) -> &Arc<dyn JobStore> {
        &self.jobs
    }

    pub fn has_reranker(&self) -> bool {
        self.reranker.is_some()
    }

    /// Hard-filter eligible jobs for the user. A user without a profile row
    /// has no candidates.
    #[instrument(
        skip(self),
        fields(subsystem = "search", component = "candidate_filter", op = "get_candidate_ids")
    )]
    pub async fn get_candidate_ids(&self, user_id: UserId) -> Result<HashSet<JobId>> {
        let Some(prefs) = self.users.preferences(user_id).await? else {
            debug!("User has no profile row, no candidates");
            return Ok(HashSet::new());
        };

        let filter = CandidateFilter::for_user(user_id, &prefs, &self.config);
        debug!(clauses = ?filter.clause_names(), "Candidate filter built");

        let ids = self.jobs.candidate_ids(&filter).await?;
        debug!(candidate_count = ids.len(), "Candidates retrieved");
        Ok(ids)
    }

    /// The user's unit vector, or `None` for a profile too sparse to embed.
    pub async fn get_user_vector(&self, user_id: UserId) -> Result<Option<Vec<f32>>> {
        self.vectorizer.vectorize(user_id).await
    }

    /// Run the full pipeline for one user.
    ///
    /// `retrieval_k` is the shortlist length handed to the re-ranker and is
    /// raised to `top_k` if lower. It is unused without re-ranking.
    ///
    /// Fails fast with [`Error::IndexUnavailable`] when no index is loaded.
    /// Storage and embedding failures propagate; a failing re-ranker falls
    /// back to the ranker's order.
    #[instrument(
        skip(self),
        fields(
            subsystem = "search",
            component = "engine",
            op = "recommend",
            request_id = %Uuid::now_v7(),
        )
    )]
    pub async fn recommend(
        &self,
        user_id: UserId,
        top_k: usize,
        retrieval_k: usize,
        use_reranker: bool,
    ) -> Result<Recommendations> {
        let start = Instant::now();
        let index = self.index.ready()?;

        if top_k == 0 {
            return Err(Error::InvalidInput("top_k must be at least 1".to_string()));
        }
        let retrieval_k = retrieval_k.max(top_k);

        let candidates = self.get_candidate_ids(user_id).await?;

        let Some(profile) = self.vectorizer.profile_text(user_id).await? else {
            info!("Profile incomplete, nothing to embed");
            return Ok(Recommendations::IncompleteProfile);
        };

        if candidates.is_empty() {
            info!(result_count = 0, "No eligible jobs");
            return Ok(Recommendations::Results(Vec::new()));
        }

        let user_vector = self.vectorizer.embed(&profile).await?;

        let reranker = match (&self.reranker, use_reranker) {
            (Some(reranker), true) => Some(reranker),
            (None, true) => {
                warn!(
                    fallback = logging::FALLBACK_CHEAP_PATH,
                    "Re-ranking requested but no scorer configured"
                );
                None
            }
            (_, false) => None,
        };

        let shortlist_len = if reranker.is_some() {
            retrieval_k
        } else {
            top_k
        };
        let ranked_all = Ranker::new(index).rank(&candidates, &user_vector, candidates.len())?;
        let (shortlist, summaries) = self.shortlist(&ranked_all, shortlist_len).await?;

        let mut ranked = match reranker {
            Some(reranker) => reranker
                .rerank(&profile.text, &shortlist, &summaries)
                .await
                .unwrap_or_else(|| shortlist.iter().copied().map(RankedJob::from).collect()),
            None => shortlist.iter().copied().map(RankedJob::from).collect(),
        };
        ranked.truncate(top_k);

        let results = explain(&ranked, &summaries, &profile.profile.skills);

        info!(
            candidate_count = candidates.len(),
            result_count = results.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Recommendations ready"
        );
        Ok(Recommendations::Results(results))
    }

    /// The first `len` ranked candidates that still have display metadata,
    /// with their summaries. Summaries are fetched a page at a time in rank
    /// order, so a job removed since filtering is replaced by the next one.
    async fn shortlist(
        &self,
        ranked: &[ScoredCandidate],
        len: usize,
    ) -> Result<(Vec<ScoredCandidate>, HashMap<JobId, JobSummary>)> {
        let mut shortlist = Vec::with_capacity(len.min(ranked.len()));
        let mut summaries = HashMap::with_capacity(shortlist.capacity());
        let mut rest = ranked;

        while shortlist.len() < len && !rest.is_empty() {
            let (page, tail) = rest.split_at((len - shortlist.len()).min(rest.len()));
            rest = tail;

            let ids: Vec<JobId> = page.iter().map(|c| c.job_id).collect();
            let mut found: HashMap<JobId, JobSummary> = self
                .jobs
                .summaries(&ids)
                .await?
                .into_iter()
                .map(|s| (s.id, s))
                .collect();

            for candidate in page {
                match found.remove(&candidate.job_id) {
                    Some(summary) => {
                        shortlist.push(*candidate);
                        summaries.insert(candidate.job_id, summary);
                    }
                    None => warn!(
                        job_id = candidate.job_id,
                        "Ranked job has no display metadata, skipping"
                    ),
                }
            }
        }

        Ok((shortlist, summaries))
    }
}
