//! Core traits for karbin abstractions.
//!
//! These traits define the seams between the recommendation pipeline and
//! its external collaborators, enabling pluggable backends and testability.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::candidate_filter::CandidateFilter;
use crate::error::Result;
use crate::models::*;

// =============================================================================
// STORE TRAITS
// =============================================================================

/// Read access to the job inventory.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Identifiers of every job satisfying all clauses of `filter`.
    async fn candidate_ids(&self, filter: &CandidateFilter) -> Result<HashSet<JobId>>;

    /// Display metadata for the given jobs. Unknown ids are omitted.
    async fn summaries(&self, ids: &[JobId]) -> Result<Vec<JobSummary>>;

    /// Active jobs with their skills, newest first, for building the index.
    async fn embeddable_jobs(&self, limit: Option<i64>) -> Result<Vec<Job>>;

    /// Per job, the number of distinct users sharing at least one skill.
    /// Jobs nobody shares a skill with are absent.
    async fn skill_popularity(&self) -> Result<HashMap<JobId, u64>>;
}

/// Read access to user profiles.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Structured preferences, or `None` when the user has no profile row.
    async fn preferences(&self, user_id: UserId) -> Result<Option<UserPreferences>>;

    /// Free-text profile fields and skills. Missing data yields empty fields.
    async fn profile(&self, user_id: UserId) -> Result<UserProfile>;
}

// =============================================================================
// MODEL TRAITS
// =============================================================================

/// Backend for generating embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts.
    ///
    /// Returns one vector per input text, in input order. Identical text must
    /// yield identical vectors.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Pairwise relevance model (cross-encoder) scoring a query against documents
/// jointly.
#[async_trait]
pub trait PairwiseScorer: Send + Sync {
    /// Score each document against `query`.
    ///
    /// The outer error means the whole call failed. Inner errors mark
    /// individual documents the model could not score; the output always has
    /// one entry per document, in input order.
    async fn score_pairs(&self, query: &str, documents: &[String]) -> Result<Vec<Result<f32>>>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}
