//! # karbin-search
//!
//! Candidate ranking pipeline for the karbin job recommender.
//!
//! This crate provides:
//! - An in-memory vector index with a job id ↔ handle map
//! - Versioned, checksummed index snapshots and the batch job building them
//! - Profile vectorization in the job embedding space
//! - Filter-then-score ranking with deterministic tie-breaks
//! - Optional pairwise re-ranking under a deadline
//! - Skill-overlap explanations
//! - The composed [`RecommendationEngine`] and an offline evaluation harness
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use karbin_db::Database;
//! use karbin_inference::OllamaEmbedder;
//! use karbin_search::RecommendationEngine;
//!
//! let db = Database::connect(&database_url).await?;
//! let config = RecommenderConfig::load()?;
//! let embedder = Arc::new(OllamaEmbedder::new(&config.embedding)?);
//!
//! let engine = RecommendationEngine::new(db.jobs.clone(), db.users.clone(), embedder, config)
//!     .with_snapshot();
//!
//! match engine.recommend(42, 10, 50, false).await? {
//!     Recommendations::Results(results) => { /* render */ }
//!     Recommendations::IncompleteProfile => { /* ask the user to fill in their profile */ }
//! }
//! ```

pub mod engine;
pub mod eval;
pub mod explain;
pub mod ranker;
pub mod rerank;
pub mod snapshot;
pub mod vector_index;
pub mod vectorizer;

// Re-export core types
pub use karbin_core::*;

// Re-export search types
pub use engine::RecommendationEngine;
pub use eval::{
    EvaluationConfig, EvaluationHarness, EvaluationSummary, PersonaMetrics, PersonaReport,
    Variant, VariantSummary,
};
pub use explain::{explain, match_reason, matched_skills};
pub use ranker::Ranker;
pub use rerank::{RankedJob, Reranker};
pub use snapshot::{IndexSnapshot, SnapshotBuilder};
pub use vector_index::{Handle, IndexState, JobIdentifierMap, VectorIndex};
pub use vectorizer::{ProfileText, ProfileVectorizer};
