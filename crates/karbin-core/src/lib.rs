//! # karbin-core
//!
//! Core types, traits, and abstractions for the karbin job recommender.
//!
//! This crate provides the typed records, the candidate-filter model, and the
//! trait seams (job store, user store, embedding backend, pairwise scorer)
//! that the database, inference and search crates plug into.

pub mod candidate_filter;
pub mod config;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod similarity;
pub mod text;
pub mod traits;

// Re-export commonly used types at crate root
pub use candidate_filter::{CandidateFilter, FilterClause};
pub use config::{EmbeddingConfig, RecommenderConfig, RerankerConfig};
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
