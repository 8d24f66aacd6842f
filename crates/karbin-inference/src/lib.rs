//! # karbin-inference
//!
//! Model backends for the karbin job recommender.
//!
//! This crate provides:
//! - Ollama embedding backend (default)
//! - HTTP cross-encoder client for pairwise re-ranking
//! - Persian/Arabic text normalization applied before embedding
//! - Deterministic mock backends for tests (feature `mock`)
//!
//! # Feature Flags
//!
//! - `ollama` (default): Enable Ollama embedding backend
//! - `mock`: Export [`mock`] for use in dependent crates' tests
//!
//! # Example
//!
//! ```rust,no_run
//! use karbin_core::{EmbeddingBackend, EmbeddingConfig};
//! use karbin_inference::OllamaEmbedder;
//!
//! #[tokio::main]
//! async fn main() -> karbin_core::Result<()> {
//!     let embedder = OllamaEmbedder::new(&EmbeddingConfig::default())?;
//!     let texts = vec!["Rust developer".to_string()];
//!     let vectors = embedder.embed_texts(&texts).await?;
//!     assert_eq!(vectors.len(), 1);
//!     Ok(())
//! }
//! ```

pub mod cross_encoder;
pub mod normalize;

#[cfg(feature = "ollama")]
pub mod ollama;

// Mock backends for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use cross_encoder::HttpCrossEncoder;
pub use normalize::normalize_text;

#[cfg(feature = "ollama")]
pub use ollama::OllamaEmbedder;

// Re-export core traits for convenience
pub use karbin_core::{EmbeddingBackend, PairwiseScorer};
