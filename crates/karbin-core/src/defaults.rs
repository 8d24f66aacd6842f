//! Centralized default constants for karbin.
//!
//! Every crate references these instead of defining its own magic numbers.

// =============================================================================
// CANDIDATE FILTER
// =============================================================================

/// Jobs scraped longer ago than this are never recommended.
pub const RECENCY_WINDOW_DAYS: u32 = 45;

/// Minimum number of shared skills between user and job. Zero disables the gate.
pub const MIN_SKILL_OVERLAP: u32 = 1;

/// Whether a user's preferred category restricts candidates.
pub const CATEGORY_FILTER: bool = true;

// =============================================================================
// RANKING
// =============================================================================

/// Number of results returned to the caller.
pub const TOP_K: usize = 10;

/// Shortlist size handed to the re-ranker.
pub const RETRIEVAL_K: usize = 50;

/// Per-request deadline for the re-ranking stage.
pub const RERANK_TIMEOUT_MS: u64 = 2_000;

/// Reason attached to a result when no skills overlap.
pub const GENERIC_MATCH_REASON: &str = "Strong profile match";

// =============================================================================
// EMBEDDING
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://localhost:11434";

/// Default embedding model name (Ollama).
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Default embedding vector dimension for nomic-embed-text.
pub const EMBED_DIMENSION: usize = 768;

/// Embedding batch size used when building the index snapshot.
pub const EMBED_BATCH_SIZE: usize = 64;

/// Embedding calls slower than this are logged at WARN.
pub const EMBED_SLOW_THRESHOLD_MS: u64 = 5_000;

/// HTTP timeout for a single embedding request.
pub const EMBED_TIMEOUT_SECS: u64 = 60;

/// Default cross-encoder model served behind the rerank endpoint.
pub const RERANK_MODEL: &str = "BAAI/bge-reranker-v2-m3";

// =============================================================================
// INDEX SNAPSHOT
// =============================================================================

/// Default location of the persisted index snapshot.
pub const SNAPSHOT_PATH: &str = "data/job_index.json";

/// Snapshot format version written by this build.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

// =============================================================================
// EVALUATION
// =============================================================================

/// Persona users evaluated when none are given.
pub const EVAL_PERSONAS: [i64; 3] = [1, 5, 10];

/// Recommendations generated per persona for metric computation.
pub const EVAL_TOP_K: usize = 10;

/// Recommendations shown per persona in the report.
pub const EVAL_DISPLAY_K: usize = 5;

/// Score above which a non-overlapping result counts as serendipitous.
pub const SERENDIPITY_THRESHOLD: f32 = 0.5;

/// Popularity assumed for jobs nobody has a skill for in the popularity map.
pub const UNKNOWN_POPULARITY: f64 = 0.99;

/// Lower clamp applied to popularity before taking the logarithm.
pub const POPULARITY_EPSILON: f64 = 0.000_01;

// =============================================================================
// DATABASE
// =============================================================================

/// Default maximum number of connections in the pool.
pub const DB_MAX_CONNECTIONS: u32 = 10;
