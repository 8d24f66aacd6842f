//! Mock model backends for deterministic testing.
//!
//! [`MockEmbedder`] turns text into a stable unit vector, so identical text
//! always yields an identical vector. [`MockScorer`] returns configured
//! scores per document and can be told to fail or stall.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use karbin_core::EmbeddingBackend;
//! use karbin_inference::mock::MockEmbedder;
//!
//! let embedder = MockEmbedder::new()
//!     .with_dimension(4)
//!     .with_vector("rust", vec![1.0, 0.0, 0.0, 0.0]);
//! assert_eq!(embedder.dimension(), 4);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use karbin_core::{EmbeddingBackend, Error, PairwiseScorer, Result};

/// Recorded call into a mock backend.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub input: Vec<String>,
}

type CallLog = Arc<Mutex<Vec<MockCall>>>;

fn record(log: &CallLog, operation: &str, input: Vec<String>) {
    log.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(MockCall {
            operation: operation.to_string(),
            input,
        });
}

fn snapshot(log: &CallLog) -> Vec<MockCall> {
    log.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

// =============================================================================
// EMBEDDER
// =============================================================================

/// Mock embedding backend.
#[derive(Clone)]
pub struct MockEmbedder {
    config: Arc<EmbedderConfig>,
    call_log: CallLog,
}

#[derive(Debug, Clone)]
struct EmbedderConfig {
    dimension: usize,
    fixed_vectors: HashMap<String, Vec<f32>>,
    failing: HashSet<String>,
    fail: bool,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            dimension: 8,
            fixed_vectors: HashMap::new(),
            failing: HashSet::new(),
            fail: false,
        }
    }
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self {
            config: Arc::new(EmbedderConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        Arc::make_mut(&mut self.config).dimension = dimension;
        self
    }

    /// Return `vector` whenever `text` is embedded.
    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        Arc::make_mut(&mut self.config)
            .fixed_vectors
            .insert(text.into(), vector);
        self
    }

    /// Fail every call.
    pub fn with_failure(mut self) -> Self {
        Arc::make_mut(&mut self.config).fail = true;
        self
    }

    /// Fail any call that includes `text`.
    pub fn failing_on(mut self, text: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).failing.insert(text.into());
        self
    }

    /// Get all logged calls for assertion.
    pub fn calls(&self) -> Vec<MockCall> {
        snapshot(&self.call_log)
    }

    /// Number of `embed_texts` calls made so far.
    pub fn embed_call_count(&self) -> usize {
        self.call_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Deterministic unit vector derived from the text's characters.
    pub fn generate(text: &str, dimension: usize) -> Vec<f32> {
        let mut vec = vec![0.0f32; dimension];
        if dimension == 0 {
            return vec;
        }
        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % dimension;
            vec[idx] += 0.1;
        }
        karbin_core::similarity::l2_normalize(&mut vec);
        vec
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbedder {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        record(&self.call_log, "embed", texts.to_vec());

        if self.config.fail || texts.iter().any(|t| self.config.failing.contains(t)) {
            return Err(Error::Embedding("simulated embedding failure".to_string()));
        }

        Ok(texts
            .iter()
            .map(|t| {
                self.config
                    .fixed_vectors
                    .get(t)
                    .cloned()
                    .unwrap_or_else(|| Self::generate(t, self.config.dimension))
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

// =============================================================================
// SCORER
// =============================================================================

/// Mock pairwise scorer.
#[derive(Clone)]
pub struct MockScorer {
    config: Arc<ScorerConfig>,
    call_log: CallLog,
}

#[derive(Debug, Clone, Default)]
struct ScorerConfig {
    scores: HashMap<String, f32>,
    failing: HashSet<String>,
    default_score: f32,
    delay: Option<Duration>,
    fail_call: bool,
}

impl MockScorer {
    pub fn new() -> Self {
        Self {
            config: Arc::new(ScorerConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Score `document` with `score`.
    pub fn with_score(mut self, document: impl Into<String>, score: f32) -> Self {
        Arc::make_mut(&mut self.config)
            .scores
            .insert(document.into(), score);
        self
    }

    /// Score for documents without an explicit entry.
    pub fn with_default_score(mut self, score: f32) -> Self {
        Arc::make_mut(&mut self.config).default_score = score;
        self
    }

    /// Report a per-item failure for `document`.
    pub fn failing_on(mut self, document: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config)
            .failing
            .insert(document.into());
        self
    }

    /// Fail the whole call.
    pub fn with_call_failure(mut self) -> Self {
        Arc::make_mut(&mut self.config).fail_call = true;
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        Arc::make_mut(&mut self.config).delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        snapshot(&self.call_log)
    }
}

impl Default for MockScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PairwiseScorer for MockScorer {
    async fn score_pairs(&self, query: &str, documents: &[String]) -> Result<Vec<Result<f32>>> {
        let mut input = vec![query.to_string()];
        input.extend(documents.iter().cloned());
        record(&self.call_log, "score_pairs", input);

        if let Some(delay) = self.config.delay {
            tokio::time::sleep(delay).await;
        }
        if self.config.fail_call {
            return Err(Error::Rerank("simulated scorer outage".to_string()));
        }

        Ok(documents
            .iter()
            .map(|doc| {
                if self.config.failing.contains(doc) {
                    Err(Error::Rerank(format!("simulated failure for '{}'", doc)))
                } else {
                    Ok(self
                        .config
                        .scores
                        .get(doc)
                        .copied()
                        .unwrap_or(self.config.default_score))
                }
            })
            .collect())
    }

    fn model_name(&self) -> &str {
        "mock-reranker"
    }
}
