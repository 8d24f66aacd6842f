//! Ollama embedding backend.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use karbin_core::{defaults, EmbeddingBackend, EmbeddingConfig, Error, Result};

use crate::normalize::normalize_text;

/// Embedding backend talking to an Ollama server's `/api/embed` endpoint.
///
/// Every input text is normalized with [`normalize_text`] before it is sent,
/// so profile and job vectors are produced from the same canonical form.
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
    batch_size: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    /// Create an embedder for the given connection settings.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Self::with_timeout(config, Duration::from_secs(defaults::EMBED_TIMEOUT_SECS))
    }

    /// Create an embedder with a custom per-request timeout.
    pub fn with_timeout(config: &EmbeddingConfig, timeout: Duration) -> Result<Self> {
        if config.dimension == 0 {
            return Err(Error::Config(
                "embedding dimension must be positive".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "ollama",
            base_url = %config.base_url,
            model = %config.model,
            dimension = config.dimension,
            "Initializing Ollama embedder"
        );

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension: config.dimension,
            batch_size: defaults::EMBED_BATCH_SIZE,
        })
    }

    /// Create from environment variables (`OLLAMA_BASE`, `OLLAMA_EMBED_MODEL`,
    /// `OLLAMA_EMBED_DIM`).
    pub fn from_env() -> Result<Self> {
        let config = karbin_core::RecommenderConfig::from_env();
        Self::new(&config.embedding)
    }

    /// Override the number of texts sent per request.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: batch.iter().map(|t| normalize_text(t)).collect(),
        };

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse response: {}", e)))?;

        if result.embeddings.len() != batch.len() {
            return Err(Error::Embedding(format!(
                "Ollama returned {} embeddings for {} inputs",
                result.embeddings.len(),
                batch.len()
            )));
        }

        if let Some(bad) = result
            .embeddings
            .iter()
            .find(|v| v.len() != self.dimension)
        {
            return Err(Error::Embedding(format!(
                "Expected dimension {}, got {}",
                self.dimension,
                bad.len()
            )));
        }

        Ok(result.embeddings)
    }
}

#[async_trait]
impl EmbeddingBackend for OllamaEmbedder {
    #[instrument(
        skip(self, texts),
        fields(subsystem = "inference", component = "ollama", op = "embed_texts", input_count = texts.len())
    )]
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let start = Instant::now();
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        let elapsed = start.elapsed().as_millis() as u64;

        debug!(
            result_count = vectors.len(),
            duration_ms = elapsed,
            "Embedding complete"
        );
        if elapsed > defaults::EMBED_SLOW_THRESHOLD_MS {
            warn!(
                duration_ms = elapsed,
                input_count = texts.len(),
                slow = true,
                "Slow embedding operation"
            );
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
