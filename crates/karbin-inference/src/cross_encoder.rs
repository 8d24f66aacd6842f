//! HTTP cross-encoder client.
//!
//! Talks to a text-embeddings-inference style `/rerank` endpoint: the request
//! carries one query and many texts, the response lists `{index, score}` for
//! each text the server could score.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, trace, warn};

use karbin_core::{Error, PairwiseScorer, RerankerConfig, Result};

use crate::normalize::normalize_text;

/// Default per-request timeout for the scorer's HTTP client. The pipeline
/// applies its own, usually tighter, deadline around the whole call.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Pairwise relevance scorer backed by a remote cross-encoder.
pub struct HttpCrossEncoder {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: String,
    texts: &'a [String],
}

#[derive(Debug, Deserialize)]
struct RerankHit {
    index: usize,
    score: f32,
}

impl HttpCrossEncoder {
    pub fn new(config: &RerankerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "cross_encoder",
            base_url = %config.base_url,
            model = %config.model,
            "Initializing cross-encoder client"
        );

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    /// Map the server's hits back onto input order. Texts the server did not
    /// return, or returned a non-finite score for, become per-item errors.
    fn align(hits: Vec<RerankHit>, len: usize) -> Vec<Result<f32>> {
        let mut scores: Vec<Option<f32>> = vec![None; len];
        for hit in hits {
            match scores.get_mut(hit.index) {
                Some(slot) if hit.score.is_finite() => *slot = Some(hit.score),
                Some(_) => trace!(index = hit.index, "Discarding non-finite score"),
                None => warn!(index = hit.index, len, "Scorer returned out-of-range index"),
            }
        }

        scores
            .into_iter()
            .enumerate()
            .map(|(i, score)| {
                score.ok_or_else(|| Error::Rerank(format!("no score returned for text {}", i)))
            })
            .collect()
    }
}

#[async_trait]
impl PairwiseScorer for HttpCrossEncoder {
    #[instrument(
        skip(self, query, documents),
        fields(subsystem = "inference", component = "cross_encoder", op = "score_pairs", input_count = documents.len())
    )]
    async fn score_pairs(&self, query: &str, documents: &[String]) -> Result<Vec<Result<f32>>> {
        if documents.is_empty() {
            return Ok(vec![]);
        }

        let start = Instant::now();
        let texts: Vec<String> = documents.iter().map(|d| normalize_text(d)).collect();
        let request = RerankRequest {
            query: normalize_text(query),
            texts: &texts,
        };

        let response = self
            .client
            .post(format!("{}/rerank", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Rerank(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Rerank(format!(
                "Scorer returned {}: {}",
                status, body
            )));
        }

        let hits: Vec<RerankHit> = response
            .json()
            .await
            .map_err(|e| Error::Rerank(format!("Failed to parse response: {}", e)))?;

        let scores = Self::align(hits, documents.len());
        debug!(
            result_count = scores.iter().filter(|s| s.is_ok()).count(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Pairwise scoring complete"
        );
        Ok(scores)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn scorer(base_url: String) -> HttpCrossEncoder {
        HttpCrossEncoder::new(&RerankerConfig {
            base_url,
            model: "test-reranker".to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_scores_realigned_to_input_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rerank"))
            .and(body_partial_json(serde_json::json!({
                "query": "rust developer",
                "texts": ["A at X", "B at Y"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"index": 1, "score": 0.9},
                {"index": 0, "score": 0.2}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let docs = vec!["A at X".to_string(), "B at Y".to_string()];
        let scores = scorer(server.uri())
            .score_pairs("rust  developer", &docs)
            .await
            .unwrap();

        assert_eq!(scores.len(), 2);
        assert_eq!(*scores[0].as_ref().unwrap(), 0.2);
        assert_eq!(*scores[1].as_ref().unwrap(), 0.9);
    }

    #[tokio::test]
    async fn test_missing_index_is_per_item_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rerank"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{"index": 0, "score": 0.5}])),
            )
            .mount(&server)
            .await;

        let docs = vec!["a".to_string(), "b".to_string()];
        let scores = scorer(server.uri()).score_pairs("q", &docs).await.unwrap();

        assert!(scores[0].is_ok());
        assert!(matches!(scores[1], Err(Error::Rerank(_))));
    }

    #[tokio::test]
    async fn test_server_error_fails_whole_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rerank"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = scorer(server.uri())
            .score_pairs("q", &["a".to_string()])
            .await;

        assert!(matches!(result, Err(Error::Rerank(_))));
    }

    #[tokio::test]
    async fn test_empty_documents_skip_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let scores = scorer(server.uri()).score_pairs("q", &[]).await.unwrap();
        assert!(scores.is_empty());
    }

    #[test]
    fn test_align_ignores_out_of_range_index() {
        let hits = vec![
            RerankHit { index: 5, score: 1.0 },
            RerankHit { index: 0, score: 0.3 },
        ];
        let aligned = HttpCrossEncoder::align(hits, 1);
        assert_eq!(aligned.len(), 1);
        assert_eq!(*aligned[0].as_ref().unwrap(), 0.3);
    }
}
