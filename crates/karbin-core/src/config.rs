//! Recommender configuration.
//!
//! Configuration can be loaded from:
//! - a TOML file (`KARBIN_CONFIG`, or `~/.config/karbin/recommender.toml`)
//! - environment variables (`KARBIN_*`, `OLLAMA_*`, `RERANK_*`)
//!
//! `${VAR}` placeholders inside a TOML file are replaced from the environment
//! before parsing.
//!
//! # Example
//!
//! ```rust,no_run
//! use karbin_core::RecommenderConfig;
//!
//! // File if present, otherwise environment
//! let config = RecommenderConfig::load().expect("Failed to load config");
//! assert!(config.retrieval_k >= config.top_k);
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::defaults;
use crate::error::{Error, Result};

/// Embedding backend connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Base URL of the Ollama API.
    pub base_url: String,
    /// Model to use for embeddings.
    pub model: String,
    /// Expected vector dimension.
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::OLLAMA_URL.to_string(),
            model: defaults::EMBED_MODEL.to_string(),
            dimension: defaults::EMBED_DIMENSION,
        }
    }
}

/// Pairwise re-ranker connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// Base URL of the service exposing `POST /rerank`.
    pub base_url: String,
    #[serde(default = "RerankerConfig::default_model")]
    pub model: String,
}

impl RerankerConfig {
    fn default_model() -> String {
        defaults::RERANK_MODEL.to_string()
    }
}

/// Pipeline knobs and collaborator locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderConfig {
    /// Jobs older than this many days are never candidates.
    pub recency_window_days: u32,
    /// Minimum shared skills between user and job; 0 disables the gate.
    pub min_skill_overlap: u32,
    /// Restrict to the user's preferred category when one is set.
    pub category_filter: bool,
    /// Results returned per request.
    pub top_k: usize,
    /// Shortlist size handed to the re-ranker.
    pub retrieval_k: usize,
    /// Deadline for the re-ranking stage of one request.
    pub rerank_timeout_ms: u64,
    /// Location of the persisted vector index snapshot.
    pub snapshot_path: PathBuf,
    pub embedding: EmbeddingConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reranker: Option<RerankerConfig>,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            recency_window_days: defaults::RECENCY_WINDOW_DAYS,
            min_skill_overlap: defaults::MIN_SKILL_OVERLAP,
            category_filter: defaults::CATEGORY_FILTER,
            top_k: defaults::TOP_K,
            retrieval_k: defaults::RETRIEVAL_K,
            rerank_timeout_ms: defaults::RERANK_TIMEOUT_MS,
            snapshot_path: PathBuf::from(defaults::SNAPSHOT_PATH),
            embedding: EmbeddingConfig::default(),
            reranker: None,
        }
    }
}

impl RecommenderConfig {
    /// Get the default config file path.
    ///
    /// Returns: ~/.config/karbin/recommender.toml
    pub fn default_config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from(".config"));
        path.push("karbin");
        path.push("recommender.toml");
        path
    }

    /// Load configuration from `KARBIN_CONFIG` or the default path, falling
    /// back to environment variables when no file exists.
    pub fn load() -> Result<Self> {
        let path = env::var("KARBIN_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_config_path());

        if path.exists() {
            info!(
                subsystem = "config",
                path = %path.display(),
                "Loading recommender config from file"
            );
            Self::from_file(&path)
        } else {
            debug!(
                subsystem = "config",
                path = %path.display(),
                "Config file not found, using environment variables"
            );
            let config = Self::from_env();
            config.validate()?;
            Ok(config)
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content, |name| env::var(name).ok())
    }

    /// Parse TOML content, substituting `${VAR}` placeholders via `lookup`.
    pub fn from_toml_str<F>(content: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let content = substitute_vars(content, lookup)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| Error::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        let reranker = lookup("RERANK_URL")
            .filter(|url| !url.trim().is_empty())
            .map(|base_url| RerankerConfig {
                base_url,
                model: lookup("RERANK_MODEL").unwrap_or_else(RerankerConfig::default_model),
            });

        Self {
            recency_window_days: parse_var(&lookup, "KARBIN_RECENCY_DAYS")
                .unwrap_or(default.recency_window_days),
            min_skill_overlap: parse_var(&lookup, "KARBIN_MIN_SKILL_OVERLAP")
                .unwrap_or(default.min_skill_overlap),
            category_filter: parse_var(&lookup, "KARBIN_CATEGORY_FILTER")
                .unwrap_or(default.category_filter),
            top_k: parse_var(&lookup, "KARBIN_TOP_K").unwrap_or(default.top_k),
            retrieval_k: parse_var(&lookup, "KARBIN_RETRIEVAL_K")
                .unwrap_or(default.retrieval_k),
            rerank_timeout_ms: parse_var(&lookup, "KARBIN_RERANK_TIMEOUT_MS")
                .unwrap_or(default.rerank_timeout_ms),
            snapshot_path: lookup("KARBIN_SNAPSHOT_PATH")
                .map(PathBuf::from)
                .unwrap_or(default.snapshot_path),
            embedding: EmbeddingConfig {
                base_url: lookup("OLLAMA_BASE").unwrap_or(default.embedding.base_url),
                model: lookup("OLLAMA_EMBED_MODEL").unwrap_or(default.embedding.model),
                dimension: parse_var(&lookup, "OLLAMA_EMBED_DIM")
                    .unwrap_or(default.embedding.dimension),
            },
            reranker,
        }
    }

    /// Deadline for the re-ranking stage.
    pub fn rerank_timeout(&self) -> Duration {
        Duration::from_millis(self.rerank_timeout_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::Config("top_k must be at least 1".to_string()));
        }
        if self.retrieval_k < self.top_k {
            return Err(Error::Config(format!(
                "retrieval_k ({}) must not be smaller than top_k ({})",
                self.retrieval_k, self.top_k
            )));
        }
        if self.recency_window_days == 0 {
            return Err(Error::Config(
                "recency_window_days must be at least 1".to_string(),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(Error::Config(
                "embedding dimension must be positive".to_string(),
            ));
        }
        if self.embedding.model.trim().is_empty() {
            return Err(Error::Config("embedding model cannot be empty".to_string()));
        }
        check_url("embedding.base_url", &self.embedding.base_url)?;
        if let Some(reranker) = &self.reranker {
            check_url("reranker.base_url", &reranker.base_url)?;
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(name).and_then(|v| v.trim().parse().ok())
}

fn check_url(field: &str, url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "{field} must start with http:// or https://, got: {url}"
        )))
    }
}

/// Substitute `${VAR_NAME}` placeholders. Unknown variables are left as-is.
fn substitute_vars<F>(content: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| Error::Internal(format!("placeholder pattern: {e}")))?;
    Ok(re
        .replace_all(content, |caps: &Captures| {
            let name = &caps[1];
            lookup(name).unwrap_or_else(|| format!("${{{}}}", name))
        })
        .into_owned())
}
