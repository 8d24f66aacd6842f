//! Persisted index snapshot.
//!
//! A snapshot bundles the job id list and the vector block into one file, so
//! the two can never be deployed out of step. Load validates the bundle and
//! fails loudly on any inconsistency.
//!
//! On disk the snapshot is JSON. The vector block is base64 of little-endian
//! `f32` values, row-major, and `checksum` is BLAKE3 over the id list
//! (little-endian `i64`) followed by the vector bytes.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use karbin_core::similarity::l2_normalize;
use karbin_core::text::job_text;
use karbin_core::{defaults, EmbeddingBackend, Error, JobId, JobStore, Result};

use crate::vector_index::{JobIdentifierMap, VectorIndex};

/// Versioned, self-checking bundle of job ids and their vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub format_version: u32,
    /// Embedding model that produced the vectors.
    pub model: String,
    pub dimension: usize,
    /// Number of vectors; must equal `job_ids.len()`.
    pub count: usize,
    /// Hex BLAKE3 digest over ids and vector bytes.
    pub checksum: String,
    pub created_at: DateTime<Utc>,
    pub job_ids: Vec<JobId>,
    #[serde(with = "vector_block")]
    pub vectors: Vec<f32>,
}

impl IndexSnapshot {
    /// Bundle ids and a row-major vector block, computing count and checksum.
    pub fn new(
        model: impl Into<String>,
        dimension: usize,
        job_ids: Vec<JobId>,
        vectors: Vec<f32>,
    ) -> Result<Self> {
        let snapshot = Self {
            format_version: defaults::SNAPSHOT_FORMAT_VERSION,
            model: model.into(),
            dimension,
            count: job_ids.len(),
            checksum: checksum(&job_ids, &vectors),
            created_at: Utc::now(),
            job_ids,
            vectors,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Check every internal consistency rule.
    pub fn validate(&self) -> Result<()> {
        if self.format_version != defaults::SNAPSHOT_FORMAT_VERSION {
            return Err(Error::Snapshot(format!(
                "unsupported format version {} (expected {})",
                self.format_version,
                defaults::SNAPSHOT_FORMAT_VERSION
            )));
        }
        if self.dimension == 0 {
            return Err(Error::Snapshot("dimension must be positive".to_string()));
        }
        if self.count != self.job_ids.len() {
            return Err(Error::Snapshot(format!(
                "count {} does not match {} job ids",
                self.count,
                self.job_ids.len()
            )));
        }
        let expected = self.count.checked_mul(self.dimension).ok_or_else(|| {
            Error::Snapshot("count × dimension overflows".to_string())
        })?;
        if self.vectors.len() != expected {
            return Err(Error::Snapshot(format!(
                "vector block holds {} floats, expected {} ({} × {})",
                self.vectors.len(),
                expected,
                self.count,
                self.dimension
            )));
        }
        let actual = checksum(&self.job_ids, &self.vectors);
        if actual != self.checksum {
            return Err(Error::Snapshot(format!(
                "checksum mismatch: stored {}, computed {}",
                self.checksum, actual
            )));
        }
        // Duplicate ids are caught when building the identifier map.
        JobIdentifierMap::from_ids(self.job_ids.clone())?;
        Ok(())
    }

    /// Read and validate a snapshot file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Snapshot(format!("cannot read {}: {}", path.display(), e))
        })?;
        let snapshot: Self = serde_json::from_str(&content).map_err(|e| {
            Error::Snapshot(format!("cannot parse {}: {}", path.display(), e))
        })?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Write the snapshot atomically: a sibling temp file is written in full,
    /// then renamed over `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);

        let content = serde_json::to_vec(self)?;
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;

        info!(
            subsystem = "search",
            component = "snapshot",
            op = "save",
            path = %path.display(),
            vector_count = self.count,
            model = %self.model,
            "Index snapshot written"
        );
        Ok(())
    }

    /// Turn the snapshot into a searchable index.
    pub fn into_index(self) -> Result<VectorIndex> {
        let ids = JobIdentifierMap::from_ids(self.job_ids)?;
        VectorIndex::new(self.dimension, self.vectors, ids, self.model)
    }
}

/// BLAKE3 over ids then vector bytes, little-endian, hex encoded.
pub fn checksum(job_ids: &[JobId], vectors: &[f32]) -> String {
    let mut hasher = blake3::Hasher::new();
    for id in job_ids {
        hasher.update(&id.to_le_bytes());
    }
    for v in vectors {
        hasher.update(&v.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

mod vector_block {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(vectors: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
        let bytes: Vec<u8> = vectors.iter().flat_map(|v| v.to_le_bytes()).collect();
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = STANDARD.decode(encoded.as_bytes()).map_err(de::Error::custom)?;
        if bytes.len() % 4 != 0 {
            return Err(de::Error::custom(format!(
                "vector block length {} is not a multiple of 4",
                bytes.len()
            )));
        }
        Ok(bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

/// Embeds the active job inventory into a fresh snapshot.
pub struct SnapshotBuilder {
    jobs: Arc<dyn JobStore>,
    embedder: Arc<dyn EmbeddingBackend>,
    batch_size: usize,
}

impl SnapshotBuilder {
    pub fn new(jobs: Arc<dyn JobStore>, embedder: Arc<dyn EmbeddingBackend>) -> Self {
        Self {
            jobs,
            embedder,
            batch_size: defaults::EMBED_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Embed up to `limit` active jobs (newest first).
    ///
    /// Jobs whose embedding comes back as a zero vector are left out with a
    /// warning; they simply never rank.
    #[instrument(
        skip(self),
        fields(subsystem = "search", component = "snapshot", op = "build")
    )]
    pub async fn build(&self, limit: Option<i64>) -> Result<IndexSnapshot> {
        let start = Instant::now();
        let jobs = self.jobs.embeddable_jobs(limit).await?;
        let dimension = self.embedder.dimension();

        let mut job_ids = Vec::with_capacity(jobs.len());
        let mut vectors = Vec::with_capacity(jobs.len() * dimension);

        for batch in jobs.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(job_text).collect();
            let embedded = self.embedder.embed_texts(&texts).await?;
            if embedded.len() != batch.len() {
                return Err(Error::Embedding(format!(
                    "embedder returned {} vectors for {} jobs",
                    embedded.len(),
                    batch.len()
                )));
            }

            for (job, mut vector) in batch.iter().zip(embedded) {
                if vector.len() != dimension {
                    return Err(Error::Embedding(format!(
                        "job {} embedded to dimension {}, expected {}",
                        job.id,
                        vector.len(),
                        dimension
                    )));
                }
                if !l2_normalize(&mut vector) {
                    warn!(job_id = job.id, "Zero embedding, job left out of index");
                    continue;
                }
                job_ids.push(job.id);
                vectors.extend(vector);
            }
            debug!(
                input_count = batch.len(),
                vector_count = job_ids.len(),
                "Embedded job batch"
            );
        }

        info!(
            vector_count = job_ids.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            model = self.embedder.model_name(),
            "Index snapshot built"
        );
        IndexSnapshot::new(self.embedder.model_name(), dimension, job_ids, vectors)
    }

    /// Build and atomically write to `path`.
    pub async fn build_to(&self, limit: Option<i64>, path: &Path) -> Result<IndexSnapshot> {
        let snapshot = self.build(limit).await?;
        snapshot.save(path)?;
        Ok(snapshot)
    }
}
