//! In-memory vector index over job embeddings.
//!
//! Rows are stored contiguously and addressed by handle (row position). The
//! [`JobIdentifierMap`] translates stable job ids to handles; both are built
//! together from one snapshot and never reused across builds.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use karbin_core::similarity::{dot, l2_normalize};
use karbin_core::{Error, JobId, Result};

use crate::snapshot::IndexSnapshot;

/// Position of a vector inside the index.
pub type Handle = usize;

/// Bijection between job ids and index handles.
#[derive(Debug, Clone, Default)]
pub struct JobIdentifierMap {
    ids: Vec<JobId>,
    handles: HashMap<JobId, Handle>,
}

impl JobIdentifierMap {
    /// Build the map from ids in index insertion order. Position `i` in
    /// `ids` is handle `i`.
    pub fn from_ids(ids: Vec<JobId>) -> Result<Self> {
        let mut handles = HashMap::with_capacity(ids.len());
        for (handle, id) in ids.iter().enumerate() {
            if handles.insert(*id, handle).is_some() {
                return Err(Error::Snapshot(format!("duplicate job id {} in index", id)));
            }
        }
        Ok(Self { ids, handles })
    }

    pub fn handle_of(&self, job_id: JobId) -> Option<Handle> {
        self.handles.get(&job_id).copied()
    }

    pub fn job_id(&self, handle: Handle) -> Option<JobId> {
        self.ids.get(handle).copied()
    }

    pub fn ids(&self) -> &[JobId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Exact inner-product index over unit-length job vectors.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    data: Vec<f32>,
    ids: JobIdentifierMap,
    model: String,
}

impl VectorIndex {
    /// Build an index from a flat row-major vector block.
    ///
    /// Rows are re-normalized to unit length. A map whose length differs from
    /// the row count is accepted with a warning; lookups past the last row are
    /// dropped at query time.
    pub fn new(
        dimension: usize,
        mut data: Vec<f32>,
        ids: JobIdentifierMap,
        model: impl Into<String>,
    ) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::InvalidInput(
                "index dimension must be positive".to_string(),
            ));
        }
        if data.len() % dimension != 0 {
            return Err(Error::InvalidInput(format!(
                "vector block of {} floats is not a multiple of dimension {}",
                data.len(),
                dimension
            )));
        }

        for row in data.chunks_mut(dimension) {
            l2_normalize(row);
        }

        let rows = data.len() / dimension;
        if rows != ids.len() {
            warn!(
                subsystem = "search",
                component = "vector_index",
                rows,
                ids = ids.len(),
                "Identifier map does not match vector count"
            );
        }

        Ok(Self {
            dimension,
            data,
            ids,
            model: model.into(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Embedding model the vectors were produced with.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn identifiers(&self) -> &JobIdentifierMap {
        &self.ids
    }

    /// Stored vector for `handle`, or `None` past the last row.
    pub fn vector(&self, handle: Handle) -> Option<&[f32]> {
        let start = handle.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Stored vector for a job id.
    pub fn vector_for(&self, job_id: JobId) -> Option<&[f32]> {
        self.ids.handle_of(job_id).and_then(|h| self.vector(h))
    }

    /// Nearest neighbours of `query` over the whole index.
    ///
    /// The query is normalized first so scores are cosine similarities.
    /// Returns at most `n` (handle, score) pairs, best first, ties by handle.
    pub fn search(&self, query: &[f32], n: usize) -> Result<Vec<(Handle, f32)>> {
        self.check_dimension(query)?;

        let mut query = query.to_vec();
        if !l2_normalize(&mut query) {
            return Ok(Vec::new());
        }

        let mut hits: Vec<(Handle, f32)> = self
            .data
            .chunks(self.dimension)
            .enumerate()
            .map(|(handle, row)| (handle, dot(&query, row)))
            .collect();

        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        hits.truncate(n);
        Ok(hits)
    }

    /// Stored vectors for `handles`, one row per handle, in the given order.
    ///
    /// Every handle must exist; callers resolve and bounds-check first.
    pub fn reconstruct(&self, handles: &[Handle]) -> Result<Vec<&[f32]>> {
        handles
            .iter()
            .map(|&h| {
                self.vector(h).ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "handle {} out of bounds for index of {} vectors",
                        h,
                        self.len()
                    ))
                })
            })
            .collect()
    }

    /// Resolve candidate job ids to handles, sorted by job id.
    ///
    /// Ids the index has never seen are skipped silently (embedding lag).
    /// Ids mapped past the last stored row are logged and skipped.
    pub fn resolve(&self, candidates: &HashSet<JobId>) -> Vec<(JobId, Handle)> {
        let mut resolved = Vec::with_capacity(candidates.len());
        let mut missing = 0usize;

        for &job_id in candidates {
            match self.ids.handle_of(job_id) {
                Some(handle) if handle < self.len() => resolved.push((job_id, handle)),
                Some(handle) => warn!(
                    subsystem = "search",
                    component = "vector_index",
                    job_id,
                    handle,
                    len = self.len(),
                    "Identifier map points past index bounds, dropping candidate"
                ),
                None => missing += 1,
            }
        }

        if missing > 0 {
            debug!(
                dropped_count = missing,
                "Candidates absent from index (not yet embedded)"
            );
        }

        resolved.sort_unstable_by_key(|(job_id, _)| *job_id);
        resolved
    }

    pub(crate) fn check_dimension(&self, query: &[f32]) -> Result<()> {
        if query.len() != self.dimension {
            return Err(Error::InvalidInput(format!(
                "query dimension {} does not match index dimension {}",
                query.len(),
                self.dimension
            )));
        }
        Ok(())
    }
}

/// Load state of the vector index.
///
/// Built once at startup and handed to the engine. `Failed` keeps the reason
/// so it can be surfaced as "recommendations unavailable".
#[derive(Debug, Clone, Default)]
pub enum IndexState {
    #[default]
    NotLoaded,
    Failed(String),
    Ready(Arc<VectorIndex>),
}

impl IndexState {
    /// Load the snapshot at `path`. Never fails: a bad snapshot becomes
    /// `Failed` and is logged at error level.
    pub fn load(path: &std::path::Path) -> Self {
        match IndexSnapshot::load(path).and_then(IndexSnapshot::into_index) {
            Ok(index) => {
                info!(
                    subsystem = "search",
                    component = "vector_index",
                    op = "load",
                    path = %path.display(),
                    vector_count = index.len(),
                    model = index.model(),
                    "Vector index loaded"
                );
                IndexState::Ready(Arc::new(index))
            }
            Err(e) => {
                error!(
                    subsystem = "search",
                    component = "vector_index",
                    op = "load",
                    path = %path.display(),
                    error = %e,
                    "Vector index failed to load, recommendations disabled"
                );
                IndexState::Failed(e.to_string())
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, IndexState::Ready(_))
    }

    /// The loaded index, or [`Error::IndexUnavailable`].
    pub fn ready(&self) -> Result<Arc<VectorIndex>> {
        match self {
            IndexState::Ready(index) => Ok(Arc::clone(index)),
            IndexState::NotLoaded => Err(Error::IndexUnavailable(
                "vector index not loaded".to_string(),
            )),
            IndexState::Failed(reason) => Err(Error::IndexUnavailable(reason.clone())),
        }
    }
}
