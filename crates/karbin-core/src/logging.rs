//! Structured logging schema for karbin.
//!
//! Every crate logs through `tracing` with the same field names so log
//! aggregation can query each pipeline stage the same way. Field names are
//! written literally at call sites; shared field *values* live here.
//!
//! ## Fields
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `request_id` | UUIDv7 correlating one `recommend` call |
//! | `subsystem` | `search`, `db`, `inference` or `cli` |
//! | `component` | Part of a subsystem: `ranker`, `reranker`, `pool`, ... |
//! | `op` | Logical operation: `recommend`, `rank`, `embed_texts`, ... |
//! | `user_id`, `job_id` | Entities being processed |
//! | `duration_ms` | Wall-clock time of the stage |
//! | `result_count`, `candidate_count`, `input_count` | Stage sizes |
//! | `pool_size`, `pool_idle` | Connection pool state |
//! | `model` | Model behind an inference call |
//! | `fallback` | Degraded path taken, see [`FALLBACK_CHEAP_PATH`] |
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention (index failed to load) |
//! | WARN  | Recoverable issue, automatic fallback applied (dropped candidate, re-rank timeout) |
//! | INFO  | Lifecycle events (index load, snapshot write, pool creation) |
//! | DEBUG | Decision points and per-stage counts |
//! | TRACE | Per-item iteration (individual scores) |

/// `fallback` value when re-ranking is skipped or abandoned and the ranker's
/// order is served as is.
pub const FALLBACK_CHEAP_PATH: &str = "cheap_path";
