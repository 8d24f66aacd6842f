//! Vector math used by the index, ranker and evaluation metrics.

use crate::error::{Error, Result};

/// Euclidean norm.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale `v` to unit length in place. Returns `false` (leaving `v`
/// untouched) for a zero or non-finite vector.
pub fn l2_normalize(v: &mut [f32]) -> bool {
    let norm = l2_norm(v);
    if norm == 0.0 || !norm.is_finite() {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}

/// Inner product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine similarity in [-1, 1]. Zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::InvalidInput(format!(
            "dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let denom = l2_norm(a) * l2_norm(b);
    if denom == 0.0 {
        return Ok(0.0);
    }
    Ok((dot(a, b) / denom).clamp(-1.0, 1.0))
}
