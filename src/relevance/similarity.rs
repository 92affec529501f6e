//! Cosine similarity between embedding vectors.

use serde::{Deserialize, Serialize};

/// Errors from similarity scoring.
#[derive(Debug, thiserror::Error)]
pub enum SimilarityError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Outcome of scoring one résumé against one job description.
///
/// The refs are opaque caller-supplied identifiers (the CLI passes file
/// paths). Created once per comparison; callers append to their own history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub resume_ref: String,
    pub job_ref: String,
    pub score: f32,
}

/// Cosine similarity: dot(a,b) / (||a|| * ||b||), clamped to [-1, 1].
///
/// If either vector has zero norm the result is 0.0. That is a policy
/// choice to avoid dividing by zero, not a mathematical necessity.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }

    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        return Ok(0.0);
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
