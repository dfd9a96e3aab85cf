//! Cosine similarity and ranking over dense embedding matrices.

use ndarray::{ArrayView1, ArrayView2};

use crate::errors::AppError;

/// Cosine similarity in [-1, 1]. A zero vector on either side scores 0.0.
/// Callers must pass equal-length vectors.
pub fn cosine_similarity(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let dot = a.dot(&b);
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Scores `query` against every row of `matrix`, row-aligned.
pub fn similarity_scores(
    query: ArrayView1<f32>,
    matrix: ArrayView2<f32>,
) -> Result<Vec<f32>, AppError> {
    if query.len() != matrix.ncols() {
        return Err(AppError::Artifact(format!(
            "embedding dimension mismatch: query has {} values, matrix rows have {}",
            query.len(),
            matrix.ncols()
        )));
    }

    Ok(matrix
        .outer_iter()
        .map(|row| cosine_similarity(query, row))
        .collect())
}

/// Index of the highest score; ties go to the earliest index. NaN scores are skipped.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((idx, score));
        }
    }
    best.map(|(idx, _)| idx)
}

/// The `k` highest scores in descending order, ties broken by ascending index.
/// Returns `min(k, scores.len())` distinct indices.
pub fn top_k(scores: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    // stable sort keeps row order among equal scores
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or_else(|| a.1.is_nan().cmp(&b.1.is_nan()))
    });
    ranked.truncate(k);
    ranked
}
