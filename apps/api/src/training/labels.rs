use crate::embedding::EmbeddingMatrix;
use crate::errors::AppError;
use crate::ranking::{argmax, similarity_scores};

/// Gives each user the category of its most similar job (first index on ties).
/// The result is row-aligned with `users`.
pub fn assign_labels(
    users: &EmbeddingMatrix,
    jobs: &EmbeddingMatrix,
    job_categories: &[String],
) -> Result<Vec<String>, AppError> {
    if jobs.nrows() == 0 {
        return Err(AppError::Artifact(
            "cannot assign labels: there are no job records".to_string(),
        ));
    }
    jobs.expect_rows(job_categories.len(), "job")?;
    if users.dimension() != jobs.dimension() {
        return Err(AppError::Artifact(format!(
            "user embeddings have dimension {}, job embeddings have {}",
            users.dimension(),
            jobs.dimension()
        )));
    }

    (0..users.nrows())
        .map(|idx| {
            let scores = similarity_scores(users.row(idx), jobs.view())?;
            let best = argmax(&scores).ok_or_else(|| {
                AppError::Artifact(format!("user row {idx} has no comparable job similarity"))
            })?;
            Ok(job_categories[best].clone())
        })
        .collect()
}
