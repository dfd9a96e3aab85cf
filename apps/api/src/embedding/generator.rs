use bytes::Bytes;
use serde::Serialize;
use tracing::info;

use crate::embedding::{Embedder, EmbeddingMatrix};
use crate::errors::AppError;
use crate::records::{load_jobs, load_users};
use crate::storage::{keys, BlobStore};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EmbeddingReport {
    pub embedder: String,
    pub dimension: usize,
    pub user_rows: usize,
    pub job_rows: usize,
}

/// Embeds every text in order and stacks the vectors into a matrix.
pub async fn embed_texts(
    embedder: &dyn Embedder,
    texts: &[String],
) -> Result<EmbeddingMatrix, AppError> {
    let rows = embedder.embed_batch(texts).await?;
    if rows.len() != texts.len() {
        return Err(AppError::Artifact(format!(
            "embedder '{}' returned {} vectors for {} texts",
            embedder.name(),
            rows.len(),
            texts.len()
        )));
    }
    EmbeddingMatrix::from_rows(rows, embedder.dimension())
}

/// Reads both training corpora, embeds them row-for-row and writes the
/// `processed/` matrices.
pub async fn generate_embeddings(
    store: &dyn BlobStore,
    embedder: &dyn Embedder,
) -> Result<EmbeddingReport, AppError> {
    let users = load_users(store).await?;
    let jobs = load_jobs(store).await?;
    info!(users = users.len(), jobs = jobs.len(), "Loaded training corpora");

    let user_texts: Vec<String> = users.into_iter().map(|u| u.user_text_clean).collect();
    let job_texts: Vec<String> = jobs.into_iter().map(|j| j.job_text_clean).collect();

    let user_matrix = embed_texts(embedder, &user_texts).await?;
    let job_matrix = embed_texts(embedder, &job_texts).await?;

    store
        .put(
            keys::USER_EMBEDDINGS,
            Bytes::from(user_matrix.to_npy()?),
            "application/octet-stream",
        )
        .await?;
    store
        .put(
            keys::JOB_EMBEDDINGS,
            Bytes::from(job_matrix.to_npy()?),
            "application/octet-stream",
        )
        .await?;

    info!(
        "User embeddings shape: ({}, {})",
        user_matrix.nrows(),
        user_matrix.dimension()
    );
    info!(
        "Job embeddings shape: ({}, {})",
        job_matrix.nrows(),
        job_matrix.dimension()
    );

    Ok(EmbeddingReport {
        embedder: embedder.name().to_string(),
        dimension: embedder.dimension(),
        user_rows: user_matrix.nrows(),
        job_rows: job_matrix.nrows(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::storage::LocalBlobStore;

    #[tokio::test]
    async fn test_generate_embeddings_writes_row_aligned_matrices() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        store
            .put(
                keys::TRAINING_USERS,
                Bytes::from_static(b"id,user_text_clean\nu1,rust developer\nu2,sales lead\nu3,nurse\n"),
                "text/csv",
            )
            .await
            .unwrap();
        store
            .put(
                keys::TRAINING_JOBS,
                Bytes::from_static(b"id,category,job_text_clean\nj1,eng,rust backend\nj2,sales,account executive\n"),
                "text/csv",
            )
            .await
            .unwrap();

        let embedder = HashEmbedder::new(32);
        let report = generate_embeddings(&store, &embedder).await.unwrap();
        assert_eq!(report.user_rows, 3);
        assert_eq!(report.job_rows, 2);
        assert_eq!(report.dimension, 32);

        let users = EmbeddingMatrix::from_npy(
            &store.get(keys::USER_EMBEDDINGS).await.unwrap(),
            keys::USER_EMBEDDINGS,
        )
        .unwrap();
        assert_eq!(users.nrows(), 3);
        assert_eq!(users.dimension(), 32);
        assert_eq!(users.row(0).to_vec(), embedder.embed_text("rust developer"));
    }

    #[tokio::test]
    async fn test_generate_embeddings_fails_without_corpora() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let err = generate_embeddings(&store, &HashEmbedder::new(8))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }
}
