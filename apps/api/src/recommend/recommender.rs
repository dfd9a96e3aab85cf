use serde::Serialize;
use tracing::{debug, info};

use crate::embedding::EmbeddingMatrix;
use crate::errors::AppError;
use crate::ranking::{similarity_scores, top_k};
use crate::records::{load_jobs, load_users, JobRecord, UserRecord};
use crate::storage::{keys, BlobStore};
use crate::training::{load_latest, ModelArtifacts};

/// Everything a query needs, loaded together from the store.
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    pub model: ModelArtifacts,
    pub archive_key: String,
    pub users: Vec<UserRecord>,
    pub jobs: Vec<JobRecord>,
    pub user_embeddings: EmbeddingMatrix,
    pub job_embeddings: EmbeddingMatrix,
}

impl ArtifactSet {
    /// Checks row alignment between every matrix and its corpus.
    pub fn new(
        model: ModelArtifacts,
        archive_key: String,
        users: Vec<UserRecord>,
        jobs: Vec<JobRecord>,
        user_embeddings: EmbeddingMatrix,
        job_embeddings: EmbeddingMatrix,
    ) -> Result<Self, AppError> {
        user_embeddings.expect_rows(users.len(), "user")?;
        job_embeddings.expect_rows(jobs.len(), "job")?;
        Ok(Self {
            model,
            archive_key,
            users,
            jobs,
            user_embeddings,
            job_embeddings,
        })
    }

    pub async fn load(store: &dyn BlobStore) -> Result<Self, AppError> {
        let (model, archive_key) = load_latest(store).await?;
        let user_embeddings = EmbeddingMatrix::from_npy(
            &store.get(keys::USER_EMBEDDINGS).await?,
            keys::USER_EMBEDDINGS,
        )?;
        let job_embeddings = EmbeddingMatrix::from_npy(
            &store.get(keys::JOB_EMBEDDINGS).await?,
            keys::JOB_EMBEDDINGS,
        )?;
        let users = load_users(store).await?;
        let jobs = load_jobs(store).await?;
        debug!(
            archive = %archive_key,
            users = users.len(),
            jobs = jobs.len(),
            "Loaded artifact set"
        );
        Self::new(model, archive_key, users, jobs, user_embeddings, job_embeddings)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedJob {
    #[serde(flatten)]
    pub job: JobRecord,
    pub similarity_score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub user_id: String,
    pub predicted_category: String,
    pub top_jobs: Vec<RankedJob>,
}

/// Predicts the user's category and ranks every job by cosine similarity.
/// Returns `min(k, #jobs)` jobs, best first, ties in row order.
pub fn recommend(set: &ArtifactSet, user_id: &str, k: usize) -> Result<Recommendation, AppError> {
    let row = set
        .users
        .iter()
        .position(|u| u.id == user_id)
        .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;
    let embedding = set.user_embeddings.row(row);

    let code = set.model.classifier.predict(embedding)?;
    let predicted_category = set
        .model
        .vocabulary
        .decode(code)
        .ok_or_else(|| {
            AppError::Artifact(format!("predicted code {code} is outside the label vocabulary"))
        })?
        .to_string();

    let scores = similarity_scores(embedding, set.job_embeddings.view())?;
    let top_jobs = top_k(&scores, k)
        .into_iter()
        .map(|(idx, similarity_score)| RankedJob {
            job: set.jobs[idx].clone(),
            similarity_score,
        })
        .collect::<Vec<_>>();

    info!(
        user_id,
        category = %predicted_category,
        returned = top_jobs.len(),
        "Recommendation served"
    );

    Ok(Recommendation {
        user_id: user_id.to_string(),
        predicted_category,
        top_jobs,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::training::artifacts::ModelMetadata;
    use crate::training::classifier::{Classifier, ClassifierKind, FitParams};
    use crate::training::vocabulary::LabelVocabulary;
    use chrono::Utc;
    use ndarray::{array, Array2};

    pub(crate) fn job(id: &str, category: &str) -> JobRecord {
        JobRecord {
            id: id.to_string(),
            jobroles: format!("{category} role"),
            company: "Acme".to_string(),
            category: category.to_string(),
            location: "Remote".to_string(),
            jobdescription: String::new(),
            job_text_clean: String::new(),
        }
    }

    pub(crate) fn user(id: &str) -> UserRecord {
        UserRecord {
            id: id.to_string(),
            user_text_clean: String::new(),
        }
    }

    pub(crate) fn artifact_set(job_rows: Array2<f32>, jobs: Vec<JobRecord>) -> ArtifactSet {
        let user_rows = array![[1.0f32, 0.0], [0.0, 1.0]];
        let centroids_x = array![[1.0f32, 0.0], [0.0, 1.0]];
        let vocabulary = LabelVocabulary::fit(&["eng", "sales"]);
        let classifier = Classifier::fit(
            ClassifierKind::Centroid,
            centroids_x.view(),
            &[0, 1],
            2,
            FitParams::default(),
        )
        .unwrap();
        let model = ModelArtifacts {
            classifier,
            metadata: ModelMetadata {
                run_id: "test".to_string(),
                trained_at: Utc::now(),
                classifier: ClassifierKind::Centroid,
                accuracy: 1.0,
                train_rows: 2,
                test_rows: 2,
                embedding_dim: 2,
                classes: vocabulary.classes().to_vec(),
            },
            vocabulary,
        };
        ArtifactSet::new(
            model,
            "models/runs/test/model.tar.gz".to_string(),
            vec![user("u1"), user("u2")],
            jobs,
            EmbeddingMatrix::new(user_rows),
            EmbeddingMatrix::new(job_rows),
        )
        .unwrap()
    }

    fn three_jobs() -> ArtifactSet {
        artifact_set(
            array![[0.0f32, 1.0], [1.0, 0.0], [0.7, 0.7]],
            vec![job("j0", "sales"), job("j1", "eng"), job("j2", "eng")],
        )
    }

    #[test]
    fn test_recommend_ranks_by_similarity() {
        let rec = recommend(&three_jobs(), "u1", 5).unwrap();
        assert_eq!(rec.user_id, "u1");
        assert_eq!(rec.predicted_category, "eng");
        let ids: Vec<&str> = rec.top_jobs.iter().map(|j| j.job.id.as_str()).collect();
        assert_eq!(ids, vec!["j1", "j2", "j0"]);
        assert!(rec
            .top_jobs
            .windows(2)
            .all(|w| w[0].similarity_score >= w[1].similarity_score));
    }

    #[test]
    fn test_k_larger_than_job_count_returns_every_job_once() {
        let set = artifact_set(array![[1.0f32, 0.0]], vec![job("only", "eng")]);
        let rec = recommend(&set, "u1", 2).unwrap();
        assert_eq!(rec.top_jobs.len(), 1);
        assert_eq!(rec.top_jobs[0].job.id, "only");
    }

    #[test]
    fn test_k_truncates() {
        let rec = recommend(&three_jobs(), "u2", 2).unwrap();
        assert_eq!(rec.predicted_category, "sales");
        assert_eq!(rec.top_jobs.len(), 2);
        assert_eq!(rec.top_jobs[0].job.id, "j0");
    }

    #[test]
    fn test_ties_keep_row_order() {
        let set = artifact_set(
            array![[1.0f32, 0.0], [2.0, 0.0], [3.0, 0.0]],
            vec![job("a", "eng"), job("b", "eng"), job("c", "eng")],
        );
        let rec = recommend(&set, "u1", 3).unwrap();
        let ids: Vec<&str> = rec.top_jobs.iter().map(|j| j.job.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_repeated_queries_are_identical() {
        let set = three_jobs();
        assert_eq!(recommend(&set, "u1", 3).unwrap(), recommend(&set, "u1", 3).unwrap());
    }

    #[test]
    fn test_unknown_user_is_not_found() {
        let err = recommend(&three_jobs(), "ghost", 5).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(err.to_string(), "Not found: User ghost not found");
    }

    #[test]
    fn test_job_dimension_mismatch_is_an_artifact_error() {
        let set = artifact_set(array![[1.0f32, 0.0, 0.0]], vec![job("j", "eng")]);
        let err = recommend(&set, "u1", 1).unwrap_err();
        assert!(matches!(err, AppError::Artifact(_)));
    }

    #[test]
    fn test_misaligned_corpus_is_rejected() {
        let set = three_jobs();
        let err = ArtifactSet::new(
            set.model,
            set.archive_key,
            vec![user("u1")],
            set.jobs,
            set.user_embeddings,
            set.job_embeddings,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Artifact(_)));
    }

    #[test]
    fn test_ranked_job_serializes_flat() {
        let rec = recommend(&three_jobs(), "u1", 1).unwrap();
        let json = serde_json::to_value(&rec).unwrap();
        let first = &json["top_jobs"][0];
        assert_eq!(first["id"], "j1");
        assert_eq!(first["category"], "eng");
        assert!(first["similarity_score"].as_f64().unwrap() > 0.99);
    }
}
