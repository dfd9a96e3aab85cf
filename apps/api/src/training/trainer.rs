use chrono::Utc;
use ndarray::Axis;
use tracing::{info, warn};

use crate::config::Config;
use crate::embedding::EmbeddingMatrix;
use crate::errors::AppError;
use crate::records::{load_jobs, load_users};
use crate::storage::{keys, BlobStore};
use crate::training::artifacts::{new_run_id, publish, LatestPointer, ModelArtifacts, ModelMetadata};
use crate::training::classifier::{accuracy, Classifier, ClassifierKind, FitParams};
use crate::training::labels::assign_labels;
use crate::training::split::train_test_split;
use crate::training::vocabulary::LabelVocabulary;

#[derive(Debug, Clone, Copy)]
pub struct TrainingOptions {
    pub classifier: ClassifierKind,
    pub seed: u64,
    pub test_fraction: f64,
    pub params: FitParams,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            classifier: ClassifierKind::Softmax,
            seed: 42,
            test_fraction: 0.2,
            params: FitParams::default(),
        }
    }
}

impl TrainingOptions {
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Ok(Self {
            classifier: config.classifier.parse()?,
            seed: config.train_seed,
            test_fraction: config.test_fraction,
            params: FitParams {
                learning_rate: config.learning_rate,
                epochs: config.epochs,
                ..FitParams::default()
            },
        })
    }
}

/// Derives labels, fits the classifier and packages the artifact set.
/// CPU-bound; callers on the async runtime should use `spawn_blocking`.
pub fn train_model(
    users: &EmbeddingMatrix,
    jobs: &EmbeddingMatrix,
    job_categories: &[String],
    options: TrainingOptions,
) -> Result<ModelArtifacts, AppError> {
    if users.nrows() == 0 {
        return Err(AppError::Artifact(
            "cannot train: there are no user records".to_string(),
        ));
    }

    let labels = assign_labels(users, jobs, job_categories)?;
    let vocabulary = LabelVocabulary::fit(&labels);
    let codes = vocabulary.encode_all(&labels)?;

    let split = train_test_split(users.nrows(), options.test_fraction, options.seed);
    if split.degenerate {
        warn!("Fewer than two records; training and evaluating on the same rows");
    }

    let train_x = users.view().select(Axis(0), &split.train);
    let train_y: Vec<usize> = split.train.iter().map(|&i| codes[i]).collect();
    let classifier = Classifier::fit(
        options.classifier,
        train_x.view(),
        &train_y,
        vocabulary.len(),
        options.params,
    )?;

    // An empty test share evaluates on the training rows instead.
    let eval_rows = if split.test.is_empty() {
        &split.train
    } else {
        &split.test
    };
    let eval_x = users.view().select(Axis(0), eval_rows);
    let eval_y: Vec<usize> = eval_rows.iter().map(|&i| codes[i]).collect();
    let predicted = classifier.predict_rows(eval_x.view())?;
    let score = accuracy(&predicted, &eval_y);
    info!(
        classifier = %options.classifier,
        classes = vocabulary.len(),
        train_rows = split.train.len(),
        test_rows = eval_rows.len(),
        "Validation accuracy: {score:.4}"
    );

    let trained_at = Utc::now();
    let metadata = ModelMetadata {
        run_id: new_run_id(trained_at),
        trained_at,
        classifier: classifier.kind(),
        accuracy: score,
        train_rows: split.train.len(),
        test_rows: eval_rows.len(),
        embedding_dim: users.dimension(),
        classes: vocabulary.classes().to_vec(),
    };

    Ok(ModelArtifacts {
        classifier,
        vocabulary,
        metadata,
    })
}

/// Full training stage: load matrices and corpora, train, publish.
pub async fn train_from_store(
    store: &dyn BlobStore,
    options: TrainingOptions,
) -> Result<LatestPointer, AppError> {
    let users = EmbeddingMatrix::from_npy(
        &store.get(keys::USER_EMBEDDINGS).await?,
        keys::USER_EMBEDDINGS,
    )?;
    let jobs = EmbeddingMatrix::from_npy(
        &store.get(keys::JOB_EMBEDDINGS).await?,
        keys::JOB_EMBEDDINGS,
    )?;
    info!("User embeddings shape: ({}, {})", users.nrows(), users.dimension());
    info!("Job embeddings shape: ({}, {})", jobs.nrows(), jobs.dimension());

    let user_records = load_users(store).await?;
    let job_records = load_jobs(store).await?;
    users.expect_rows(user_records.len(), "user")?;
    jobs.expect_rows(job_records.len(), "job")?;

    let categories: Vec<String> = job_records.into_iter().map(|j| j.category).collect();
    let artifacts = tokio::task::spawn_blocking(move || {
        train_model(&users, &jobs, &categories, options)
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("training task failed: {e}")))??;

    publish(store, &artifacts).await
}
