//! Submission of batch work to the managed compute service.
//!
//! The submitters are stateless: they build a provider-neutral request from
//! configuration and hand it to a `ComputeJobService`. Nothing here waits for
//! or observes the submitted job.

pub mod events;
pub mod handlers;
pub mod requests;
pub mod sagemaker;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::config::Config;
use crate::errors::AppError;

pub use requests::{ProcessingJobRequest, TrainingJobRequest};
pub use sagemaker::SageMakerJobService;

#[async_trait]
pub trait ComputeJobService: Send + Sync {
    /// Returns the provider's identifier (ARN) for the created job.
    async fn submit_processing_job(&self, req: &ProcessingJobRequest) -> Result<String, AppError>;

    async fn submit_training_job(&self, req: &TrainingJobRequest) -> Result<String, AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Processing,
    Training,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmittedJob {
    pub kind: JobKind,
    pub job_name: String,
    pub job_arn: String,
}

fn job_identity(config: &Config) -> Result<(&str, &str), AppError> {
    config
        .compute_job_identity()
        .map_err(|e| AppError::Validation(e.to_string()))
}

/// Submits the embedding-generation processing job.
pub async fn submit_processing(
    service: &dyn ComputeJobService,
    config: &Config,
) -> Result<SubmittedJob, AppError> {
    let (role, image) = job_identity(config)?;
    let req = ProcessingJobRequest::embeddings(&config.bucket, role, image, Utc::now().timestamp_millis());
    let job_arn = service.submit_processing_job(&req).await?;
    Ok(SubmittedJob {
        kind: JobKind::Processing,
        job_name: req.job_name,
        job_arn,
    })
}

/// Submits the classifier training job.
pub async fn submit_training(
    service: &dyn ComputeJobService,
    config: &Config,
) -> Result<SubmittedJob, AppError> {
    let (role, image) = job_identity(config)?;
    let req = TrainingJobRequest::classifier(&config.bucket, role, image, Utc::now().timestamp_millis());
    let job_arn = service.submit_training_job(&req).await?;
    Ok(SubmittedJob {
        kind: JobKind::Training,
        job_name: req.job_name,
        job_arn,
    })
}
