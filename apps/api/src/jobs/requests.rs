use serde::Serialize;
use uuid::Uuid;

use crate::storage::keys;

pub const PROCESSING_INSTANCE_TYPE: &str = "ml.t3.medium";
pub const TRAINING_INSTANCE_TYPE: &str = "ml.t3.2xlarge";
pub const VOLUME_SIZE_GB: i32 = 30;
pub const TRAINING_MAX_RUNTIME_SECS: i32 = 3600;

pub const PROCESSING_INPUT_PATH: &str = "/opt/ml/processing/input";
pub const PROCESSING_OUTPUT_PATH: &str = "/opt/ml/processing/output";

/// Binary name inside the container image.
const ENTRYPOINT_BINARY: &str = "jobrec-api";

/// Provider-neutral description of a batch processing job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingJobRequest {
    pub job_name: String,
    pub role_arn: String,
    pub image_uri: String,
    pub entrypoint: Vec<String>,
    pub instance_type: String,
    pub instance_count: i32,
    pub volume_size_gb: i32,
    pub input_s3_uri: String,
    pub input_local_path: String,
    pub output_s3_uri: String,
    pub output_local_path: String,
    pub environment: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputChannel {
    pub name: String,
    pub s3_uri: String,
}

/// Provider-neutral description of a training job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingJobRequest {
    pub job_name: String,
    pub role_arn: String,
    pub image_uri: String,
    pub instance_type: String,
    pub instance_count: i32,
    pub volume_size_gb: i32,
    pub max_runtime_secs: i32,
    pub channels: Vec<InputChannel>,
    pub output_s3_uri: String,
    pub hyperparameters: Vec<(String, String)>,
    pub environment: Vec<(String, String)>,
}

fn s3_uri(bucket: &str, key: &str) -> String {
    format!("s3://{bucket}/{key}")
}

/// Containers talk to the same bucket through the S3 backend.
fn container_environment(bucket: &str) -> Vec<(String, String)> {
    vec![
        ("BUCKET".to_string(), bucket.to_string()),
        ("STORAGE_BACKEND".to_string(), "s3".to_string()),
    ]
}

impl ProcessingJobRequest {
    /// Embedding generation over `training/`, results uploaded to `processed/`.
    pub fn embeddings(bucket: &str, role_arn: &str, image_uri: &str, now_millis: i64) -> Self {
        Self {
            job_name: format!("process-embeddings-{now_millis}"),
            role_arn: role_arn.to_string(),
            image_uri: image_uri.to_string(),
            entrypoint: vec![ENTRYPOINT_BINARY.to_string(), "embed".to_string()],
            instance_type: PROCESSING_INSTANCE_TYPE.to_string(),
            instance_count: 1,
            volume_size_gb: VOLUME_SIZE_GB,
            input_s3_uri: s3_uri(bucket, keys::TRAINING_PREFIX.trim_end_matches('/')),
            input_local_path: PROCESSING_INPUT_PATH.to_string(),
            output_s3_uri: s3_uri(bucket, keys::PROCESSED_PREFIX),
            output_local_path: PROCESSING_OUTPUT_PATH.to_string(),
            environment: container_environment(bucket),
        }
    }
}

impl TrainingJobRequest {
    /// Classifier training over `processed/` and `training/`, output under `models/latest/`.
    pub fn classifier(bucket: &str, role_arn: &str, image_uri: &str, now_millis: i64) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self {
            job_name: format!("train-model-{now_millis}-{}", &suffix[..8]),
            role_arn: role_arn.to_string(),
            image_uri: image_uri.to_string(),
            instance_type: TRAINING_INSTANCE_TYPE.to_string(),
            instance_count: 1,
            volume_size_gb: VOLUME_SIZE_GB,
            max_runtime_secs: TRAINING_MAX_RUNTIME_SECS,
            channels: vec![
                InputChannel {
                    name: "npy".to_string(),
                    s3_uri: s3_uri(bucket, keys::PROCESSED_PREFIX),
                },
                InputChannel {
                    name: "csv".to_string(),
                    s3_uri: s3_uri(bucket, keys::TRAINING_PREFIX),
                },
            ],
            output_s3_uri: s3_uri(bucket, keys::MODELS_LATEST_PREFIX),
            hyperparameters: vec![("script".to_string(), "train".to_string())],
            environment: container_environment(bucket),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_request_layout() {
        let req = ProcessingJobRequest::embeddings("bkt", "arn:role", "img:1", 1_700_000_000_123);
        assert_eq!(req.job_name, "process-embeddings-1700000000123");
        assert_eq!(req.input_s3_uri, "s3://bkt/training");
        assert_eq!(req.input_local_path, "/opt/ml/processing/input");
        assert_eq!(req.output_s3_uri, "s3://bkt/processed/");
        assert_eq!(req.output_local_path, "/opt/ml/processing/output");
        assert_eq!(req.instance_type, "ml.t3.medium");
        assert_eq!(req.volume_size_gb, 30);
        assert_eq!(req.entrypoint, vec!["jobrec-api", "embed"]);
    }

    #[test]
    fn test_training_request_layout() {
        let req = TrainingJobRequest::classifier("bkt", "arn:role", "img:1", 42);
        let suffix = req.job_name.strip_prefix("train-model-42-").unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));

        assert_eq!(req.instance_type, "ml.t3.2xlarge");
        assert_eq!(req.max_runtime_secs, 3600);
        assert_eq!(req.output_s3_uri, "s3://bkt/models/latest/");
        assert_eq!(
            req.channels,
            vec![
                InputChannel { name: "npy".into(), s3_uri: "s3://bkt/processed/".into() },
                InputChannel { name: "csv".into(), s3_uri: "s3://bkt/training/".into() },
            ]
        );
        assert_eq!(req.hyperparameters, vec![("script".to_string(), "train".to_string())]);
    }

    #[test]
    fn test_training_job_names_are_unique() {
        let a = TrainingJobRequest::classifier("b", "r", "i", 1);
        let b = TrainingJobRequest::classifier("b", "r", "i", 1);
        assert_ne!(a.job_name, b.job_name);
    }
}
