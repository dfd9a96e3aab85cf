use anyhow::{bail, Context, Result};

pub const DEFAULT_BUCKET: &str = "job-recommendation-system-dataset";
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    S3,
    Local,
}

/// Application configuration loaded from environment variables.
/// Only malformed values fail; everything else has a default.
#[derive(Debug, Clone)]
pub struct Config {
    pub bucket: String,
    pub storage_backend: StorageBackend,
    pub local_store_root: String,
    pub s3_endpoint: Option<String>,
    pub aws_region: String,
    /// Required only by the job submitters.
    pub sagemaker_role: Option<String>,
    pub ecr_image_uri: Option<String>,
    pub top_k: usize,
    pub embedder: String,
    pub embedding_dim: usize,
    pub embedding_api_url: String,
    pub embedding_api_key: Option<String>,
    pub embedding_model: String,
    pub embedding_batch_size: usize,
    pub classifier: String,
    pub train_seed: u64,
    pub test_fraction: f64,
    pub learning_rate: f32,
    pub epochs: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let storage_backend = match env_or("STORAGE_BACKEND", "s3").as_str() {
            "s3" => StorageBackend::S3,
            "local" => StorageBackend::Local,
            other => bail!("STORAGE_BACKEND must be 's3' or 'local', got '{other}'"),
        };

        let test_fraction: f64 = parse_env("TEST_FRACTION", 0.2)?;
        if !(0.0..1.0).contains(&test_fraction) {
            bail!("TEST_FRACTION must be in [0, 1), got {test_fraction}");
        }

        let top_k: usize = parse_env("TOP_K", DEFAULT_TOP_K)?;
        if top_k == 0 {
            bail!("TOP_K must be at least 1");
        }

        Ok(Config {
            bucket: env_or("BUCKET", DEFAULT_BUCKET),
            storage_backend,
            local_store_root: env_or("LOCAL_STORE_ROOT", "./data"),
            s3_endpoint: optional_env("S3_ENDPOINT"),
            aws_region: env_or("AWS_REGION", "us-east-1"),
            sagemaker_role: optional_env("SAGEMAKER_ROLE"),
            ecr_image_uri: optional_env("ECR_IMAGE_URI"),
            top_k,
            embedder: env_or("EMBEDDER", "hash"),
            embedding_dim: parse_env("EMBEDDING_DIM", DEFAULT_EMBEDDING_DIM)?,
            embedding_api_url: env_or(
                "EMBEDDING_API_URL",
                "https://api.openai.com/v1/embeddings",
            ),
            embedding_api_key: optional_env("EMBEDDING_API_KEY"),
            embedding_model: env_or("EMBEDDING_MODEL", "text-embedding-3-small"),
            embedding_batch_size: parse_env("EMBEDDING_BATCH_SIZE", 64)?,
            classifier: env_or("CLASSIFIER", "softmax"),
            train_seed: parse_env("TRAIN_SEED", 42)?,
            test_fraction,
            learning_rate: parse_env("LEARNING_RATE", 0.5)?,
            epochs: parse_env("EPOCHS", 300)?,
            port: parse_env("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }

    /// Returns the compute role and image, or an error naming the first missing one.
    pub fn compute_job_identity(&self) -> Result<(&str, &str)> {
        let role = self
            .sagemaker_role
            .as_deref()
            .context("Required environment variable 'SAGEMAKER_ROLE' is not set")?;
        let image = self
            .ecr_image_uri
            .as_deref()
            .context("Required environment variable 'ECR_IMAGE_URI' is not set")?;
        Ok((role, image))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bucket: DEFAULT_BUCKET.to_string(),
            storage_backend: StorageBackend::Local,
            local_store_root: "./data".to_string(),
            s3_endpoint: None,
            aws_region: "us-east-1".to_string(),
            sagemaker_role: None,
            ecr_image_uri: None,
            top_k: DEFAULT_TOP_K,
            embedder: "hash".to_string(),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            embedding_api_url: "https://api.openai.com/v1/embeddings".to_string(),
            embedding_api_key: None,
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_batch_size: 64,
            classifier: "softmax".to_string(),
            train_seed: 42,
            test_fraction: 0.2,
            learning_rate: 0.5,
            epochs: 300,
            port: 8080,
            rust_log: "info".to_string(),
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_documented_defaults() {
        let config = Config::default();
        assert_eq!(config.bucket, "job-recommendation-system-dataset");
        assert_eq!(config.top_k, 5);
        assert_eq!(config.embedding_dim, 384);
        assert_eq!(config.train_seed, 42);
    }

    #[test]
    fn test_compute_job_identity_requires_role() {
        let config = Config {
            ecr_image_uri: Some("123.dkr.ecr/jobrec:latest".to_string()),
            ..Config::default()
        };
        let err = config.compute_job_identity().unwrap_err();
        assert!(err.to_string().contains("SAGEMAKER_ROLE"));
    }

    #[test]
    fn test_compute_job_identity_returns_both_values() {
        let config = Config {
            sagemaker_role: Some("arn:aws:iam::1:role/sm".to_string()),
            ecr_image_uri: Some("img".to_string()),
            ..Config::default()
        };
        let (role, image) = config.compute_job_identity().unwrap();
        assert_eq!(role, "arn:aws:iam::1:role/sm");
        assert_eq!(image, "img");
    }
}
