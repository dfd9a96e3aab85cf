//! Blob storage behind a small async trait.
//!
//! Production uses S3 (`S3BlobStore`); batch containers and tests use a
//! directory on disk (`LocalBlobStore`). Keys are always `/`-separated.

pub mod local;
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use crate::config::{Config, StorageBackend};

pub use local::LocalBlobStore;
pub use s3::S3BlobStore;

/// Well-known object keys and prefixes shared by every pipeline stage.
pub mod keys {
    pub const DATASET_USERS_PREFIX: &str = "dataset/userdetails/";
    pub const DATASET_JOBS_PREFIX: &str = "dataset/jobpost/";

    pub const TRAINING_PREFIX: &str = "training/";
    pub const TRAINING_USERS: &str = "training/user_profiles_cleaned.csv";
    pub const TRAINING_JOBS: &str = "training/job_listings_cleaned.csv";

    pub const PROCESSED_PREFIX: &str = "processed/";
    pub const USER_EMBEDDINGS: &str = "processed/user_embeddings.npy";
    pub const JOB_EMBEDDINGS: &str = "processed/job_embeddings.npy";

    pub const MODELS_PREFIX: &str = "models/";
    pub const MODELS_LATEST_PREFIX: &str = "models/latest/";
    pub const LATEST_POINTER: &str = "models/latest/pointer.json";
    pub const ARCHIVE_SUFFIX: &str = "model.tar.gz";

    pub fn run_archive(run_id: &str) -> String {
        format!("models/runs/{run_id}/{ARCHIVE_SUFFIX}")
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object '{0}' does not exist")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub last_modified: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Human-readable location, used in logs only.
    fn describe(&self) -> String;

    async fn get(&self, key: &str) -> Result<Bytes, StorageError>;

    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StorageError>;

    /// Lists every object whose key starts with `prefix`, sorted by key.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError>;
}

/// Constructs the configured blob store.
pub async fn build_store(config: &Config) -> Arc<dyn BlobStore> {
    match config.storage_backend {
        StorageBackend::S3 => {
            let store = S3BlobStore::from_config(config).await;
            info!("Blob store initialized: {}", store.describe());
            Arc::new(store)
        }
        StorageBackend::Local => {
            let store = LocalBlobStore::new(&config.local_store_root);
            info!("Blob store initialized: {}", store.describe());
            Arc::new(store)
        }
    }
}
