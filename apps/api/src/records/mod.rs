// Raw-text records: typed CSV rows, text preparation, ingestion and the
// part-file merger that builds the training corpora.

pub mod handlers;
pub mod merge;
pub mod prepare;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::errors::AppError;
use crate::storage::{keys, BlobStore, StorageError};

/// One row of `user_profiles_cleaned.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    #[serde(default)]
    pub user_text_clean: String,
}

/// One row of `job_listings_cleaned.csv`. Rows are identified by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub jobroles: String,
    #[serde(default)]
    pub company: String,
    pub category: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub jobdescription: String,
    #[serde(default)]
    pub job_text_clean: String,
}

/// Parses a headed CSV document into typed rows. `source` names the object in errors.
pub fn read_csv<T: DeserializeOwned>(data: &[u8], source: &str) -> Result<Vec<T>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(data);

    reader
        .deserialize()
        .enumerate()
        .map(|(row, result)| {
            result.map_err(|e| AppError::Artifact(format!("{source}: row {}: {e}", row + 1)))
        })
        .collect()
}

/// Serializes typed rows to CSV with a header line.
pub fn write_csv<T: Serialize>(rows: &[T]) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("CSV encode failed: {e}")))?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("CSV flush failed: {e}")))
}

/// Loads `training/user_profiles_cleaned.csv`.
pub async fn load_users(store: &dyn BlobStore) -> Result<Vec<UserRecord>, AppError> {
    let data = store.get(keys::TRAINING_USERS).await?;
    read_csv(&data, keys::TRAINING_USERS)
}

/// Loads `training/job_listings_cleaned.csv`.
pub async fn load_jobs(store: &dyn BlobStore) -> Result<Vec<JobRecord>, AppError> {
    let data = store.get(keys::TRAINING_JOBS).await?;
    read_csv(&data, keys::TRAINING_JOBS)
}

/// Every ingested job posting, read from the `dataset/jobpost/` parts.
/// Falls back to the merged training corpus when no parts exist, and to an
/// empty list when neither does.
pub async fn list_job_postings(store: &dyn BlobStore) -> Result<Vec<JobRecord>, AppError> {
    let parts: Vec<String> = store
        .list(keys::DATASET_JOBS_PREFIX)
        .await?
        .into_iter()
        .map(|o| o.key)
        .filter(|k| k.ends_with(".csv"))
        .collect();

    if parts.is_empty() {
        return match store.get(keys::TRAINING_JOBS).await {
            Ok(data) => read_csv(&data, keys::TRAINING_JOBS),
            Err(StorageError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        };
    }

    let mut jobs = Vec::new();
    for key in &parts {
        let data = store.get(key).await?;
        jobs.extend(read_csv::<JobRecord>(&data, key)?);
    }
    Ok(jobs)
}

/// Reads the stored profile part for `id`.
pub async fn load_profile(store: &dyn BlobStore, id: &str) -> Result<UserRecord, AppError> {
    let key = format!("{}{id}.csv", keys::DATASET_USERS_PREFIX);
    let data = match store.get(&key).await {
        Ok(data) => data,
        Err(StorageError::NotFound(_)) => {
            return Err(AppError::NotFound(format!("Profile {id} not found")))
        }
        Err(e) => return Err(e.into()),
    };
    read_csv::<UserRecord>(&data, &key)?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Artifact(format!("{key}: no profile row")))
}
