//! The versioned `model.tar.gz` artifact set and its `latest` pointer.
//!
//! A run writes its archive under `models/runs/<run_id>/` first and only then
//! moves `models/latest/pointer.json`, so a reader never sees a pointer to a
//! half-written archive. Archives produced elsewhere (no pointer) are still
//! found by recency.

use std::collections::HashMap;
use std::io::Read;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::storage::{keys, BlobStore, ObjectMeta, StorageError};
use crate::training::classifier::{Classifier, ClassifierKind};
use crate::training::vocabulary::LabelVocabulary;

pub const CLASSIFIER_ENTRY: &str = "models/classifier.json";
pub const VOCABULARY_ENTRY: &str = "models/label_vocabulary.json";
pub const METADATA_ENTRY: &str = "models/metadata.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub run_id: String,
    pub trained_at: DateTime<Utc>,
    pub classifier: ClassifierKind,
    /// Held-out accuracy; informational only.
    pub accuracy: f64,
    pub train_rows: usize,
    pub test_rows: usize,
    pub embedding_dim: usize,
    pub classes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub classifier: Classifier,
    pub vocabulary: LabelVocabulary,
    pub metadata: ModelMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestPointer {
    pub run_id: String,
    pub archive_key: String,
    pub published_at: DateTime<Utc>,
}

/// `<UTC yyyymmddTHHMMSS>-<8 hex>`
pub fn new_run_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", now.format("%Y%m%dT%H%M%S"), &suffix[..8])
}

impl ModelArtifacts {
    pub fn to_archive(&self) -> Result<Vec<u8>, AppError> {
        let entries = [
            (CLASSIFIER_ENTRY, to_json(&self.classifier)?),
            (VOCABULARY_ENTRY, to_json(&self.vocabulary)?),
            (METADATA_ENTRY, to_json(&self.metadata)?),
        ];

        let mtime = self.metadata.trained_at.timestamp().max(0) as u64;
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (name, body) in &entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(mtime);
            header.set_cksum();
            builder
                .append_data(&mut header, name, body.as_slice())
                .map_err(|e| AppError::Artifact(format!("failed to add {name} to archive: {e}")))?;
        }

        builder
            .into_inner()
            .and_then(|encoder| encoder.finish())
            .map_err(|e| AppError::Artifact(format!("failed to finish model archive: {e}")))
    }

    /// Unpacks an archive. `source` names the object in errors.
    pub fn from_archive(data: &[u8], source: &str) -> Result<Self, AppError> {
        let entries = read_entries(data)
            .map_err(|e| AppError::Artifact(format!("{source}: unreadable archive: {e}")))?;

        let classifier: Classifier = entry_json(&entries, CLASSIFIER_ENTRY, source)?;
        let vocabulary: LabelVocabulary = entry_json(&entries, VOCABULARY_ENTRY, source)?;
        let metadata: ModelMetadata = entry_json(&entries, METADATA_ENTRY, source)?;

        classifier
            .check_shape()
            .map_err(|e| AppError::Artifact(format!("{source}: malformed {CLASSIFIER_ENTRY}: {e}")))?;
        if vocabulary.is_empty() {
            return Err(AppError::Artifact(format!("{source}: label vocabulary is empty")));
        }
        if classifier.n_classes() != vocabulary.len() {
            return Err(AppError::Artifact(format!(
                "{source}: classifier has {} classes but the vocabulary has {}",
                classifier.n_classes(),
                vocabulary.len()
            )));
        }

        Ok(Self {
            classifier,
            vocabulary,
            metadata,
        })
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>, AppError> {
    serde_json::to_vec_pretty(value)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JSON encode failed: {e}")))
}

fn read_entries(data: &[u8]) -> std::io::Result<HashMap<String, Vec<u8>>> {
    let mut archive = tar::Archive::new(GzDecoder::new(data));
    let mut entries = HashMap::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry.path()?.to_string_lossy().into_owned();
        let mut body = Vec::new();
        entry.read_to_end(&mut body)?;
        entries.insert(path.trim_start_matches("./").to_string(), body);
    }
    Ok(entries)
}

fn entry_json<T: DeserializeOwned>(
    entries: &HashMap<String, Vec<u8>>,
    name: &str,
    source: &str,
) -> Result<T, AppError> {
    let body = entries
        .get(name)
        .ok_or_else(|| AppError::Artifact(format!("{source}: archive has no {name}")))?;
    serde_json::from_slice(body)
        .map_err(|e| AppError::Artifact(format!("{source}: malformed {name}: {e}")))
}

/// Writes the run-scoped archive, then moves the `latest` pointer to it.
pub async fn publish(
    store: &dyn BlobStore,
    artifacts: &ModelArtifacts,
) -> Result<LatestPointer, AppError> {
    let run_id = artifacts.metadata.run_id.clone();
    let archive_key = keys::run_archive(&run_id);
    store
        .put(
            &archive_key,
            Bytes::from(artifacts.to_archive()?),
            "application/gzip",
        )
        .await?;

    let pointer = LatestPointer {
        run_id,
        archive_key,
        published_at: Utc::now(),
    };
    store
        .put(
            keys::LATEST_POINTER,
            Bytes::from(to_json(&pointer)?),
            "application/json",
        )
        .await?;

    info!(run_id = %pointer.run_id, key = %pointer.archive_key, "Published model artifacts");
    Ok(pointer)
}

/// Newest `*model.tar.gz` by last-modified; objects without a timestamp sort oldest.
pub fn newest_archive(objects: &[ObjectMeta]) -> Option<&ObjectMeta> {
    objects
        .iter()
        .filter(|o| o.key.ends_with(keys::ARCHIVE_SUFFIX))
        .max_by(|a, b| {
            a.last_modified
                .cmp(&b.last_modified)
                .then_with(|| a.key.cmp(&b.key))
        })
}

/// Key of the archive readers should load.
pub async fn resolve_latest_archive(store: &dyn BlobStore) -> Result<String, AppError> {
    match store.get(keys::LATEST_POINTER).await {
        Ok(body) => {
            let pointer: LatestPointer = serde_json::from_slice(&body).map_err(|e| {
                AppError::Artifact(format!("{}: malformed pointer: {e}", keys::LATEST_POINTER))
            })?;
            Ok(pointer.archive_key)
        }
        Err(StorageError::NotFound(_)) => {
            warn!("No latest pointer, falling back to the newest archive under models/");
            let objects = store.list(keys::MODELS_PREFIX).await?;
            newest_archive(&objects)
                .map(|o| o.key.clone())
                .ok_or_else(|| {
                    AppError::Artifact(format!(
                        "No {} found under {}",
                        keys::ARCHIVE_SUFFIX,
                        keys::MODELS_PREFIX
                    ))
                })
        }
        Err(e) => Err(e.into()),
    }
}

/// Loads the current artifact set and returns it with the archive key it came from.
pub async fn load_latest(store: &dyn BlobStore) -> Result<(ModelArtifacts, String), AppError> {
    let key = resolve_latest_archive(store).await?;
    let data = store.get(&key).await?;
    let artifacts = ModelArtifacts::from_archive(&data, &key)?;
    Ok((artifacts, key))
}
