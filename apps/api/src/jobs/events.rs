use serde::Deserialize;

use crate::jobs::JobKind;
use crate::storage::keys;

/// The parts of an S3 event notification the dispatcher reads.
#[derive(Debug, Deserialize)]
pub struct StorageEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Deserialize)]
pub struct EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketEntity,
    pub object: ObjectEntity,
}

#[derive(Debug, Deserialize)]
pub struct BucketEntity {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ObjectEntity {
    pub key: String,
}

impl StorageEvent {
    /// `(bucket, key)` of the first record.
    pub fn first_object(&self) -> Option<(&str, &str)> {
        self.records
            .first()
            .map(|r| (r.s3.bucket.name.as_str(), r.s3.object.key.as_str()))
    }
}

/// Which submitter a write under `key` triggers, if any.
pub fn job_for_key(key: &str) -> Option<JobKind> {
    if key.starts_with(keys::TRAINING_PREFIX) {
        Some(JobKind::Processing)
    } else if key.starts_with(keys::PROCESSED_PREFIX) {
        Some(JobKind::Training)
    } else {
        None
    }
}
