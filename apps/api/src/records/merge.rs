use bytes::Bytes;
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::storage::{keys, BlobStore};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MergeOutcome {
    pub source_prefix: String,
    pub dest_key: String,
    pub parts: usize,
    pub records: usize,
    /// False when the prefix held no records and nothing was written.
    pub written: bool,
}

/// Concatenates every `.csv` part under `source_prefix` into `dest_key`.
///
/// The first part with data defines the column order; later parts are
/// mapped onto it by column name, missing columns are left empty and extra
/// columns are dropped.
pub async fn merge_csv_parts(
    store: &dyn BlobStore,
    source_prefix: &str,
    dest_key: &str,
) -> Result<MergeOutcome, AppError> {
    let parts: Vec<String> = store
        .list(source_prefix)
        .await?
        .into_iter()
        .map(|o| o.key)
        .filter(|k| k.ends_with(".csv"))
        .collect();

    let mut outcome = MergeOutcome {
        source_prefix: source_prefix.to_string(),
        dest_key: dest_key.to_string(),
        parts: parts.len(),
        records: 0,
        written: false,
    };

    if parts.is_empty() {
        warn!("No CSV files found under {source_prefix}");
        return Ok(outcome);
    }

    let mut header: Option<csv::StringRecord> = None;
    let mut rows: Vec<Vec<String>> = Vec::new();

    for key in &parts {
        info!("Reading {key}");
        let data = store.get(key).await?;
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.as_ref());

        let part_header = reader
            .headers()
            .map_err(|e| AppError::Artifact(format!("{key}: unreadable header: {e}")))?
            .clone();

        let mut part_rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| AppError::Artifact(format!("{key}: {e}")))?;
            part_rows.push(record);
        }
        if part_rows.is_empty() {
            continue;
        }

        let columns = header.get_or_insert_with(|| part_header.clone());
        let positions: Vec<Option<usize>> = columns
            .iter()
            .map(|name| part_header.iter().position(|h| h == name))
            .collect();

        for record in part_rows {
            rows.push(
                positions
                    .iter()
                    .map(|pos| {
                        pos.and_then(|p| record.get(p))
                            .unwrap_or_default()
                            .to_string()
                    })
                    .collect(),
            );
        }
    }

    let Some(header) = header else {
        warn!("No records found in {source_prefix}");
        return Ok(outcome);
    };

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(&header)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("CSV encode failed: {e}")))?;
    for row in &rows {
        writer
            .write_record(row)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("CSV encode failed: {e}")))?;
    }
    let merged = writer
        .into_inner()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("CSV flush failed: {e}")))?;

    store.put(dest_key, Bytes::from(merged), "text/csv").await?;
    info!(
        "Merged {} records from {} parts into {}",
        rows.len(),
        parts.len(),
        dest_key
    );

    outcome.records = rows.len();
    outcome.written = true;
    Ok(outcome)
}

/// Rebuilds both training corpora from the ingested dataset parts.
pub async fn merge_training_corpora(store: &dyn BlobStore) -> Result<Vec<MergeOutcome>, AppError> {
    let users =
        merge_csv_parts(store, keys::DATASET_USERS_PREFIX, keys::TRAINING_USERS).await?;
    let jobs = merge_csv_parts(store, keys::DATASET_JOBS_PREFIX, keys::TRAINING_JOBS).await?;
    Ok(vec![users, jobs])
}
