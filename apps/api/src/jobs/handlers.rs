use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::info;

use crate::errors::AppError;
use crate::jobs::events::{job_for_key, StorageEvent};
use crate::jobs::{submit_processing, submit_training, JobKind};
use crate::state::AppState;

/// POST /api/v1/events/storage
///
/// Dispatches an S3 event notification by the first record's key prefix.
pub async fn handle_storage_event(
    State(state): State<AppState>,
    Json(event): Json<StorageEvent>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let (bucket, key) = event
        .first_object()
        .ok_or_else(|| AppError::Validation("event has no records".to_string()))?;
    info!(bucket, key, "Storage event received");

    let Some(kind) = job_for_key(key) else {
        return Ok((
            StatusCode::ACCEPTED,
            Json(json!({ "status": "ignored", "key": key })),
        ));
    };

    let job = match kind {
        JobKind::Processing => submit_processing(state.compute.as_ref(), &state.config).await?,
        JobKind::Training => submit_training(state.compute.as_ref(), &state.config).await?,
    };

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "submitted",
            "job_kind": job.kind,
            "job_name": job.job_name,
            "job_arn": job.job_arn,
        })),
    ))
}
