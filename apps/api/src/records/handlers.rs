//! Axum route handlers for record ingestion.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::records::prepare::{extract_pdf_text, job_text, profile_text, ProfileFields};
use crate::records::{list_job_postings, load_profile, write_csv, JobRecord, UserRecord};
use crate::state::AppState;
use crate::storage::keys;

#[derive(Debug, Deserialize)]
pub struct JobPostingRequest {
    pub jobroles: String,
    #[serde(default)]
    pub company: String,
    pub category: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub jobdescription: String,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse<T> {
    pub record: T,
    pub s3_key: String,
}

/// Largest accepted profile upload, CV included.
pub const MAX_PROFILE_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// GET /api/v1/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
) -> Result<Json<Vec<JobRecord>>, AppError> {
    let jobs = list_job_postings(state.store.as_ref()).await?;
    Ok(Json(jobs))
}

/// POST /api/v1/jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    Json(req): Json<JobPostingRequest>,
) -> Result<(StatusCode, Json<IngestResponse<JobRecord>>), AppError> {
    if req.category.trim().is_empty() {
        return Err(AppError::Validation("category is required".to_string()));
    }

    let mut job = JobRecord {
        id: Uuid::new_v4().to_string(),
        jobroles: req.jobroles,
        company: req.company,
        category: req.category.trim().to_string(),
        location: req.location,
        jobdescription: req.jobdescription,
        job_text_clean: String::new(),
    };
    job.job_text_clean = job_text(&job);

    let key = format!("{}{}.csv", keys::DATASET_JOBS_PREFIX, job.id);
    let csv = write_csv(std::slice::from_ref(&job))?;
    state.store.put(&key, Bytes::from(csv), "text/csv").await?;
    info!("Stored job posting {} at {}", job.id, key);

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            record: job,
            s3_key: key,
        }),
    ))
}

/// GET /api/v1/profiles/:id
pub async fn handle_get_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserRecord>, AppError> {
    let id = valid_user_id(id)?;
    let profile = load_profile(state.store.as_ref(), &id).await?;
    Ok(Json(profile))
}

fn valid_user_id(id: String) -> Result<String, AppError> {
    let id = id.trim().to_string();
    if id.is_empty() || id.contains('/') {
        return Err(AppError::Validation(format!("invalid user id '{id}'")));
    }
    Ok(id)
}

/// POST /api/v1/profiles/:id
///
/// Multipart form: structured profile fields plus an optional `cv_file` PDF.
pub async fn handle_upsert_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<IngestResponse<UserRecord>>), AppError> {
    let id = valid_user_id(id)?;

    let mut fields = ProfileFields::default();
    let mut cv_file: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "cv_file" || name == "cv_files" {
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("unreadable CV upload: {e}")))?;
            cv_file = Some(data);
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::Validation(format!("unreadable field '{name}': {e}")))?;
            fields.set(&name, value);
        }
    }

    // PDF parsing is CPU-bound; keep it off the async executor.
    let cv_text = match cv_file {
        Some(pdf) => tokio::task::spawn_blocking(move || extract_pdf_text(&pdf))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed in PDF extraction: {e}")))?,
        None => None,
    };

    let user_text_clean = profile_text(&fields, cv_text.as_deref());
    if user_text_clean.is_empty() {
        return Err(AppError::Validation(
            "profile has no usable text: provide profile fields or a readable CV".to_string(),
        ));
    }

    let record = UserRecord { id, user_text_clean };
    let key = format!("{}{}.csv", keys::DATASET_USERS_PREFIX, record.id);
    let csv = write_csv(std::slice::from_ref(&record))?;
    state.store.put(&key, Bytes::from(csv), "text/csv").await?;
    info!("Stored profile for user {} at {}", record.id, key);

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            record,
            s3_key: key,
        }),
    ))
}
