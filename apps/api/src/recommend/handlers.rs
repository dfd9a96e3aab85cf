//! Axum route handlers for the recommendation API.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;

use crate::errors::AppError;
use crate::recommend::recommender::{recommend, ArtifactSet, Recommendation};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RecommendQuery {
    pub user_id: Option<String>,
}

/// Accepts both `{"user_id": ...}` and the gateway-proxy shape
/// `{"queryStringParameters": {"user_id": ...}}`.
#[derive(Debug, Default, Deserialize)]
pub struct RecommendBody {
    pub user_id: Option<String>,
    #[serde(rename = "queryStringParameters")]
    pub query_string_parameters: Option<RecommendQuery>,
}

impl RecommendBody {
    fn user_id(self) -> Option<String> {
        self.user_id
            .or_else(|| self.query_string_parameters.and_then(|q| q.user_id))
    }
}

/// GET /api/v1/recommendations?user_id=
pub async fn handle_recommend_query(
    State(state): State<AppState>,
    Query(query): Query<RecommendQuery>,
) -> Result<Json<Recommendation>, AppError> {
    serve_recommendation(&state, query.user_id).await
}

/// POST /api/v1/recommendations
pub async fn handle_recommend_body(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Recommendation>, AppError> {
    let parsed: RecommendBody = if body.iter().all(u8::is_ascii_whitespace) {
        RecommendBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::Validation(format!("request body is not valid JSON: {e}")))?
    };
    serve_recommendation(&state, parsed.user_id()).await
}

/// GET /api/v1/recommendations/:user_id
pub async fn handle_recommend_path(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Recommendation>, AppError> {
    serve_recommendation(&state, Some(user_id)).await
}

async fn serve_recommendation(
    state: &AppState,
    user_id: Option<String>,
) -> Result<Json<Recommendation>, AppError> {
    // Ids are matched exactly; only an absent or empty id counts as missing.
    let user_id = user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Validation("user_id is required".to_string()))?;

    // Each request reads its own snapshot of the published artifacts.
    let set = ArtifactSet::load(state.store.as_ref()).await?;
    let k = state.config.top_k;

    let recommendation = tokio::task::spawn_blocking(move || recommend(&set, &user_id, k))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("recommendation task failed: {e}")))??;

    Ok(Json(recommendation))
}
