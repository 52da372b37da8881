use aivis_pipeline::CycleSummary;
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{
    map_db_error, map_pipeline_error, normalize_limit, ApiError, ApiResponse, AppState,
    ResponseMeta,
};

#[derive(Debug, Serialize)]
pub(super) struct JobItem {
    id: i64,
    public_id: Uuid,
    prompt_id: i64,
    model: String,
    persona: String,
    phase: String,
    brand_mentioned: Option<bool>,
    sentiment: Option<String>,
    confidence: Option<Decimal>,
    visibility_score: Option<Decimal>,
    reasoning: Option<String>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub(super) struct HistoryItem {
    model: String,
    visibility_score: Decimal,
    brand_mentioned: bool,
    rank: Option<i32>,
    recorded_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LimitQuery {
    pub limit: Option<i64>,
}

/// Runs every tracked model and persona against one prompt and waits for the
/// jobs to finish.
pub(super) async fn analyze_prompt(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(prompt_id): Path<i64>,
) -> Result<Json<ApiResponse<CycleSummary>>, ApiError> {
    let summary = state
        .services
        .analyzer(&state.pool)
        .analyze_prompt(prompt_id)
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: summary,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_jobs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(prompt_id): Path<i64>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<JobItem>>>, ApiError> {
    let rows = aivis_db::list_jobs_for_prompt(&state.pool, prompt_id, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| JobItem {
            id: row.id,
            public_id: row.public_id,
            prompt_id: row.prompt_id,
            model: row.model,
            persona: row.persona,
            phase: row.phase,
            brand_mentioned: row.brand_mentioned,
            sentiment: row.sentiment,
            confidence: row.confidence,
            visibility_score: row.visibility_score,
            reasoning: row.reasoning,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_history(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(prompt_id): Path<i64>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<HistoryItem>>>, ApiError> {
    let rows =
        aivis_db::list_visibility_history(&state.pool, prompt_id, normalize_limit(query.limit))
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| HistoryItem {
            model: row.model,
            visibility_score: row.visibility_score,
            brand_mentioned: row.brand_mentioned,
            rank: row.rank,
            recorded_at: row.recorded_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
