use aivis_trust::{DomainHeat, Verification};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_pipeline_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct HeatmapQuery {
    pub engine: Option<String>,
    pub top: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(super) struct VerifyRequest {
    pub url: String,
    pub claim: String,
    /// Page text supplied by the caller; skips the fetch when present.
    pub content: Option<String>,
}

pub(super) async fn heatmap(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<HeatmapQuery>,
) -> Result<Json<ApiResponse<Vec<DomainHeat>>>, ApiError> {
    let engine = query.engine.as_deref().map(str::trim).filter(|e| !e.is_empty());
    let data = aivis_pipeline::load_heatmap(&state.pool, engine, query.top)
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// Ad-hoc check of one claim against one page. Nothing is persisted.
pub(super) async fn verify(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<VerifyRequest>,
) -> Result<Json<ApiResponse<Verification>>, ApiError> {
    if body.url.trim().is_empty() {
        return Err(ApiError::new(req_id.0, "validation_error", "url must not be blank"));
    }
    if body.claim.trim().is_empty() {
        return Err(ApiError::new(req_id.0, "validation_error", "claim must not be blank"));
    }

    let data = state
        .services
        .verifier
        .verify(body.url.trim(), &body.claim, body.content.as_deref())
        .await;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// Re-check one ledger row against its stored claim and persist the verdict.
pub(super) async fn reverify(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Verification>>, ApiError> {
    let data = state
        .services
        .reverify_citation(&state.pool, id)
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
