use aivis_core::{EngineCorrelation, TrustTrend, TrustWindow};
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct TrendQuery {
    pub engine: Option<String>,
    /// One of `7d`, `30d`, `90d`.
    pub window: Option<String>,
}

pub(super) async fn list_trends(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<ApiResponse<Vec<TrustTrend>>>, ApiError> {
    let window = query
        .window
        .as_deref()
        .map(str::parse::<TrustWindow>)
        .transpose()
        .map_err(|e| ApiError::new(req_id.0.clone(), "validation_error", e.to_string()))?;
    let engine = query.engine.as_deref().map(str::trim).filter(|e| !e.is_empty());

    let data = aivis_db::list_trust_trends(&state.pool, engine, window)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_correlations(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<EngineCorrelation>>>, ApiError> {
    let data = aivis_db::list_engine_correlations(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::super::test_support::offline_state;
    use super::super::{build_app, default_rate_limit_state};
    use crate::middleware::AuthState;

    #[tokio::test]
    async fn unknown_window_is_rejected() {
        let app = build_app(offline_state(), AuthState::disabled(), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/trust/trends?window=14d")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json parse");
        assert_eq!(json["error"]["code"], "validation_error");
        assert!(json["error"]["message"]
            .as_str()
            .is_some_and(|m| m.contains("14d")));
    }

    #[tokio::test]
    async fn database_failure_is_internal_error() {
        let app = build_app(offline_state(), AuthState::disabled(), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/trust/correlations")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
