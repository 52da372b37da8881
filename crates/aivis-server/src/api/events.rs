use aivis_db::ChangeEvent;
use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{stream, Stream};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;

#[derive(Debug, Deserialize)]
pub(super) struct EventsQuery {
    /// Restrict to one owner's rows plus shared rows; omit for everything.
    pub owner: Option<Uuid>,
}

fn to_sse(event: &ChangeEvent) -> Result<Event, axum::Error> {
    Event::default()
        .event(event.kind.as_str())
        .id(event.sequence.to_string())
        .json_data(event)
}

/// Server-sent change feed. Each event carries its sequence number as the
/// SSE id so clients can drop stale or repeated deliveries.
pub(super) async fn stream_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let subscription = state.services.feed.subscribe(query.owner);
    tracing::debug!(owner = ?query.owner, "change feed subscriber connected");

    let events = stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.recv().await?;
        Some((to_sse(&event), subscription))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use aivis_db::{ChangeOp, EntityKind};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use futures::StreamExt;
    use tower::ServiceExt;

    use super::super::test_support::offline_state;
    use super::super::{build_app, default_rate_limit_state};
    use crate::middleware::AuthState;

    #[tokio::test]
    async fn published_change_is_streamed() {
        let state = offline_state();
        let services = Arc::clone(&state.services);
        let app = build_app(state, AuthState::disabled(), default_rate_limit_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/events")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        services.feed.publish(
            None,
            EntityKind::TrustTrend,
            "gpt-4o/7d",
            ChangeOp::Upsert,
            serde_json::json!({ "direction": "up" }),
        );

        let mut body = response.into_body().into_data_stream();
        let chunk = body.next().await.expect("frame").expect("bytes");
        let text = String::from_utf8(chunk.to_vec()).expect("utf8");
        assert!(text.contains("event: trust_trend"), "{text}");
        assert!(text.contains("id: 1"), "{text}");
        assert!(text.contains("gpt-4o/7d"), "{text}");
    }
}
