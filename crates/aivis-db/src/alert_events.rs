//! Database operations for the `alert_events` log.

use aivis_core::AlertKind;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::decimal::to_decimal;
use crate::DbError;

/// A row from the `alert_events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AlertEventRow {
    pub id: i64,
    pub owner_id: Uuid,
    pub prompt_id: i64,
    pub kind: String,
    pub dedupe_key: String,
    pub competitor: Option<String>,
    pub previous_score: Option<Decimal>,
    pub current_score: Option<Decimal>,
    pub message: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAlertEvent<'a> {
    pub owner_id: Uuid,
    pub prompt_id: i64,
    pub kind: AlertKind,
    pub dedupe_key: &'a str,
    pub competitor: Option<&'a str>,
    pub previous_score: f64,
    pub current_score: f64,
    pub message: &'a str,
    pub payload: Value,
}

/// Log an emitted alert.
///
/// Returns `None` if an event with the same dedupe key was already logged,
/// in which case the caller should not send it again.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn record_alert_event(
    pool: &PgPool,
    event: &NewAlertEvent<'_>,
) -> Result<Option<i64>, DbError> {
    let id: Option<i64> = sqlx::query_scalar(
        "INSERT INTO alert_events \
             (owner_id, prompt_id, kind, dedupe_key, competitor, previous_score, \
              current_score, message, payload) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (dedupe_key) DO NOTHING \
         RETURNING id",
    )
    .bind(event.owner_id)
    .bind(event.prompt_id)
    .bind(event.kind.as_str())
    .bind(event.dedupe_key)
    .bind(event.competitor)
    .bind(to_decimal(event.previous_score, 2))
    .bind(to_decimal(event.current_score, 2))
    .bind(event.message)
    .bind(&event.payload)
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

/// Most recent alerts for an owner, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_alert_events(
    pool: &PgPool,
    owner_id: Uuid,
    limit: i64,
) -> Result<Vec<AlertEventRow>, DbError> {
    let rows = sqlx::query_as::<_, AlertEventRow>(
        "SELECT id, owner_id, prompt_id, kind, dedupe_key, competitor, previous_score, \
                current_score, message, payload, created_at \
         FROM alert_events \
         WHERE owner_id = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(owner_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
