//! Database operations for `notification_settings`.

use aivis_core::NotificationSettings;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::decimal::{from_decimal, to_decimal};
use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
struct NotificationSettingsRow {
    visibility_drop_enabled: bool,
    visibility_drop_threshold: Decimal,
    competitor_overtake_enabled: bool,
    email_enabled: bool,
}

impl From<NotificationSettingsRow> for NotificationSettings {
    fn from(row: NotificationSettingsRow) -> Self {
        Self {
            visibility_drop_enabled: row.visibility_drop_enabled,
            visibility_drop_threshold: from_decimal(row.visibility_drop_threshold),
            competitor_overtake_enabled: row.competitor_overtake_enabled,
            email_enabled: row.email_enabled,
        }
    }
}

/// Settings for `owner_id`, or the defaults if the owner never saved any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_notification_settings(
    pool: &PgPool,
    owner_id: Uuid,
) -> Result<NotificationSettings, DbError> {
    let row = sqlx::query_as::<_, NotificationSettingsRow>(
        "SELECT visibility_drop_enabled, visibility_drop_threshold, \
                competitor_overtake_enabled, email_enabled \
         FROM notification_settings \
         WHERE owner_id = $1",
    )
    .bind(owner_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(NotificationSettings::from).unwrap_or_default())
}

/// Insert or overwrite the settings for `owner_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_notification_settings(
    pool: &PgPool,
    owner_id: Uuid,
    settings: &NotificationSettings,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO notification_settings \
             (owner_id, visibility_drop_enabled, visibility_drop_threshold, \
              competitor_overtake_enabled, email_enabled) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (owner_id) DO UPDATE SET \
             visibility_drop_enabled = EXCLUDED.visibility_drop_enabled, \
             visibility_drop_threshold = EXCLUDED.visibility_drop_threshold, \
             competitor_overtake_enabled = EXCLUDED.competitor_overtake_enabled, \
             email_enabled = EXCLUDED.email_enabled, \
             updated_at = NOW()",
    )
    .bind(owner_id)
    .bind(settings.visibility_drop_enabled)
    .bind(to_decimal(settings.visibility_drop_threshold, 2))
    .bind(settings.competitor_overtake_enabled)
    .bind(settings.email_enabled)
    .execute(pool)
    .await?;

    Ok(())
}
