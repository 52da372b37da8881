//! Database operations for the `brands` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A competitor tracked alongside a brand, stored in `brands.competitors`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorEntry {
    pub name: String,
    #[serde(default)]
    pub domain: Option<String>,
}

/// A row from the `brands` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BrandRow {
    pub id: i64,
    pub public_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub domain: Option<String>,
    pub competitors: Json<Vec<CompetitorEntry>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Insert a brand and return the stored row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_brand(
    pool: &PgPool,
    owner_id: Uuid,
    name: &str,
    domain: Option<&str>,
    competitors: &[CompetitorEntry],
) -> Result<BrandRow, DbError> {
    let row = sqlx::query_as::<_, BrandRow>(
        "INSERT INTO brands (public_id, owner_id, name, domain, competitors) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id, public_id, owner_id, name, domain, competitors, created_at, updated_at",
    )
    .bind(Uuid::new_v4())
    .bind(owner_id)
    .bind(name)
    .bind(domain)
    .bind(Json(competitors))
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Returns a brand by id, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_brand(pool: &PgPool, id: i64) -> Result<Option<BrandRow>, DbError> {
    let row = sqlx::query_as::<_, BrandRow>(
        "SELECT id, public_id, owner_id, name, domain, competitors, created_at, updated_at \
         FROM brands \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
