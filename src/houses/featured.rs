use axum::{debug_handler, extract::State};
use serde::Serialize;
use sqlx::{types::Json as SqlJson, FromRow, SqlitePool};
use time::OffsetDateTime;

use crate::{
    appresult::{AppError, AppResult},
    extract::Json,
    models::utc_now,
    AppState,
};

const FEATURED_LIMIT: i64 = 5;

/// Card shown in the featured strip: the house's first photo and VIP expiry.
#[derive(Debug, Serialize)]
pub struct FeaturedHouse {
    pub id: i64,
    pub price: f64,
    pub description: String,
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

#[derive(FromRow)]
struct FeaturedRow {
    id: i64,
    price: f64,
    description: String,
    image_urls: SqlJson<Vec<String>>,
    expires_at: OffsetDateTime,
}

pub async fn featured(db_pool: &SqlitePool) -> AppResult<Vec<FeaturedHouse>> {
    let rows: Vec<FeaturedRow> = sqlx::query_as(
        "SELECT h.id, h.price, h.description, h.image_urls, v.expires_at
         FROM vip_statuses v JOIN houses h ON h.id = v.house_id
         WHERE v.expires_at > ?
         ORDER BY v.created_at DESC, v.id DESC
         LIMIT ?",
    )
    .bind(utc_now())
    .bind(FEATURED_LIMIT)
    .fetch_all(db_pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| FeaturedHouse {
            id: row.id,
            price: row.price,
            description: row.description,
            image_url: row.image_urls.0.into_iter().next(),
            expires_at: row.expires_at,
        })
        .collect())
}

#[debug_handler(state = AppState)]
pub(crate) async fn featured_houses(
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Vec<FeaturedHouse>>> {
    let houses = featured(&db_pool).await?;
    if houses.is_empty() {
        return Err(AppError::not_found("No featured houses"));
    }
    Ok(Json(houses))
}
