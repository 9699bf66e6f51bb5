mod detail;
mod draft;
mod featured;
mod list;
mod post;

use axum::{routing::get, Router};
use sqlx::SqlitePool;

use crate::{
    appresult::{AppError, AppResult},
    models::House,
    AppState,
};

pub use draft::{HouseDraft, HouseUpdate};
pub(crate) use draft::area_exists;
pub use featured::{featured, FeaturedHouse};
pub use post::create_listing;
pub use list::{query_houses, HouseFilter, HousePage};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list::list_houses).post(post::post_house))
        .route("/featured", get(featured::featured_houses))
        .route("/{id}", get(detail::house_detail))
}

/// Fixed number of houses per listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize(pub i64);

impl Default for PageSize {
    fn default() -> Self {
        PageSize(10)
    }
}

pub async fn fetch_house(db_pool: &SqlitePool, house_id: i64) -> AppResult<House> {
    sqlx::query_as("SELECT * FROM houses WHERE id=?")
        .bind(house_id)
        .fetch_optional(db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("House not found"))
}

/// The admin serving `area_code` with the fewest assigned houses, lowest id
/// first on ties. `None` when nobody serves the area.
pub async fn pick_admin_for_area(db_pool: &SqlitePool, area_code: i64) -> AppResult<Option<i64>> {
    let picked: Option<(i64,)> = sqlx::query_as(
        "SELECT aa.admin_id FROM admin_areas aa
         LEFT JOIN houses h ON h.assigned_admin_id = aa.admin_id
         WHERE aa.area_code = ?
         GROUP BY aa.admin_id
         ORDER BY COUNT(h.id) ASC, aa.admin_id ASC
         LIMIT 1",
    )
    .bind(area_code)
    .fetch_optional(db_pool)
    .await?;
    Ok(picked.map(|(id,)| id))
}
