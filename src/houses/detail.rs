use axum::{debug_handler, extract::State};
use sqlx::SqlitePool;

use crate::{appresult::AppResult, extract::{Json, Path}, models::House, AppState};

use super::fetch_house;

#[debug_handler(state = AppState)]
pub(crate) async fn house_detail(
    State(db_pool): State<SqlitePool>,
    Path(house_id): Path<i64>,
) -> AppResult<Json<House>> {
    Ok(Json(fetch_house(&db_pool, house_id).await?))
}
