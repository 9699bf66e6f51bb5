use axum::{debug_handler, extract::State, http::StatusCode};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{
    appresult::{AppError, AppResult, FieldErrors},
    areas::all_areas,
    auth::SuperAdmin,
    extract::Json,
    models::Area,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct NewArea {
    pub code: i64,
    pub name: String,
}

pub async fn create_area(db_pool: &SqlitePool, NewArea { code, name }: NewArea) -> AppResult<Area> {
    let name = name.trim();
    let mut errors = FieldErrors::new();
    errors.check(code > 0, "code", "Must be > 0");
    errors.check(!name.is_empty(), "name", "Required");
    errors.into_result()?;

    let clash: Option<(i64,)> = sqlx::query_as("SELECT code FROM areas WHERE code=? OR lower(name)=lower(?)")
        .bind(code)
        .bind(name)
        .fetch_optional(db_pool)
        .await?;
    if clash.is_some() {
        return Err(AppError::bad_request("Area code or name already exists"));
    }

    let area = sqlx::query_as("INSERT INTO areas (code,name) VALUES (?,?) RETURNING *")
        .bind(code)
        .bind(name)
        .fetch_one(db_pool)
        .await?;
    Ok(area)
}

#[debug_handler(state = AppState)]
pub(super) async fn list_areas(
    State(db_pool): State<SqlitePool>,
    SuperAdmin(_): SuperAdmin,
) -> AppResult<Json<Vec<Area>>> {
    Ok(Json(all_areas(&db_pool).await?))
}

#[debug_handler(state = AppState)]
pub(super) async fn add_area(
    State(db_pool): State<SqlitePool>,
    SuperAdmin(admin): SuperAdmin,
    Json(new_area): Json<NewArea>,
) -> AppResult<(StatusCode, Json<Area>)> {
    let area = create_area(&db_pool, new_area).await?;
    tracing::info!(code = area.code, name = %area.name, admin_id = admin.id, "area created");
    Ok((StatusCode::CREATED, Json(area)))
}
