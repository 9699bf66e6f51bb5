use std::collections::BTreeMap;

use axum::{
    debug_handler,
    extract::State,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{appresult::AppResult, extract::{Json, Query}, models::Area, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_areas))
        .route("/admins", get(area_admins))
}

pub async fn all_areas(db_pool: &SqlitePool) -> AppResult<Vec<Area>> {
    Ok(sqlx::query_as("SELECT * FROM areas ORDER BY name")
        .fetch_all(db_pool)
        .await?)
}

#[debug_handler(state = AppState)]
async fn list_areas(State(db_pool): State<SqlitePool>) -> AppResult<Json<Vec<Area>>> {
    Ok(Json(all_areas(&db_pool).await?))
}

#[derive(Debug, Deserialize)]
pub struct AreaQuery {
    #[serde(default)]
    pub area: String,
}

/// Who to call about houses in an area.
#[derive(Debug, PartialEq, Serialize)]
pub struct AdminContact {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub areas: Vec<String>,
}

/// Admins serving any area whose name contains `area_name`, each listed with
/// every area they serve.
pub async fn admin_contacts(db_pool: &SqlitePool, area_name: &str) -> AppResult<Vec<AdminContact>> {
    let rows: Vec<(i64, String, String, String)> = sqlx::query_as(
        "SELECT a.id, a.name, a.phone, ar.name
         FROM admins a
         JOIN admin_areas aa ON aa.admin_id = a.id
         JOIN areas ar ON ar.code = aa.area_code
         WHERE a.id IN (
             SELECT aa2.admin_id FROM admin_areas aa2
             JOIN areas ar2 ON ar2.code = aa2.area_code
             WHERE instr(lower(ar2.name), lower(?)) > 0
         )
         ORDER BY a.id, ar.name",
    )
    .bind(area_name.trim())
    .fetch_all(db_pool)
    .await?;

    let mut contacts: BTreeMap<i64, AdminContact> = BTreeMap::new();
    for (id, name, phone, area) in rows {
        contacts
            .entry(id)
            .or_insert_with(|| AdminContact { id, name, phone, areas: Vec::new() })
            .areas
            .push(area);
    }
    Ok(contacts.into_values().collect())
}

#[debug_handler(state = AppState)]
async fn area_admins(
    State(db_pool): State<SqlitePool>,
    Query(AreaQuery { area }): Query<AreaQuery>,
) -> AppResult<Json<Vec<AdminContact>>> {
    Ok(Json(admin_contacts(&db_pool, &area).await?))
}
