mod admins;
mod areas;

use axum::{
    debug_handler,
    extract::State,
    routing::{delete, get, post},
    Router,
};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::{appresult::AppResult, auth::SuperAdmin, extract::Json, models::HouseStatus, AppState};

pub use admins::{admins_with_areas, create_admin, remove_admin, unassign, AdminWithAreas, NewAdmin};
pub use areas::{create_area, NewArea};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/areas", get(areas::list_areas).post(areas::add_area))
        .route("/admins", get(admins::list_admins).post(admins::add_admin))
        .route("/admins/{id}", delete(admins::delete_admin))
        .route("/admins/{id}/areas", post(admins::assign_area))
        .route("/admins/{id}/areas/{code}", delete(admins::unassign_area))
}

#[derive(Debug, Default, Serialize)]
pub struct HouseCounts {
    pub pending: i64,
    pub available: i64,
    pub rented: i64,
    pub sold: i64,
}

#[derive(Debug, Serialize)]
pub struct PlatformDashboard {
    pub users: i64,
    pub admins: i64,
    pub houses: HouseCounts,
    pub visit_requests: i64,
    pub total_commission: f64,
}

pub async fn platform_dashboard(db_pool: &SqlitePool) -> AppResult<PlatformDashboard> {
    let (users, admins, visit_requests, total_commission): (i64, i64, i64, f64) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM users),
                (SELECT COUNT(*) FROM admins),
                (SELECT COUNT(*) FROM invitations),
                (SELECT COALESCE(SUM(commission), 0.0) FROM success_reports)",
    )
    .fetch_one(db_pool)
    .await?;

    let per_status: Vec<(HouseStatus, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM houses GROUP BY status")
            .fetch_all(db_pool)
            .await?;
    let mut houses = HouseCounts::default();
    for (status, count) in per_status {
        match status {
            HouseStatus::Pending => houses.pending = count,
            HouseStatus::Available => houses.available = count,
            HouseStatus::Rented => houses.rented = count,
            HouseStatus::Sold => houses.sold = count,
        }
    }

    Ok(PlatformDashboard { users, admins, houses, visit_requests, total_commission })
}

#[debug_handler(state = AppState)]
async fn dashboard(
    State(db_pool): State<SqlitePool>,
    SuperAdmin(_): SuperAdmin,
) -> AppResult<Json<PlatformDashboard>> {
    Ok(Json(platform_dashboard(&db_pool).await?))
}
