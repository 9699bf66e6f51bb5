//! Endpoints for admins: the houses assigned to them, the visit requests on
//! those houses, transaction reports and VIP placement.

mod houses;
mod reports;
mod visits;

use axum::{
    debug_handler,
    extract::State,
    routing::{get, patch, post, put},
    Router,
};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;

use crate::{appresult::AppResult, auth::CurrentAdmin, extract::Json, AppState};

pub use reports::{file_failure_report, file_success_report, SuccessReportInput};
pub use visits::mark_seen;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/houses", get(houses::assigned_houses).post(houses::post_house))
        .route(
            "/houses/{id}",
            patch(houses::update_house).delete(houses::delete_house),
        )
        .route("/houses/{id}/vip", put(houses::set_vip))
        .route("/visits", get(visits::assigned_visits))
        .route("/visits/{id}/seen", post(visits::mark_seen_handler))
        .route("/reports/success", post(reports::success_report))
        .route("/reports/failure", post(reports::failure_report))
}

#[derive(Debug, Serialize, FromRow)]
pub struct RecentTransaction {
    pub report_id: i64,
    pub house_id: i64,
    pub location: String,
    pub price: f64,
    pub commission: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct AdminDashboard {
    pub total_houses: i64,
    pub pending_visits: i64,
    pub pending_reports: i64,
    pub total_revenue: f64,
    pub total_commission: f64,
    /// Successful share of filed reports, in percent.
    pub success_rate: f64,
    pub recent_transactions: Vec<RecentTransaction>,
}

pub async fn admin_dashboard(db_pool: &SqlitePool, admin_id: i64) -> AppResult<AdminDashboard> {
    let (total_houses,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM houses WHERE assigned_admin_id=?")
            .bind(admin_id)
            .fetch_one(db_pool)
            .await?;

    let (pending_visits,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM invitations i JOIN houses h ON h.id = i.house_id
         WHERE h.assigned_admin_id=? AND i.status='not_seen'",
    )
    .bind(admin_id)
    .fetch_one(db_pool)
    .await?;

    let (pending_reports,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM invitations i JOIN houses h ON h.id = i.house_id
         WHERE h.assigned_admin_id=? AND i.status='seen'
           AND NOT EXISTS (SELECT 1 FROM success_reports s WHERE s.invitation_id = i.id)
           AND NOT EXISTS (SELECT 1 FROM failure_reports f WHERE f.invitation_id = i.id)",
    )
    .bind(admin_id)
    .fetch_one(db_pool)
    .await?;

    let (successes, total_revenue, total_commission): (i64, f64, f64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(price), 0.0), COALESCE(SUM(commission), 0.0)
         FROM success_reports WHERE admin_id=?",
    )
    .bind(admin_id)
    .fetch_one(db_pool)
    .await?;

    let (failures,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM failure_reports WHERE admin_id=?")
        .bind(admin_id)
        .fetch_one(db_pool)
        .await?;

    let recent_transactions = sqlx::query_as(
        "SELECT s.id AS report_id, h.id AS house_id, h.location, s.price, s.commission, s.created_at
         FROM success_reports s
         JOIN invitations i ON i.id = s.invitation_id
         JOIN houses h ON h.id = i.house_id
         WHERE s.admin_id=?
         ORDER BY s.created_at DESC, s.id DESC
         LIMIT 5",
    )
    .bind(admin_id)
    .fetch_all(db_pool)
    .await?;

    let filed = successes + failures;
    let success_rate = if filed == 0 {
        0.0
    } else {
        (successes as f64 / filed as f64 * 1000.0).round() / 10.0
    };

    Ok(AdminDashboard {
        total_houses,
        pending_visits,
        pending_reports,
        total_revenue,
        total_commission,
        success_rate,
        recent_transactions,
    })
}

#[debug_handler(state = AppState)]
async fn dashboard(
    State(db_pool): State<SqlitePool>,
    CurrentAdmin(admin): CurrentAdmin,
) -> AppResult<Json<AdminDashboard>> {
    Ok(Json(admin_dashboard(&db_pool, admin.id).await?))
}
