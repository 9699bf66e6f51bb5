use axum::{debug_handler, extract::State};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use crate::{
    appresult::{AppError, AppResult},
    auth::{authorize, CurrentAdmin},
    extract::{Json, Path},
    houses::fetch_house,
    models::{utc_now, Admin, House, Invitation, VisitStatus},
    AppState,
};

/// A visit request together with who asked and where.
#[derive(Debug, Serialize, FromRow)]
pub struct AssignedVisit {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub invitation: Invitation,
    pub house_location: String,
    pub user_name: String,
    pub user_phone: String,
}

#[debug_handler(state = AppState)]
pub(super) async fn assigned_visits(
    State(db_pool): State<SqlitePool>,
    CurrentAdmin(admin): CurrentAdmin,
) -> AppResult<Json<Vec<AssignedVisit>>> {
    let visits = sqlx::query_as(
        "SELECT i.*, h.location AS house_location, u.name AS user_name, u.phone AS user_phone
         FROM invitations i
         JOIN houses h ON h.id = i.house_id
         JOIN users u ON u.id = i.user_id
         WHERE h.assigned_admin_id=?
         ORDER BY i.requested_at DESC, i.id DESC",
    )
    .bind(admin.id)
    .fetch_all(&db_pool)
    .await?;
    Ok(Json(visits))
}

/// Loads a visit request and its house, checking that `admin` is assigned to the house.
pub(super) async fn load_assigned_visit(
    db_pool: &SqlitePool,
    admin: &Admin,
    invitation_id: i64,
) -> AppResult<(Invitation, House)> {
    let invitation: Invitation = sqlx::query_as("SELECT * FROM invitations WHERE id=?")
        .bind(invitation_id)
        .fetch_optional(db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("Visit request not found"))?;
    let house = fetch_house(db_pool, invitation.house_id).await?;
    authorize(admin, &house)?;
    Ok((invitation, house))
}

pub async fn mark_seen(db_pool: &SqlitePool, admin: &Admin, invitation_id: i64) -> AppResult<Invitation> {
    let (invitation, _) = load_assigned_visit(db_pool, admin, invitation_id).await?;

    let invitation = sqlx::query_as(
        "UPDATE invitations SET status=?, visited_at=COALESCE(visited_at, ?) WHERE id=? RETURNING *",
    )
    .bind(VisitStatus::Seen)
    .bind(utc_now())
    .bind(invitation.id)
    .fetch_one(db_pool)
    .await?;
    Ok(invitation)
}

#[debug_handler(state = AppState)]
pub(super) async fn mark_seen_handler(
    State(db_pool): State<SqlitePool>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(invitation_id): Path<i64>,
) -> AppResult<Json<Invitation>> {
    let invitation = mark_seen(&db_pool, &admin, invitation_id).await?;
    tracing::info!(invitation_id, admin_id = admin.id, "visit marked seen");
    Ok(Json(invitation))
}
