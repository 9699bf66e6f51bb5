use axum::{
    debug_handler,
    extract::State,
    http::StatusCode,
    routing::get,
    Router,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use time::{OffsetDateTime, UtcOffset};

use crate::{
    appresult::{AppError, AppResult},
    auth::CurrentUser,
    extract::Json,
    houses::fetch_house,
    models::{utc_now, Invitation, VisitStatus},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(my_visits).post(request_visit))
}

#[derive(Debug, Deserialize)]
pub struct VisitRequest {
    pub house_id: i64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub preferred_date: Option<OffsetDateTime>,
}

/// Records a visit request. At most one open request per user and house.
pub async fn create_visit(
    db_pool: &SqlitePool,
    user_id: i64,
    house_id: i64,
    preferred_date: Option<OffsetDateTime>,
) -> AppResult<Invitation> {
    fetch_house(db_pool, house_id).await?;

    let open: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM invitations WHERE user_id=? AND house_id=? AND status=?")
            .bind(user_id)
            .bind(house_id)
            .bind(VisitStatus::NotSeen)
            .fetch_optional(db_pool)
            .await?;
    if open.is_some() {
        return Err(AppError::bad_request("You already requested a visit to this house"));
    }

    let invitation = sqlx::query_as(
        "INSERT INTO invitations (user_id,house_id,status,preferred_date,requested_at)
         VALUES (?,?,?,?,?) RETURNING *",
    )
    .bind(user_id)
    .bind(house_id)
    .bind(VisitStatus::NotSeen)
    .bind(preferred_date.map(|d| d.to_offset(UtcOffset::UTC)))
    .bind(utc_now())
    .fetch_one(db_pool)
    .await?;
    Ok(invitation)
}

#[debug_handler(state = AppState)]
async fn request_visit(
    State(db_pool): State<SqlitePool>,
    CurrentUser(user): CurrentUser,
    Json(VisitRequest { house_id, preferred_date }): Json<VisitRequest>,
) -> AppResult<(StatusCode, Json<Invitation>)> {
    let invitation = create_visit(&db_pool, user.id, house_id, preferred_date).await?;
    tracing::info!(invitation_id = invitation.id, user_id = user.id, house_id, "visit requested");
    Ok((StatusCode::CREATED, Json(invitation)))
}

#[debug_handler(state = AppState)]
async fn my_visits(
    State(db_pool): State<SqlitePool>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Invitation>>> {
    let invitations = sqlx::query_as(
        "SELECT * FROM invitations WHERE user_id=? ORDER BY requested_at DESC, id DESC",
    )
    .bind(user.id)
    .fetch_all(&db_pool)
    .await?;
    Ok(Json(invitations))
}
