use axum::{
    debug_handler,
    extract::{Multipart, State},
    http::StatusCode,
};
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    appresult::{AppError, AppResult, FieldErrors},
    auth::CurrentAdmin,
    extract::Json,
    form::{MultipartForm, UploadedFile},
    media::{check_images, MediaKind, MediaStore},
    models::{utc_now, Admin, Category, FailureReport, HouseStatus, SuccessReport, VisitStatus},
    AppState,
};

use super::visits::load_assigned_visit;

#[derive(Debug, Clone, Copy)]
pub struct SuccessReportInput {
    pub invitation_id: i64,
    pub price: f64,
    pub commission: f64,
}

/// Opens a write transaction up front, so the report check and the insert
/// cannot interleave with another report for the same invitation.
async fn begin_report(db_pool: &SqlitePool) -> AppResult<sqlx::Transaction<'static, sqlx::Sqlite>> {
    Ok(db_pool.begin_with("BEGIN IMMEDIATE").await?)
}

async fn ensure_unreported(conn: &mut SqliteConnection, invitation_id: i64) -> AppResult<()> {
    let (reports,): (i64,) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM success_reports WHERE invitation_id=?)
              + (SELECT COUNT(*) FROM failure_reports WHERE invitation_id=?)",
    )
    .bind(invitation_id)
    .bind(invitation_id)
    .fetch_one(conn)
    .await?;
    if reports > 0 {
        return Err(AppError::bad_request("This visit request already has a report"));
    }
    Ok(())
}

/// Records a closed deal. The invitation becomes seen and the house sold or
/// rented, all in one transaction.
pub async fn file_success_report(
    db_pool: &SqlitePool,
    media: &MediaStore,
    admin: &Admin,
    SuccessReportInput { invitation_id, price, commission }: SuccessReportInput,
    photo: &UploadedFile,
) -> AppResult<SuccessReport> {
    let mut errors = FieldErrors::new();
    errors.check(price.is_finite() && price > 0.0, "price", "Must be > 0");
    errors.check(commission.is_finite() && commission >= 0.0, "commission", "Cannot be negative");
    check_images(&mut errors, "transaction_photo", std::slice::from_ref(photo));
    errors.into_result()?;

    let (invitation, house) = load_assigned_visit(db_pool, admin, invitation_id).await?;

    let photo_url = media.save(MediaKind::TransactionPhoto, photo).await?;
    let closed_status = match house.category {
        Category::Sell => HouseStatus::Sold,
        Category::Rent => HouseStatus::Rented,
    };

    let result = async {
        let now = utc_now();
        let mut tx = begin_report(db_pool).await?;
        ensure_unreported(&mut tx, invitation.id).await?;

        let report: SuccessReport = sqlx::query_as(
            "INSERT INTO success_reports (admin_id,invitation_id,price,commission,transaction_photo,created_at)
             VALUES (?,?,?,?,?,?) RETURNING *",
        )
        .bind(admin.id)
        .bind(invitation.id)
        .bind(price)
        .bind(commission)
        .bind(&photo_url)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE invitations SET status=?, visited_at=COALESCE(visited_at, ?) WHERE id=?")
            .bind(VisitStatus::Seen)
            .bind(now)
            .bind(invitation.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE houses SET status=? WHERE id=?")
            .bind(closed_status)
            .bind(house.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok::<_, AppError>(report)
    }
    .await;

    if result.is_err() {
        media.remove(&photo_url).await;
    }
    result
}

#[debug_handler(state = AppState)]
pub(super) async fn success_report(
    State(db_pool): State<SqlitePool>,
    State(media): State<MediaStore>,
    CurrentAdmin(admin): CurrentAdmin,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<SuccessReport>)> {
    let form = MultipartForm::collect(multipart).await?;

    let mut errors = FieldErrors::new();
    let invitation_id = form.required("invitation_id", &mut errors);
    let price = form.required("price", &mut errors);
    let commission = form.required("commission", &mut errors);
    let photo = form.files("transaction_photo").first();
    if photo.is_none() {
        errors.add("transaction_photo", "Required");
    }
    errors.into_result()?;
    let (Some(invitation_id), Some(price), Some(commission), Some(photo)) =
        (invitation_id, price, commission, photo)
    else {
        return Err(AppError::bad_request("incomplete report form"));
    };

    let input = SuccessReportInput { invitation_id, price, commission };
    let report = file_success_report(&db_pool, &media, &admin, input, photo).await?;

    tracing::info!(report_id = report.id, invitation_id, admin_id = admin.id, "success report filed");
    Ok((StatusCode::CREATED, Json(report)))
}

#[derive(Debug, Deserialize)]
pub struct FailureReportRequest {
    pub invitation_id: i64,
    pub reason: String,
}

pub async fn file_failure_report(
    db_pool: &SqlitePool,
    admin: &Admin,
    invitation_id: i64,
    reason: &str,
) -> AppResult<FailureReport> {
    let reason = reason.trim();
    let mut errors = FieldErrors::new();
    errors.check(!reason.is_empty(), "reason", "Required");
    errors.into_result()?;

    let (invitation, _) = load_assigned_visit(db_pool, admin, invitation_id).await?;

    let now = utc_now();
    let mut tx = begin_report(db_pool).await?;
    ensure_unreported(&mut tx, invitation.id).await?;
    let report: FailureReport = sqlx::query_as(
        "INSERT INTO failure_reports (admin_id,invitation_id,reason,created_at) VALUES (?,?,?,?) RETURNING *",
    )
    .bind(admin.id)
    .bind(invitation.id)
    .bind(reason)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;
    sqlx::query("UPDATE invitations SET status=?, visited_at=COALESCE(visited_at, ?) WHERE id=?")
        .bind(VisitStatus::Seen)
        .bind(now)
        .bind(invitation.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(report)
}

#[debug_handler(state = AppState)]
pub(super) async fn failure_report(
    State(db_pool): State<SqlitePool>,
    CurrentAdmin(admin): CurrentAdmin,
    Json(FailureReportRequest { invitation_id, reason }): Json<FailureReportRequest>,
) -> AppResult<(StatusCode, Json<FailureReport>)> {
    let report = file_failure_report(&db_pool, &admin, invitation_id, &reason).await?;
    tracing::info!(report_id = report.id, invitation_id, admin_id = admin.id, "failure report filed");
    Ok((StatusCode::CREATED, Json(report)))
}
