use axum::{
    debug_handler,
    extract::{Multipart, State},
    http::StatusCode,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use time::Duration;

use crate::{
    appresult::{AppError, AppResult, FieldErrors},
    auth::{authorize, normalize_phone, CurrentAdmin},
    extract::{Json, Path},
    form::MultipartForm,
    houses::{area_exists, create_listing, fetch_house, HouseDraft, HouseUpdate},
    media::MediaStore,
    models::{utc_now, Admin, House, VipStatus},
    AppState,
};

#[debug_handler(state = AppState)]
pub(super) async fn assigned_houses(
    State(db_pool): State<SqlitePool>,
    CurrentAdmin(admin): CurrentAdmin,
) -> AppResult<Json<Vec<House>>> {
    let houses = sqlx::query_as(
        "SELECT * FROM houses WHERE assigned_admin_id=? ORDER BY created_at DESC, id DESC",
    )
    .bind(admin.id)
    .fetch_all(&db_pool)
    .await?;
    Ok(Json(houses))
}

/// Lists a house on behalf of the user with `owner_phone`, assigned to the caller.
#[debug_handler(state = AppState)]
pub(super) async fn post_house(
    State(db_pool): State<SqlitePool>,
    State(media): State<MediaStore>,
    CurrentAdmin(admin): CurrentAdmin,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<House>)> {
    let form = MultipartForm::collect(multipart).await?;

    let mut errors = FieldErrors::new();
    let owner_phone = form.required_text("owner_phone", &mut errors);
    let draft = match HouseDraft::from_form(&form, &db_pool).await {
        Ok(draft) => Some(draft),
        Err(AppError::Validation(form_errors)) => {
            errors.merge(form_errors);
            None
        }
        Err(e) => return Err(e),
    };
    errors.into_result()?;
    let (Some(owner_phone), Some(draft)) = (owner_phone, draft) else {
        return Err(AppError::bad_request("incomplete house form"));
    };

    let owner: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE phone=?")
        .bind(normalize_phone(&owner_phone))
        .fetch_optional(&db_pool)
        .await?;
    let Some((owner_id,)) = owner else {
        return Err(AppError::not_found("No user with that phone number"));
    };

    let house = create_listing(&db_pool, &media, &form, owner_id, Some(admin.id), &draft).await?;
    tracing::info!(house_id = house.id, owner_id, admin_id = admin.id, "house listed by admin");
    Ok((StatusCode::CREATED, Json(house)))
}

/// Applies a partial update to a house assigned to `admin`, re-validating the result.
pub async fn update_assigned_house(
    db_pool: &SqlitePool,
    admin: &Admin,
    house_id: i64,
    update: HouseUpdate,
) -> AppResult<House> {
    let house = fetch_house(db_pool, house_id).await?;
    authorize(admin, &house)?;

    let mut draft = HouseDraft::from_house(&house);
    let status = draft.apply(update).unwrap_or(house.status);

    let mut errors = match draft.validate(house.image_urls.len()) {
        Ok(()) => FieldErrors::new(),
        Err(errors) => errors,
    };
    if draft.area_code != house.area_code && !area_exists(db_pool, draft.area_code).await? {
        errors.add("area_code", "Unknown area");
    }
    errors.into_result()?;

    draft.update(db_pool, house.id, status).await
}

#[debug_handler(state = AppState)]
pub(super) async fn update_house(
    State(db_pool): State<SqlitePool>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(house_id): Path<i64>,
    Json(update): Json<HouseUpdate>,
) -> AppResult<Json<House>> {
    let house = update_assigned_house(&db_pool, &admin, house_id, update).await?;
    tracing::info!(house_id, admin_id = admin.id, status = %house.status, "house updated");
    Ok(Json(house))
}

#[debug_handler(state = AppState)]
pub(super) async fn delete_house(
    State(db_pool): State<SqlitePool>,
    State(media): State<MediaStore>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(house_id): Path<i64>,
) -> AppResult<StatusCode> {
    let house = fetch_house(&db_pool, house_id).await?;
    authorize(&admin, &house)?;

    sqlx::query("DELETE FROM houses WHERE id=?")
        .bind(house.id)
        .execute(&db_pool)
        .await?;
    for url in house.image_urls.iter() {
        media.remove(url).await;
    }

    tracing::info!(house_id, admin_id = admin.id, "house deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct VipRequest {
    pub duration_days: i64,
    pub price: f64,
}

/// Creates or replaces the house's VIP placement, starting now.
pub async fn set_house_vip(
    db_pool: &SqlitePool,
    admin: &Admin,
    house_id: i64,
    VipRequest { duration_days, price }: VipRequest,
) -> AppResult<VipStatus> {
    let mut errors = FieldErrors::new();
    errors.check((1..=365).contains(&duration_days), "duration_days", "Must be between 1 and 365");
    errors.check(price.is_finite() && price >= 0.0, "price", "Cannot be negative");
    errors.into_result()?;

    let house = fetch_house(db_pool, house_id).await?;
    authorize(admin, &house)?;

    let now = utc_now();
    let vip = sqlx::query_as(
        "INSERT INTO vip_statuses (house_id,created_at,duration_days,price,expires_at) VALUES (?,?,?,?,?)
         ON CONFLICT(house_id) DO UPDATE SET
            created_at=excluded.created_at, duration_days=excluded.duration_days,
            price=excluded.price, expires_at=excluded.expires_at
         RETURNING *",
    )
    .bind(house.id)
    .bind(now)
    .bind(duration_days)
    .bind(price)
    .bind(now + Duration::days(duration_days))
    .fetch_one(db_pool)
    .await?;
    Ok(vip)
}

#[debug_handler(state = AppState)]
pub(super) async fn set_vip(
    State(db_pool): State<SqlitePool>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(house_id): Path<i64>,
    Json(request): Json<VipRequest>,
) -> AppResult<Json<VipStatus>> {
    let vip = set_house_vip(&db_pool, &admin, house_id, request).await?;
    tracing::info!(house_id, admin_id = admin.id, days = vip.duration_days, "vip placement set");
    Ok(Json(vip))
}
