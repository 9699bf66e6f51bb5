use axum::{
    debug_handler,
    extract::{Multipart, State},
    http::StatusCode,
};
use sqlx::SqlitePool;

use crate::{
    appresult::AppResult,
    auth::CurrentUser,
    extract::Json,
    form::MultipartForm,
    media::{MediaKind, MediaStore},
    models::House,
    AppState,
};

use super::{pick_admin_for_area, HouseDraft};

/// Validates, stores the photos, then inserts. Photos written for a listing
/// that fails to insert are removed again.
pub async fn create_listing(
    db_pool: &SqlitePool,
    media: &MediaStore,
    form: &MultipartForm,
    owner_id: i64,
    assigned_admin_id: Option<i64>,
    draft: &HouseDraft,
) -> AppResult<House> {
    let image_urls = media.save_all(MediaKind::HousePhoto, form.files("photos")).await?;

    match draft.insert(db_pool, owner_id, assigned_admin_id, &image_urls).await {
        Ok(house) => Ok(house),
        Err(e) => {
            for url in &image_urls {
                media.remove(url).await;
            }
            Err(e)
        }
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn post_house(
    State(db_pool): State<SqlitePool>,
    State(media): State<MediaStore>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<House>)> {
    let form = MultipartForm::collect(multipart).await?;
    let draft = HouseDraft::from_form(&form, &db_pool).await?;
    let assigned_admin_id = pick_admin_for_area(&db_pool, draft.area_code).await?;

    let house = create_listing(&db_pool, &media, &form, user.id, assigned_admin_id, &draft).await?;

    tracing::info!(
        house_id = house.id,
        owner_id = user.id,
        assigned_admin_id = ?house.assigned_admin_id,
        "house listed"
    );
    Ok((StatusCode::CREATED, Json(house)))
}
