use axum::{
    debug_handler,
    extract::State,
    http::StatusCode,
    routing::get,
    Router,
};
use serde::Deserialize;
use sqlx::{types::Json as SqlJson, SqlitePool};

use crate::{
    appresult::{AppError, AppResult, FieldErrors},
    auth::{
        check_name, check_password, check_phone, normalize_phone, password::hash_password,
        CurrentUser,
    },
    extract::Json,
    media::MediaStore,
    models::{House, User},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me).patch(update_me).delete(delete_me))
        .route("/me/houses", get(my_houses))
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

pub async fn update_profile(db_pool: &SqlitePool, user: User, update: ProfileUpdate) -> AppResult<User> {
    let mut errors = FieldErrors::new();
    if let Some(name) = &update.name {
        check_name(&mut errors, name);
    }
    let phone = update.phone.as_deref().map(normalize_phone);
    if let Some(phone) = &phone {
        check_phone(&mut errors, phone);
    }
    if let Some(password) = &update.password {
        check_password(&mut errors, password);
    }
    errors.into_result()?;

    if let Some(phone) = &phone {
        let taken: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE phone=? AND id<>?")
            .bind(phone)
            .bind(user.id)
            .fetch_optional(db_pool)
            .await?;
        if taken.is_some() {
            return Err(AppError::bad_request("Phone number already registered."));
        }
    }

    let password_hash = match &update.password {
        Some(password) => hash_password(password).await?,
        None => user.password_hash,
    };

    let user = sqlx::query_as("UPDATE users SET name=?, phone=?, password_hash=? WHERE id=? RETURNING *")
        .bind(update.name.as_deref().map(str::trim).unwrap_or(&user.name))
        .bind(phone.as_deref().unwrap_or(&user.phone))
        .bind(password_hash)
        .bind(user.id)
        .fetch_one(db_pool)
        .await?;
    Ok(user)
}

#[debug_handler(state = AppState)]
async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

#[debug_handler(state = AppState)]
async fn update_me(
    State(db_pool): State<SqlitePool>,
    CurrentUser(user): CurrentUser,
    Json(update): Json<ProfileUpdate>,
) -> AppResult<Json<User>> {
    let user = update_profile(&db_pool, user, update).await?;
    tracing::info!(user_id = user.id, "profile updated");
    Ok(Json(user))
}

/// Deletes the user, their houses and visit requests, then the houses' photos.
pub async fn delete_account(db_pool: &SqlitePool, media: &MediaStore, user_id: i64) -> AppResult<()> {
    let photos: Vec<(SqlJson<Vec<String>>,)> = sqlx::query_as("SELECT image_urls FROM houses WHERE owner_id=?")
        .bind(user_id)
        .fetch_all(db_pool)
        .await?;
    sqlx::query("DELETE FROM users WHERE id=?")
        .bind(user_id)
        .execute(db_pool)
        .await?;
    for url in photos.iter().flat_map(|(urls,)| urls.iter()) {
        media.remove(url).await;
    }
    Ok(())
}

#[debug_handler(state = AppState)]
async fn delete_me(
    State(db_pool): State<SqlitePool>,
    State(media): State<MediaStore>,
    CurrentUser(user): CurrentUser,
) -> AppResult<StatusCode> {
    delete_account(&db_pool, &media, user.id).await?;
    tracing::info!(user_id = user.id, "account deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[debug_handler(state = AppState)]
async fn my_houses(
    State(db_pool): State<SqlitePool>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<House>>> {
    let houses = sqlx::query_as("SELECT * FROM houses WHERE owner_id=? ORDER BY created_at DESC, id DESC")
        .bind(user.id)
        .fetch_all(&db_pool)
        .await?;
    Ok(Json(houses))
}
