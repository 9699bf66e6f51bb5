use std::collections::HashMap;

use axum::{
    debug_handler,
    extract::{Multipart, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{
    appresult::{AppError, AppResult, FieldErrors},
    auth::{
        admin_phone_taken, check_name, check_password, check_phone, normalize_phone,
        password::hash_password, SuperAdmin,
    },
    extract::{Json, Path},
    form::{MultipartForm, UploadedFile},
    houses::area_exists,
    media::{check_images, MediaKind, MediaStore},
    models::{utc_now, Admin, AdminRole},
    AppState,
};

#[derive(Debug, Serialize)]
pub struct AdminWithAreas {
    #[serde(flatten)]
    pub admin: Admin,
    pub area_codes: Vec<i64>,
}

pub async fn admins_with_areas(db_pool: &SqlitePool) -> AppResult<Vec<AdminWithAreas>> {
    let admins: Vec<Admin> = sqlx::query_as("SELECT * FROM admins ORDER BY id")
        .fetch_all(db_pool)
        .await?;
    let assignments: Vec<(i64, i64)> =
        sqlx::query_as("SELECT admin_id, area_code FROM admin_areas ORDER BY area_code")
            .fetch_all(db_pool)
            .await?;

    let mut codes: HashMap<i64, Vec<i64>> = HashMap::new();
    for (admin_id, area_code) in assignments {
        codes.entry(admin_id).or_default().push(area_code);
    }

    Ok(admins
        .into_iter()
        .map(|admin| {
            let area_codes = codes.remove(&admin.id).unwrap_or_default();
            AdminWithAreas { admin, area_codes }
        })
        .collect())
}

#[debug_handler(state = AppState)]
pub(super) async fn list_admins(
    State(db_pool): State<SqlitePool>,
    SuperAdmin(_): SuperAdmin,
) -> AppResult<Json<Vec<AdminWithAreas>>> {
    Ok(Json(admins_with_areas(&db_pool).await?))
}

#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub name: String,
    pub phone: String,
    pub password: String,
    pub area_codes: Vec<i64>,
    pub id_front: UploadedFile,
    pub id_back: UploadedFile,
}

/// Creates an account with role `admin`. Super-admins only come from boot seeding.
pub async fn create_admin(db_pool: &SqlitePool, media: &MediaStore, new_admin: NewAdmin) -> AppResult<AdminWithAreas> {
    let phone = normalize_phone(&new_admin.phone);
    let mut errors = FieldErrors::new();
    check_name(&mut errors, &new_admin.name);
    check_phone(&mut errors, &phone);
    check_password(&mut errors, &new_admin.password);
    check_images(&mut errors, "id_front", std::slice::from_ref(&new_admin.id_front));
    check_images(&mut errors, "id_back", std::slice::from_ref(&new_admin.id_back));
    errors.into_result()?;

    if admin_phone_taken(db_pool, &phone).await? {
        return Err(AppError::bad_request("Phone already exists"));
    }
    for code in &new_admin.area_codes {
        if !area_exists(db_pool, *code).await? {
            return Err(AppError::bad_request(format!("Unknown area {code}")));
        }
    }

    let password_hash = hash_password(&new_admin.password).await?;
    let id_front = media.save(MediaKind::IdDocument, &new_admin.id_front).await?;
    let id_back = match media.save(MediaKind::IdDocument, &new_admin.id_back).await {
        Ok(url) => url,
        Err(e) => {
            media.remove(&id_front).await;
            return Err(e);
        }
    };

    let result = async {
        let mut tx = db_pool.begin().await?;
        let admin: Admin = sqlx::query_as(
            "INSERT INTO admins (name,phone,password_hash,id_front,id_back,role,created_at)
             VALUES (?,?,?,?,?,?,?) RETURNING *",
        )
        .bind(new_admin.name.trim())
        .bind(&phone)
        .bind(&password_hash)
        .bind(&id_front)
        .bind(&id_back)
        .bind(AdminRole::Admin)
        .bind(utc_now())
        .fetch_one(&mut *tx)
        .await?;

        for code in &new_admin.area_codes {
            sqlx::query("INSERT OR IGNORE INTO admin_areas (admin_id,area_code) VALUES (?,?)")
                .bind(admin.id)
                .bind(code)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok::<_, AppError>(admin)
    }
    .await;

    match result {
        Ok(admin) => {
            let mut area_codes = new_admin.area_codes;
            area_codes.sort_unstable();
            area_codes.dedup();
            Ok(AdminWithAreas { admin, area_codes })
        }
        Err(e) => {
            media.remove(&id_front).await;
            media.remove(&id_back).await;
            Err(e)
        }
    }
}

fn parse_area_codes(raw: Option<&str>, errors: &mut FieldErrors) -> Vec<i64> {
    let mut codes = Vec::new();
    for part in raw.unwrap_or_default().split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.parse() {
            Ok(code) => codes.push(code),
            Err(_) => errors.add("area_codes", format!("Invalid area code `{part}`")),
        }
    }
    codes
}

#[debug_handler(state = AppState)]
pub(super) async fn add_admin(
    State(db_pool): State<SqlitePool>,
    State(media): State<MediaStore>,
    SuperAdmin(creator): SuperAdmin,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<AdminWithAreas>)> {
    let form = MultipartForm::collect(multipart).await?;

    let mut errors = FieldErrors::new();
    let name = form.required_text("name", &mut errors);
    let phone = form.required_text("phone", &mut errors);
    let password = form.required_text("password", &mut errors);
    let area_codes = parse_area_codes(form.text("area_codes"), &mut errors);
    let id_front = form.files("id_front").first().cloned();
    let id_back = form.files("id_back").first().cloned();
    errors.check(id_front.is_some(), "id_front", "Required");
    errors.check(id_back.is_some(), "id_back", "Required");
    errors.into_result()?;
    let (Some(name), Some(phone), Some(password), Some(id_front), Some(id_back)) =
        (name, phone, password, id_front, id_back)
    else {
        return Err(AppError::bad_request("incomplete admin form"));
    };

    let created = create_admin(
        &db_pool,
        &media,
        NewAdmin { name, phone, password, area_codes, id_front, id_back },
    )
    .await?;

    tracing::info!(admin_id = created.admin.id, created_by = creator.id, "admin created");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn fetch_admin(db_pool: &SqlitePool, admin_id: i64) -> AppResult<Admin> {
    sqlx::query_as("SELECT * FROM admins WHERE id=?")
        .bind(admin_id)
        .fetch_optional(db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("Admin not found"))
}

pub async fn remove_admin(db_pool: &SqlitePool, media: &MediaStore, admin_id: i64) -> AppResult<()> {
    let admin = fetch_admin(db_pool, admin_id).await?;
    if admin.role == AdminRole::SuperAdmin {
        return Err(AppError::forbidden("Super-admin accounts cannot be deleted"));
    }

    sqlx::query("DELETE FROM admins WHERE id=?")
        .bind(admin.id)
        .execute(db_pool)
        .await?;
    for url in [&admin.id_front, &admin.id_back].into_iter().flatten() {
        media.remove(url).await;
    }
    Ok(())
}

#[debug_handler(state = AppState)]
pub(super) async fn delete_admin(
    State(db_pool): State<SqlitePool>,
    State(media): State<MediaStore>,
    SuperAdmin(actor): SuperAdmin,
    Path(admin_id): Path<i64>,
) -> AppResult<StatusCode> {
    remove_admin(&db_pool, &media, admin_id).await?;
    tracing::info!(admin_id, deleted_by = actor.id, "admin deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct AreaAssignment {
    pub area_code: i64,
}

#[debug_handler(state = AppState)]
pub(super) async fn assign_area(
    State(db_pool): State<SqlitePool>,
    SuperAdmin(actor): SuperAdmin,
    Path(admin_id): Path<i64>,
    Json(AreaAssignment { area_code }): Json<AreaAssignment>,
) -> AppResult<StatusCode> {
    fetch_admin(&db_pool, admin_id).await?;
    if !area_exists(&db_pool, area_code).await? {
        return Err(AppError::not_found("Area not found"));
    }

    sqlx::query("INSERT OR IGNORE INTO admin_areas (admin_id,area_code) VALUES (?,?)")
        .bind(admin_id)
        .bind(area_code)
        .execute(&db_pool)
        .await?;
    tracing::info!(admin_id, area_code, by = actor.id, "area assigned");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unassign(db_pool: &SqlitePool, admin_id: i64, area_code: i64) -> AppResult<()> {
    let removed = sqlx::query("DELETE FROM admin_areas WHERE admin_id=? AND area_code=?")
        .bind(admin_id)
        .bind(area_code)
        .execute(db_pool)
        .await?
        .rows_affected();
    if removed == 0 {
        return Err(AppError::not_found("Assignment not found"));
    }
    Ok(())
}

#[debug_handler(state = AppState)]
pub(super) async fn unassign_area(
    State(db_pool): State<SqlitePool>,
    SuperAdmin(actor): SuperAdmin,
    Path((admin_id, area_code)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    unassign(&db_pool, admin_id, area_code).await?;
    tracing::info!(admin_id, area_code, by = actor.id, "area unassigned");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::body::Bytes;

    use super::*;
    use crate::{
        config::SuperAdminSeed,
        db::{self, seed_super_admin},
        houses::testutil,
    };

    fn id_scan(name: &str) -> UploadedFile {
        UploadedFile {
            file_name: name.to_owned(),
            content_type: Some("image/jpeg".to_owned()),
            bytes: Bytes::from_static(b"scan"),
        }
    }

    fn new_admin(phone: &str, area_codes: Vec<i64>) -> NewAdmin {
        NewAdmin {
            name: "Kebede".to_owned(),
            phone: phone.to_owned(),
            password: "admin-pass".to_owned(),
            area_codes,
            id_front: id_scan("front.jpg"),
            id_back: id_scan("back.jpg"),
        }
    }

    #[tokio::test]
    async fn created_admins_are_plain_admins_with_areas() {
        let db_pool = db::memory_pool().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path());
        testutil::area(&db_pool, 1, "Bole").await;
        testutil::area(&db_pool, 2, "Piassa").await;

        let created = create_admin(&db_pool, &media, new_admin("0922000001", vec![2, 1, 2])).await.unwrap();
        assert_eq!(created.admin.role, AdminRole::Admin);
        assert_eq!(created.area_codes, vec![1, 2]);
        assert!(created.admin.id_front.as_deref().is_some_and(|u| u.starts_with("/media/id_documents/")));

        let listed = admins_with_areas(&db_pool).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].area_codes, vec![1, 2]);

        let dup = create_admin(&db_pool, &media, new_admin("0922000001", vec![])).await;
        assert!(matches!(dup, Err(AppError::BadRequest(_))));

        let unknown = create_admin(&db_pool, &media, new_admin("0922000002", vec![9])).await;
        assert!(matches!(unknown, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn super_admins_survive_deletion_requests() {
        let db_pool = db::memory_pool().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path());
        let seed = SuperAdminSeed {
            name: "Root".to_owned(),
            phone: "0900000000".to_owned(),
            password: "changeme".to_owned(),
        };
        seed_super_admin(&db_pool, &seed).await.unwrap();
        let (root_id,): (i64,) = sqlx::query_as("SELECT id FROM admins WHERE phone='0900000000'")
            .fetch_one(&db_pool)
            .await
            .unwrap();

        assert!(matches!(remove_admin(&db_pool, &media, root_id).await, Err(AppError::Forbidden(_))));
        assert!(matches!(remove_admin(&db_pool, &media, 999).await, Err(AppError::NotFound(_))));

        let plain = create_admin(&db_pool, &media, new_admin("0922000001", vec![])).await.unwrap();
        remove_admin(&db_pool, &media, plain.admin.id).await.unwrap();
        assert_eq!(admins_with_areas(&db_pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn removing_a_missing_assignment_is_not_found() {
        let db_pool = db::memory_pool().await.unwrap();
        testutil::area(&db_pool, 1, "Bole").await;
        let admin = testutil::admin(&db_pool, "0922000001", &[1]).await;

        unassign(&db_pool, admin.id, 1).await.unwrap();
        assert!(matches!(unassign(&db_pool, admin.id, 1).await, Err(AppError::NotFound(_))));
    }

    #[test]
    fn area_codes_are_comma_separated() {
        let mut errors = FieldErrors::new();
        assert_eq!(parse_area_codes(Some("1, 2,,3"), &mut errors), vec![1, 2, 3]);
        assert!(errors.is_empty());
        parse_area_codes(Some("1,x"), &mut errors);
        assert!(errors.contains("area_codes"));
        assert!(parse_area_codes(None, &mut errors).is_empty());
    }
}
