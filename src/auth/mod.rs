use axum::{routing::post, Router};
use rand::{distr::Alphanumeric, Rng};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::{
    appresult::{AppError, AppResult, FieldErrors},
    models::{utc_now, Role, User},
    AppState,
};

mod guard;
mod login;
pub mod password;
mod signup;
mod token;

pub use guard::{
    authorize, CurrentAdmin, CurrentUser, Identify, Owned, Principal, PrincipalId, SuperAdmin,
};
pub use login::login;
pub use signup::signup;
pub use token::{Claims, TokenError, TokenKeys};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub role: Role,
}

impl TokenResponse {
    pub fn bearer(access_token: String, role: Role) -> Self {
        Self { access_token, token_type: "bearer", role }
    }
}

/// Strips the separators people type into phone numbers.
pub(crate) fn normalize_phone(phone: &str) -> String {
    phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect()
}

pub(crate) fn check_name(errors: &mut FieldErrors, name: &str) {
    errors.check(!name.trim().is_empty(), "name", "Required");
}

/// Expects an already normalized number.
pub(crate) fn check_phone(errors: &mut FieldErrors, phone: &str) {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if phone.is_empty() {
        errors.add("phone", "Required");
    } else if !digits.chars().all(|c| c.is_ascii_digit()) || !(7..=15).contains(&digits.len()) {
        errors.add("phone", "Must be 7 to 15 digits");
    }
}

pub(crate) fn check_password(errors: &mut FieldErrors, password: &str) {
    errors.check(password.chars().count() >= 6, "password", "Must be at least 6 characters");
}

pub(crate) async fn user_phone_taken(db_pool: &SqlitePool, phone: &str) -> AppResult<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE phone=?")
        .bind(phone)
        .fetch_optional(db_pool)
        .await?;
    Ok(row.is_some())
}

pub(crate) async fn admin_phone_taken(db_pool: &SqlitePool, phone: &str) -> AppResult<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM admins WHERE phone=?")
        .bind(phone)
        .fetch_optional(db_pool)
        .await?;
    Ok(row.is_some())
}

fn new_invitation_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect()
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub phone: String,
    pub password: String,
    /// Code of the user who invited this one.
    pub inviter_code: Option<String>,
}

/// Validates and stores a new user. Duplicate phones and unknown inviter
/// codes are rejected with 400.
pub async fn create_user(db_pool: &SqlitePool, new_user: NewUser) -> AppResult<User> {
    let phone = normalize_phone(&new_user.phone);
    let mut errors = FieldErrors::new();
    check_name(&mut errors, &new_user.name);
    check_phone(&mut errors, &phone);
    check_password(&mut errors, &new_user.password);
    errors.into_result()?;

    if user_phone_taken(db_pool, &phone).await? {
        return Err(AppError::bad_request("Phone number already registered."));
    }

    let invited_by = match new_user.inviter_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => {
            let inviter: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE invitation_code=?")
                .bind(code.to_ascii_uppercase())
                .fetch_optional(db_pool)
                .await?;
            let Some((inviter_id,)) = inviter else {
                return Err(AppError::bad_request("Unknown invitation code"));
            };
            Some(inviter_id)
        }
        _ => None,
    };

    let mut invitation_code = new_invitation_code();
    while sqlx::query_as::<_, (i64,)>("SELECT id FROM users WHERE invitation_code=?")
        .bind(&invitation_code)
        .fetch_optional(db_pool)
        .await?
        .is_some()
    {
        invitation_code = new_invitation_code();
    }

    let password_hash = password::hash_password(&new_user.password).await?;
    let user: User = sqlx::query_as(
        "INSERT INTO users (name,phone,password_hash,invitation_code,invited_by,created_at)
         VALUES (?,?,?,?,?,?) RETURNING *",
    )
    .bind(new_user.name.trim())
    .bind(&phone)
    .bind(password_hash)
    .bind(&invitation_code)
    .bind(invited_by)
    .bind(utc_now())
    .fetch_one(db_pool)
    .await?;

    tracing::info!(user_id = user.id, invited_by = ?user.invited_by, "user signed up");
    Ok(user)
}
