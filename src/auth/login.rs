use axum::{
    debug_handler,
    extract::{FromRequest, Request, State},
    http::header::CONTENT_TYPE,
    Form,
};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{
    appresult::{AppError, AppResult},
    extract::Json,
    models::{Admin, Role, User},
    AppState,
};

use super::{normalize_phone, password::verify_password, TokenKeys, TokenResponse};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// OAuth2 password-flow clients send the phone as `username`.
    #[serde(alias = "username")]
    pub phone: String,
    pub password: String,
}

/// Accepts the credentials either as a urlencoded form or as JSON.
pub struct Credentials(pub LoginRequest);

impl<S> FromRequest<S> for Credentials
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));

        let request = if is_json {
            Json::<LoginRequest>::from_request(req, state).await?.0
        } else {
            Form::<LoginRequest>::from_request(req, state).await?.0
        };
        Ok(Credentials(request))
    }
}

#[debug_handler(state = AppState)]
pub async fn login(
    State(db_pool): State<SqlitePool>,
    State(keys): State<TokenKeys>,
    Credentials(LoginRequest { phone, password }): Credentials,
) -> AppResult<Json<TokenResponse>> {
    let phone = normalize_phone(&phone);

    // Phones are unique per table, not across tables: try users, then admins.
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE phone=?")
        .bind(&phone)
        .fetch_optional(&db_pool)
        .await?;
    if let Some(user) = user {
        if verify_password(&password, &user.password_hash).await? {
            let access_token = keys.issue_token(user.id, Role::User)?;
            tracing::info!(user_id = user.id, "user logged in");
            return Ok(Json(TokenResponse::bearer(access_token, Role::User)));
        }
    }

    let admin: Option<Admin> = sqlx::query_as("SELECT * FROM admins WHERE phone=?")
        .bind(&phone)
        .fetch_optional(&db_pool)
        .await?;
    if let Some(admin) = admin {
        if verify_password(&password, &admin.password_hash).await? {
            let role = Role::from(admin.role);
            let access_token = keys.issue_token(admin.id, role)?;
            tracing::info!(admin_id = admin.id, %role, "admin logged in");
            return Ok(Json(TokenResponse::bearer(access_token, role)));
        }
    }

    tracing::info!("rejected login");
    Err(AppError::unauthorized("Invalid credentials"))
}
