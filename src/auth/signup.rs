use axum::{debug_handler, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{
    appresult::AppResult,
    extract::Json,
    models::{Role, User},
    AppState,
};

use super::{create_user, NewUser, TokenKeys, TokenResponse};

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub phone: String,
    pub password: String,
    /// The inviting user's code, if any.
    pub invitation_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub user: User,
    #[serde(flatten)]
    pub token: TokenResponse,
}

#[debug_handler(state = AppState)]
pub async fn signup(
    State(db_pool): State<SqlitePool>,
    State(keys): State<TokenKeys>,
    Json(SignupRequest { name, phone, password, invitation_code }): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<SignupResponse>)> {
    let user = create_user(
        &db_pool,
        NewUser { name, phone, password, inviter_code: invitation_code },
    )
    .await?;

    let access_token = keys.issue_token(user.id, Role::User)?;
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse { user, token: TokenResponse::bearer(access_token, Role::User) }),
    ))
}
