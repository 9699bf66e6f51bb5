//! Request-level authorization: who is calling, and may they touch this row.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use sqlx::SqlitePool;

use crate::{
    appresult::{AppError, AppResult},
    models::{Admin, AdminRole, House, Invitation, Role, User},
};

use super::TokenKeys;

/// The authenticated caller, loaded from the table its token's role points at.
#[derive(Debug, Clone)]
pub enum Principal {
    User(User),
    Admin(Admin),
}

impl Principal {
    pub async fn load(db_pool: &SqlitePool, principal_id: i64, role: Role) -> AppResult<Self> {
        match role {
            Role::User => {
                let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id=?")
                    .bind(principal_id)
                    .fetch_optional(db_pool)
                    .await?;
                user.map(Principal::User)
                    .ok_or_else(|| AppError::unauthorized("User not found"))
            }
            Role::Admin | Role::SuperAdmin => {
                let admin: Option<Admin> = sqlx::query_as("SELECT * FROM admins WHERE id=?")
                    .bind(principal_id)
                    .fetch_optional(db_pool)
                    .await?;
                let admin = admin.ok_or_else(|| AppError::unauthorized("Admin not found"))?;
                if Role::from(admin.role) != role {
                    return Err(AppError::unauthorized("Token role is out of date"));
                }
                Ok(Principal::Admin(admin))
            }
        }
    }
}

fn bearer_token(parts: &Parts) -> AppResult<&str> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::unauthorized("Not authenticated"))?;
    let header = header
        .to_str()
        .map_err(|_| AppError::unauthorized("Invalid Authorization header"))?;

    match header.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AppError::unauthorized("Invalid Authorization header")),
    }
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
    TokenKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = TokenKeys::from_ref(state);
        let db_pool = SqlitePool::from_ref(state);

        let (principal_id, role) = keys.verify_token(bearer_token(parts)?)?;
        Principal::load(&db_pool, principal_id, role).await
    }
}

/// Caller must be a regular user.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
    TokenKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Principal::from_request_parts(parts, state).await? {
            Principal::User(user) => Ok(CurrentUser(user)),
            Principal::Admin(_) => Err(AppError::forbidden("Only users can do this")),
        }
    }
}

/// Caller must be an admin or a super-admin.
#[derive(Debug, Clone)]
pub struct CurrentAdmin(pub Admin);

impl<S> FromRequestParts<S> for CurrentAdmin
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
    TokenKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Principal::from_request_parts(parts, state).await? {
            Principal::Admin(admin) => Ok(CurrentAdmin(admin)),
            Principal::User(_) => Err(AppError::forbidden("Only admins can do this")),
        }
    }
}

/// Caller must be a super-admin.
#[derive(Debug, Clone)]
pub struct SuperAdmin(pub Admin);

impl<S> FromRequestParts<S> for SuperAdmin
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
    TokenKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentAdmin(admin) = CurrentAdmin::from_request_parts(parts, state).await?;
        match admin.role {
            AdminRole::SuperAdmin => Ok(SuperAdmin(admin)),
            AdminRole::Admin => Err(AppError::forbidden("Only super-admins can do this")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrincipalId {
    User(i64),
    Admin(i64),
}

pub trait Identify {
    fn principal_id(&self) -> PrincipalId;
}

impl Identify for User {
    fn principal_id(&self) -> PrincipalId {
        PrincipalId::User(self.id)
    }
}

impl Identify for Admin {
    fn principal_id(&self) -> PrincipalId {
        PrincipalId::Admin(self.id)
    }
}

impl Identify for Principal {
    fn principal_id(&self) -> PrincipalId {
        match self {
            Principal::User(user) => user.principal_id(),
            Principal::Admin(admin) => admin.principal_id(),
        }
    }
}

/// Rows that belong to a specific principal.
pub trait Owned {
    const KIND: &'static str;

    fn belongs_to(&self, who: PrincipalId) -> bool;
}

/// A house belongs to its owner and to the admin it is assigned to.
impl Owned for House {
    const KIND: &'static str = "house";

    fn belongs_to(&self, who: PrincipalId) -> bool {
        match who {
            PrincipalId::User(id) => self.owner_id == id,
            PrincipalId::Admin(id) => self.assigned_admin_id == Some(id),
        }
    }
}

impl Owned for Invitation {
    const KIND: &'static str = "visit request";

    fn belongs_to(&self, who: PrincipalId) -> bool {
        who == PrincipalId::User(self.user_id)
    }
}

pub fn authorize<P: Identify, R: Owned>(who: &P, resource: &R) -> AppResult<()> {
    if resource.belongs_to(who.principal_id()) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("You are not responsible for this {}", R::KIND)))
    }
}
