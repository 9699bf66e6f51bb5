use std::str::FromStr;

use anyhow::Context;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

use crate::{
    auth::{normalize_phone, password},
    config::SuperAdminSeed,
    models::{utc_now, AdminRole},
};

pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("invalid DATABASE_URL {database_url:?}"))?
        .create_if_missing(true)
        .foreign_keys(true);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .context("opening database")?;

    migrate(&db_pool).await?;
    Ok(db_pool)
}

/// A private in-memory database with the schema applied. A single
/// connection that never expires keeps the data alive for the pool's life.
pub async fn memory_pool() -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    migrate(&db_pool).await?;
    Ok(db_pool)
}

pub async fn migrate(db_pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db_pool)
        .await
        .context("running migrations")
}

/// Creates the configured super-admin unless an admin with that phone exists.
/// Returns whether a row was inserted.
pub async fn seed_super_admin(db_pool: &SqlitePool, seed: &SuperAdminSeed) -> anyhow::Result<bool> {
    let phone = normalize_phone(&seed.phone);
    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM admins WHERE phone=?")
        .bind(&phone)
        .fetch_optional(db_pool)
        .await?;
    if exists.is_some() {
        return Ok(false);
    }

    let password_hash = password::hash_password(&seed.password).await?;
    sqlx::query(
        "INSERT INTO admins (name,phone,password_hash,role,created_at) VALUES (?,?,?,?,?)",
    )
    .bind(&seed.name)
    .bind(&phone)
    .bind(password_hash)
    .bind(AdminRole::SuperAdmin)
    .bind(utc_now())
    .execute(db_pool)
    .await?;

    tracing::info!(%phone, "seeded super-admin");
    Ok(true)
}
