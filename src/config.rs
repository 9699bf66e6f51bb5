use std::{net::SocketAddr, path::PathBuf, str::FromStr};

use anyhow::{anyhow, Context};

/// Process configuration, read once at boot.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub bind_addr: SocketAddr,
    pub media_dir: PathBuf,
    pub page_size: i64,
    pub max_upload_bytes: usize,
    pub db_max_connections: u32,
    pub super_admin: Option<SuperAdminSeed>,
}

/// Credentials for the super-admin created on first boot.
#[derive(Clone)]
pub struct SuperAdminSeed {
    pub name: String,
    pub phone: String,
    pub password: String,
}

impl std::fmt::Debug for SuperAdminSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuperAdminSeed")
            .field("name", &self.name)
            .field("phone", &self.phone)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("{key} must be set"))
        };

        let super_admin = match (
            lookup("SUPER_ADMIN_NAME"),
            lookup("SUPER_ADMIN_PHONE"),
            lookup("SUPER_ADMIN_PASSWORD"),
        ) {
            (Some(name), Some(phone), Some(password)) => Some(SuperAdminSeed { name, phone, password }),
            _ => None,
        };

        let config = Config {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            token_ttl_minutes: parse_or(&lookup, "TOKEN_TTL_MINUTES", 60)?,
            bind_addr: parse_or(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            media_dir: lookup("MEDIA_DIR").map(PathBuf::from).unwrap_or_else(|| "media".into()),
            page_size: parse_or(&lookup, "PAGE_SIZE", 10)?,
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 16)?,
            super_admin,
        };

        if config.token_ttl_minutes <= 0 {
            return Err(anyhow!("TOKEN_TTL_MINUTES must be positive"));
        }
        if config.page_size <= 0 {
            return Err(anyhow!("PAGE_SIZE must be positive"));
        }

        Ok(config)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}
