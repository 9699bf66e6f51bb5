pub mod admin;
pub mod appresult;
pub mod areas;
pub mod auth;
pub mod config;
pub mod db;
pub mod extract;
pub mod form;
pub mod houses;
pub mod media;
pub mod models;
pub mod super_admin;
pub mod users;
pub mod visits;

use axum::{extract::{DefaultBodyLimit, FromRef}, Router};
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use appresult::{AppError, AppResult};

use auth::TokenKeys;
use config::Config;
use houses::PageSize;
use media::{MediaStore, MEDIA_ROUTE};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub tokens: TokenKeys,
    pub media: MediaStore,
    pub page_size: PageSize,
    #[from_ref(skip)]
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(config: &Config, db_pool: SqlitePool) -> Self {
        Self {
            db_pool,
            tokens: TokenKeys::new(&config.jwt_secret, time::Duration::minutes(config.token_ttl_minutes)),
            media: MediaStore::new(&config.media_dir),
            page_size: PageSize(config.page_size),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

pub fn app(state: AppState) -> Router {
    let media = state.media.service();
    let max_upload_bytes = state.max_upload_bytes;

    Router::new()
        .merge(auth::router())
        .nest("/houses", houses::router())
        .nest("/areas", areas::router())
        .nest("/visits", visits::router())
        .nest("/users", users::router())
        .nest("/admin", admin::router())
        .nest("/super-admin", super_admin::router())
        .nest_service(MEDIA_ROUTE, media)

        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
