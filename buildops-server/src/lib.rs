//! buildops-server: multi-tenant construction operations API
//!
//! Every procedure is `POST /rpc/<namespace>.<procedure>` with a JSON body and
//! a session cookie (or bearer token). Postgres holds the records; a key-value
//! store (Redis, or in-process when `REDIS_URL` is unset) holds sessions, rate
//! limit windows, cached lookups and onboarding drafts.

pub mod auth;
pub mod cache;
pub mod db;
pub mod http;
pub mod models;
pub mod state;

use buildops_core::BuildopsConfig;

pub use http::{build_router, run_server, ServerConfig, ServerError};
pub use state::AppState;

/// Errors raised while bringing up the pool and key-value store
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("key-value store unavailable: {0}")]
    Cache(#[from] cache::CacheError),
}

/// Connect Postgres and the key-value store described by `config`.
///
/// Migrations are applied when `migrate` is set.
pub async fn connect(config: BuildopsConfig, migrate: bool) -> Result<AppState, StartupError> {
    let pool = db::create_pool_with_options(&config.database.url, config.database.max_connections).await?;
    tracing::info!(max_connections = config.database.max_connections, "database pool ready");

    if migrate {
        db::run_migrations(&pool).await?;
    }

    let kv = cache::connect(config.redis.url.as_deref()).await?;
    Ok(AppState::new(pool, kv, config))
}
