//! Postgres pool shared by every request

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Used by the CLI commands; `serve` takes `database.max_connections` instead.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// A request waiting longer than this for a connection fails with a pool timeout.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// ```ignore
/// let pool = create_pool("postgres://localhost/buildops").await?;
/// ```
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    create_pool_with_options(database_url, DEFAULT_MAX_CONNECTIONS).await
}

pub async fn create_pool_with_options(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .idle_timeout(IDLE_TIMEOUT)
        .connect(database_url)
        .await?;
    tracing::debug!(max_connections, "connected to postgres");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    // DATABASE_URL=postgres://... cargo test -p buildops-server -- --ignored

    #[tokio::test]
    #[ignore = "requires database"]
    async fn pool_respects_connection_limit() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = create_pool_with_options(&url, 3).await.expect("pool creation failed");

        let (now_ok,): (bool,) = sqlx::query_as("SELECT now() IS NOT NULL")
            .fetch_one(&pool)
            .await
            .expect("query failed");
        assert!(now_ok);
        assert!(pool.size() <= 3);
    }
}
