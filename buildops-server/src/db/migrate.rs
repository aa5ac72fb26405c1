//! Embedded schema migrations

use sqlx::migrate::{MigrateError, Migrator};
use sqlx::PgPool;

/// Migrations compiled from `buildops-server/migrations`
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Apply pending migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await?;
    tracing::info!(count = MIGRATOR.iter().count(), "database migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_embedded_in_order() {
        let versions: Vec<i64> = MIGRATOR.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2, 3, 4, 5]);
    }
}
