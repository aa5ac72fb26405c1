//! `buildops migrate`

use anyhow::{Context, Result};
use buildops_core::BuildopsConfig;
use buildops_server::db::{create_pool, run_migrations};
use clap::Parser;

#[derive(Parser, Debug)]
pub struct MigrateArgs {
    /// Database URL (overrides config/environment)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
}

pub async fn run_migrate(args: MigrateArgs, config: BuildopsConfig) -> Result<()> {
    let url = args.database_url.unwrap_or(config.database.url);
    let pool = create_pool(&url)
        .await
        .context("failed to connect to the database")?;

    run_migrations(&pool).await.context("migration failed")?;
    println!("Migrations applied.");
    Ok(())
}
