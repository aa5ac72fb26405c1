//! buildops CLI - operator entry point for the construction operations API
//!
//! - `serve`: apply migrations and run the HTTP API
//! - `migrate`: apply embedded migrations only
//! - `create-admin`: create (or reuse) an admin workspace and account
//! - `seed-plans`: upsert the default plan catalogue

use anyhow::{Context, Result};
use buildops_core::BuildopsConfig;
use clap::{Parser, Subcommand};

mod commands;
mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "buildops",
    author,
    version,
    about = "Multi-tenant construction operations API and operator tooling",
    long_about = "Run the buildops RPC API and manage its database: migrations, \
                  the plan catalogue and administrator accounts. Settings come from \
                  ~/.buildops/config.toml, .env and the environment."
)]
struct Cli {
    /// Verbose logging (RUST_LOG still wins when set)
    #[arg(long, global = true)]
    debug: bool,

    /// Export traces over OTLP (requires the telemetry feature)
    #[arg(long, global = true)]
    otel: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply migrations, then serve the RPC API
    Serve(commands::serve::ServeArgs),
    /// Apply embedded database migrations
    Migrate(commands::migrate::MigrateArgs),
    /// Create an admin workspace and account with a generated password
    CreateAdmin(commands::admin::CreateAdminArgs),
    /// Upsert the default plan catalogue (free, starter, pro, enterprise)
    SeedPlans(commands::plans::SeedPlansArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_setup::init(&tracing_setup::TracingConfig {
        debug: cli.debug,
        otel: cli.otel,
    })
    .ok();

    let config = BuildopsConfig::load().context("failed to load configuration")?;

    let result = match cli.command {
        Commands::Serve(args) => commands::run_serve(args, config).await,
        Commands::Migrate(args) => commands::run_migrate(args, config).await,
        Commands::CreateAdmin(args) => commands::run_create_admin(args, config).await,
        Commands::SeedPlans(args) => commands::run_seed_plans(args, config).await,
    };

    tracing_setup::shutdown();
    result
}
