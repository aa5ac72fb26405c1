//! `buildops serve`: migrate, then run the RPC API

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use buildops_core::BuildopsConfig;
use buildops_server::{run_server, ServerConfig};
use clap::Parser;

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (default: API_HOST:API_PORT, else 0.0.0.0:3001)
    #[arg(long, short = 'b')]
    pub bind: Option<SocketAddr>,

    /// Database URL (overrides config/environment)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Redis URL; without one sessions and rate limits live in process memory
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Skip applying migrations at startup
    #[arg(long)]
    pub no_migrate: bool,
}

pub async fn run_serve(args: ServeArgs, mut config: BuildopsConfig) -> Result<()> {
    if let Some(url) = args.database_url {
        config.database.url = url;
    }
    if let Some(url) = args.redis_url.filter(|u| !u.trim().is_empty()) {
        config.redis.url = Some(url);
    }
    let bind_addr = match args.bind {
        Some(addr) => addr,
        None => config.bind_addr().context("invalid API_HOST/API_PORT")?,
    };

    tracing::info!(
        %bind_addr,
        environment = %config.server.environment,
        web_url = %config.server.web_url,
        "starting buildops API"
    );

    let state = buildops_server::connect(config, !args.no_migrate)
        .await
        .context("failed to initialise server state")?;

    run_server(Arc::new(state), ServerConfig { bind_addr })
        .await
        .context("server error")?;

    Ok(())
}
