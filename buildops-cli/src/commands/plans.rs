//! `buildops seed-plans`: upsert the default plan catalogue

use anyhow::{Context, Result};
use buildops_core::BuildopsConfig;
use buildops_server::cache::{self, JsonCache};
use buildops_server::db::create_pool;
use buildops_server::db::repos::billing::{default_plans, BillingRepo};
use buildops_server::http::routes::billing::PLANS_CACHE_PREFIX;
use clap::Parser;

#[derive(Parser, Debug)]
pub struct SeedPlansArgs {
    /// Database URL (overrides config/environment)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Redis URL whose cached plan list is invalidated after seeding
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,
}

pub async fn run_seed_plans(args: SeedPlansArgs, config: BuildopsConfig) -> Result<()> {
    let url = args.database_url.unwrap_or(config.database.url);
    let pool = create_pool(&url)
        .await
        .context("failed to connect to the database")?;

    let repo = BillingRepo::new(&pool);
    for seed in default_plans() {
        let plan = repo
            .upsert_plan(&seed)
            .await
            .with_context(|| format!("failed to upsert plan '{}'", seed.slug))?;
        println!(
            "  {:<12} {:>8}  ({} features)",
            plan.slug,
            format_price(plan.price_cents),
            plan.features.0.len()
        );
    }

    // A cached plan list would otherwise outlive the new prices for up to an hour.
    let redis_url = args
        .redis_url
        .filter(|u| !u.trim().is_empty())
        .or(config.redis.url);
    if let Some(redis_url) = redis_url {
        match cache::connect(Some(&redis_url)).await {
            Ok(store) => match JsonCache::new(store).invalidate_prefix(PLANS_CACHE_PREFIX).await {
                Ok(removed) => tracing::info!(removed, "invalidated cached plan lists"),
                Err(e) => tracing::warn!(error = %e, "failed to invalidate cached plan lists"),
            },
            Err(e) => tracing::warn!(error = %e, "redis unavailable; cached plan lists left in place"),
        }
    }

    println!("Plans seeded.");
    Ok(())
}

fn format_price(cents: i64) -> String {
    if cents == 0 {
        "free".to_owned()
    } else {
        format!("${}.{:02}/mo", cents / 100, cents % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_prices() {
        assert_eq!(format_price(0), "free");
        assert_eq!(format_price(4_900), "$49.00/mo");
        assert_eq!(format_price(14_950), "$149.50/mo");
    }
}
