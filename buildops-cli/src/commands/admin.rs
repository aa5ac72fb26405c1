//! `buildops create-admin`: bootstrap an administrator account
//!
//! Reuses the tenant when the slug already exists. The generated password is
//! printed once and never stored in clear.

use anyhow::{Context, Result};
use buildops_core::BuildopsConfig;
use buildops_server::auth::hash_password;
use buildops_server::db::{create_pool, NewWorkspace, TenantRepo, UserRepo};
use buildops_server::models::{Email, OnboardingStep, Slug, TenantStatus, UserRole};
use clap::Parser;
use rand::Rng;
use serde_json::json;

const PASSWORD_LEN: usize = 24;
const PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*-_=+";

#[derive(Parser, Debug)]
pub struct CreateAdminArgs {
    /// Email address of the admin account
    #[arg(long, default_value = "admin@enterprise.local")]
    pub email: String,

    /// Display name of the admin account
    #[arg(long, default_value = "System Administrator")]
    pub name: String,

    /// Slug of the admin workspace, created if missing (default: derived from
    /// the workspace name, i.e. enterprise-admin)
    #[arg(long)]
    pub tenant_slug: Option<String>,

    /// Name given to a newly created admin workspace
    #[arg(long, default_value = "Enterprise Admin")]
    pub tenant_name: String,

    /// Database URL (overrides config/environment)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
}

/// Random password drawn from letters, digits and symbols.
fn generate_password(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(PASSWORD_CHARSET[rng.gen_range(0..PASSWORD_CHARSET.len())]))
        .collect()
}

pub async fn run_create_admin(args: CreateAdminArgs, config: BuildopsConfig) -> Result<()> {
    let email = Email::new(&args.email)?.into_string();
    let raw_slug = args
        .tenant_slug
        .clone()
        .unwrap_or_else(|| buildops_core::slugify(&args.tenant_name));
    let slug = Slug::new(&raw_slug)?.into_string();

    let url = args.database_url.unwrap_or(config.database.url);
    let pool = create_pool(&url)
        .await
        .context("failed to connect to the database")?;

    let users = UserRepo::new(&pool);
    if let Some(existing) = users.find_by_email(&email).await? {
        println!("An account for {email} already exists (role: {}).", existing.role);
        println!("Use the existing credentials or reset the password.");
        return Ok(());
    }

    let password = generate_password(PASSWORD_LEN);
    let password_hash = hash_password(&password).context("failed to hash password")?;

    let tenants = TenantRepo::new(&pool);
    let tenant_name = match tenants.find_by_slug(&slug).await? {
        Some(tenant) => {
            tracing::info!(slug = %tenant.slug, "reusing existing admin workspace");
            users
                .create_member(tenant.id, &email, &args.name, &password_hash, UserRole::Admin)
                .await?;
            tenant.name
        }
        None => {
            let (tenant, _) = tenants
                .create_workspace(NewWorkspace {
                    name: args.tenant_name.clone(),
                    slug: slug.clone(),
                    plan: "enterprise".into(),
                    status: TenantStatus::Active,
                    onboarding_step: OnboardingStep::Complete,
                    settings: json!({ "brand_color": "#8b5cf6", "timezone": "America/Chicago" }),
                    trial_ends_at: None,
                    owner_name: args.name.clone(),
                    owner_email: email.clone(),
                    owner_password_hash: password_hash,
                    owner_role: UserRole::Admin,
                    owner_email_verified: true,
                })
                .await?;
            tracing::info!(slug = %tenant.slug, "created admin workspace");
            tenant.name
        }
    };

    println!("Admin account created.");
    println!("  Workspace: {tenant_name} ({slug})");
    println!("  Email:     {email}");
    println!("  Password:  {password}");
    println!();
    println!("Store this password now; it will not be shown again.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_uses_charset() {
        let password = generate_password(PASSWORD_LEN);
        assert_eq!(password.chars().count(), PASSWORD_LEN);
        assert!(password.bytes().all(|b| PASSWORD_CHARSET.contains(&b)));
    }

    #[test]
    fn default_slug_comes_from_workspace_name() {
        let args = CreateAdminArgs::parse_from(["create-admin"]);
        assert!(args.tenant_slug.is_none());
        assert_eq!(buildops_core::slugify(&args.tenant_name), "enterprise-admin");
    }

    #[test]
    fn passwords_differ() {
        assert_ne!(generate_password(PASSWORD_LEN), generate_password(PASSWORD_LEN));
    }
}
