//! Plan catalogue and workspace subscriptions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::DbError;
use crate::models::SubscriptionStatus;

/// Usage caps stored on a plan. Negative values mean unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanLimits {
    pub projects: i64,
    pub team_members: i64,
    pub homeowners: i64,
}

impl Default for PlanLimits {
    /// Limits of a workspace whose plan is missing from the catalogue.
    fn default() -> Self {
        Self {
            projects: 1,
            team_members: 2,
            homeowners: 5,
        }
    }
}

impl PlanLimits {
    /// Reported as-is by `tenants.usage`; the web client renders it as "unlimited".
    pub const UNLIMITED: i64 = -1;
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PlanRecord {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub interval: String,
    pub features: Json<Vec<String>>,
    pub limits: Json<PlanLimits>,
    pub is_active: bool,
    pub sort_order: i32,
    #[serde(skip_serializing, default)]
    pub stripe_price_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SubscriptionRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    #[serde(skip_serializing)]
    pub stripe_customer_id: Option<String>,
    #[serde(skip_serializing)]
    pub stripe_subscription_id: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Plan fields written by `seed-plans`
#[derive(Debug, Clone)]
pub struct PlanSeed {
    pub name: &'static str,
    pub slug: &'static str,
    pub description: &'static str,
    pub price_cents: i64,
    pub features: &'static [&'static str],
    pub limits: PlanLimits,
    pub sort_order: i32,
}

/// Default plan catalogue.
pub fn default_plans() -> Vec<PlanSeed> {
    vec![
        PlanSeed {
            name: "Free",
            slug: "free",
            description: "Get started with basic features",
            price_cents: 0,
            features: &["1 project", "2 team members", "Basic support"],
            limits: PlanLimits::default(),
            sort_order: 0,
        },
        PlanSeed {
            name: "Starter",
            slug: "starter",
            description: "Perfect for small builders",
            price_cents: 4_900,
            features: &["10 projects", "5 team members", "Priority support", "Homeowner portal"],
            limits: PlanLimits {
                projects: 10,
                team_members: 5,
                homeowners: 25,
            },
            sort_order: 1,
        },
        PlanSeed {
            name: "Pro",
            slug: "pro",
            description: "For growing construction companies",
            price_cents: 14_900,
            features: &[
                "Unlimited projects",
                "20 team members",
                "Premium support",
                "Custom branding",
                "API access",
            ],
            limits: PlanLimits {
                projects: PlanLimits::UNLIMITED,
                team_members: 20,
                homeowners: PlanLimits::UNLIMITED,
            },
            sort_order: 2,
        },
        PlanSeed {
            name: "Enterprise",
            slug: "enterprise",
            description: "For large organizations",
            price_cents: 49_900,
            features: &["Unlimited everything", "Dedicated support", "SSO/SAML", "Audit logs"],
            limits: PlanLimits {
                projects: PlanLimits::UNLIMITED,
                team_members: PlanLimits::UNLIMITED,
                homeowners: PlanLimits::UNLIMITED,
            },
            sort_order: 3,
        },
    ]
}

/// Billing repository
pub struct BillingRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> BillingRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn active_plans(&self) -> Result<Vec<PlanRecord>, DbError> {
        let plans = sqlx::query_as::<_, PlanRecord>(
            "SELECT * FROM plans WHERE is_active ORDER BY sort_order ASC",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(plans)
    }

    pub async fn plan(&self, id: Uuid) -> Result<PlanRecord, DbError> {
        sqlx::query_as::<_, PlanRecord>("SELECT * FROM plans WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("plan", id))
    }

    pub async fn plan_by_slug(&self, slug: &str) -> Result<Option<PlanRecord>, DbError> {
        let plan = sqlx::query_as::<_, PlanRecord>("SELECT * FROM plans WHERE slug = $1")
            .bind(slug)
            .fetch_optional(self.pool)
            .await?;
        Ok(plan)
    }

    /// Limits for a plan slug, falling back to the free-tier defaults.
    pub async fn limits_for(&self, slug: &str) -> Result<PlanLimits, DbError> {
        Ok(self
            .plan_by_slug(slug)
            .await?
            .map(|p| p.limits.0)
            .unwrap_or_default())
    }

    /// Insert or refresh a catalogue entry by slug.
    pub async fn upsert_plan(&self, seed: &PlanSeed) -> Result<PlanRecord, DbError> {
        let features: Vec<String> = seed.features.iter().map(|f| (*f).to_owned()).collect();
        let plan = sqlx::query_as::<_, PlanRecord>(
            r#"
            INSERT INTO plans (name, slug, description, price_cents, features, limits, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (slug) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                price_cents = EXCLUDED.price_cents,
                features = EXCLUDED.features,
                limits = EXCLUDED.limits,
                sort_order = EXCLUDED.sort_order
            RETURNING *
            "#,
        )
        .bind(seed.name)
        .bind(seed.slug)
        .bind(seed.description)
        .bind(seed.price_cents)
        .bind(Json(features))
        .bind(Json(seed.limits))
        .bind(seed.sort_order)
        .fetch_one(self.pool)
        .await?;
        Ok(plan)
    }

    pub async fn subscription(&self, tenant_id: Uuid) -> Result<Option<SubscriptionRecord>, DbError> {
        let sub = sqlx::query_as::<_, SubscriptionRecord>(
            "SELECT * FROM subscriptions WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(sub)
    }

    /// Set or clear the pending cancellation flag.
    pub async fn set_cancel_at_period_end(&self, tenant_id: Uuid, cancel: bool) -> Result<SubscriptionRecord, DbError> {
        sqlx::query_as::<_, SubscriptionRecord>(
            r#"
            UPDATE subscriptions SET cancel_at_period_end = $2, updated_at = NOW()
            WHERE tenant_id = $1
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(cancel)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("subscription", tenant_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_limit_keys_fall_back_to_free_tier() {
        let limits: PlanLimits = serde_json::from_str(r#"{"projects": 10}"#).unwrap();
        assert_eq!(limits.projects, 10);
        assert_eq!(limits.team_members, 2);
        assert_eq!(limits.homeowners, 5);
    }

    #[test]
    fn unlimited_serializes_as_negative_one() {
        let enterprise = default_plans().pop().unwrap();
        let json = serde_json::to_value(enterprise.limits).unwrap();
        assert_eq!(json, serde_json::json!({"projects": -1, "team_members": -1, "homeowners": -1}));
    }

    #[test]
    fn catalogue_is_ordered_and_unique() {
        let plans = default_plans();
        let slugs: Vec<_> = plans.iter().map(|p| p.slug).collect();
        assert_eq!(slugs, ["free", "starter", "pro", "enterprise"]);
        assert!(plans.windows(2).all(|w| w[0].sort_order < w[1].sort_order));
        assert_eq!(plans[0].limits, PlanLimits::default());
    }
}
