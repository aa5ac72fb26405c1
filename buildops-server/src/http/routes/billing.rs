//! `billing.*` procedures: plan catalogue and the workspace subscription
//!
//! No payment provider is wired in. Checkout and portal sessions hand back
//! placeholder URLs once the preconditions a real provider would need hold.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::{routing::post, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Success;
use crate::db::repos::{BillingRepo, DbError, PlanRecord};
use crate::http::error::ApiError;
use crate::http::extractors::{Authed, Input, OwnerOnly};
use crate::models::SubscriptionStatus;
use crate::state::AppState;

/// Cache keys owned by the plan catalogue
pub const PLANS_CACHE_PREFIX: &str = "plans:";
const ACTIVE_PLANS_KEY: &str = "plans:active";
const PLANS_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

const CHECKOUT_URL: &str = "https://checkout.stripe.com/placeholder";
const PORTAL_URL: &str = "https://billing.stripe.com/placeholder";

/// Active plans, served from the JSON cache when warm.
async fn active_plans(state: &AppState) -> Result<Vec<PlanRecord>, DbError> {
    let cache = state.cache();
    match cache.get::<Vec<PlanRecord>>(ACTIVE_PLANS_KEY).await {
        Ok(Some(plans)) => return Ok(plans),
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "plan cache read failed"),
    }

    let plans = BillingRepo::new(&state.pool).active_plans().await?;
    if let Err(e) = cache.set(ACTIVE_PLANS_KEY, &plans, PLANS_CACHE_TTL).await {
        tracing::warn!(error = %e, "plan cache write failed");
    }
    Ok(plans)
}

/// POST /rpc/billing.get_plans
async fn get_plans(
    State(state): State<Arc<AppState>>,
    Authed(_session): Authed,
) -> Result<Json<Vec<PlanRecord>>, ApiError> {
    Ok(Json(active_plans(&state).await?))
}

#[derive(Debug, Serialize)]
pub struct PlanRef {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionView {
    pub id: Uuid,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub plan: Option<PlanRef>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionSummary {
    pub subscription: Option<SubscriptionView>,
    pub current_plan: String,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub is_trialing: bool,
}

fn is_trialing(trial_ends_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    trial_ends_at.is_some_and(|end| end > now)
}

/// POST /rpc/billing.get_subscription
async fn get_subscription(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
) -> Result<Json<SubscriptionSummary>, ApiError> {
    let billing = BillingRepo::new(&state.pool);
    let subscription = match billing.subscription(session.tenant.id).await? {
        Some(sub) => {
            let plan = match billing.plan(sub.plan_id).await {
                Ok(plan) => Some(PlanRef {
                    id: plan.id,
                    name: plan.name,
                    slug: plan.slug,
                }),
                Err(DbError::NotFound { .. }) => None,
                Err(e) => return Err(e.into()),
            };
            Some(SubscriptionView {
                id: sub.id,
                status: sub.status,
                current_period_end: sub.current_period_end,
                cancel_at_period_end: sub.cancel_at_period_end,
                plan,
            })
        }
        None => None,
    };

    let tenant = &session.tenant;
    Ok(Json(SubscriptionSummary {
        subscription,
        current_plan: tenant.plan.clone(),
        trial_ends_at: tenant.trial_ends_at,
        is_trialing: is_trialing(tenant.trial_ends_at, Utc::now()),
    }))
}

#[derive(Debug, Deserialize)]
pub struct CheckoutInput {
    pub plan_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CheckoutSession {
    pub checkout_url: String,
}

/// POST /rpc/billing.create_checkout
async fn create_checkout(
    State(state): State<Arc<AppState>>,
    OwnerOnly(session): OwnerOnly,
    Input(input): Input<CheckoutInput>,
) -> Result<Json<CheckoutSession>, ApiError> {
    let unavailable = || ApiError::not_found("Plan not found or not available for purchase");
    let plan = match BillingRepo::new(&state.pool).plan(input.plan_id).await {
        Ok(plan) => plan,
        Err(DbError::NotFound { .. }) => return Err(unavailable()),
        Err(e) => return Err(e.into()),
    };
    if plan.stripe_price_id.is_none() {
        return Err(unavailable());
    }

    tracing::info!(tenant = %session.tenant.slug, plan = %plan.slug, "checkout requested");
    Ok(Json(CheckoutSession {
        checkout_url: format!("{CHECKOUT_URL}?plan={}", urlencoding::encode(&plan.slug)),
    }))
}

#[derive(Debug, Serialize)]
pub struct PortalSession {
    pub portal_url: String,
}

/// POST /rpc/billing.create_portal_session
async fn create_portal_session(
    State(state): State<Arc<AppState>>,
    OwnerOnly(session): OwnerOnly,
) -> Result<Json<PortalSession>, ApiError> {
    let subscription = BillingRepo::new(&state.pool)
        .subscription(session.tenant.id)
        .await?;
    if subscription.and_then(|s| s.stripe_customer_id).is_none() {
        return Err(ApiError::bad_request(
            "No billing account found. Please subscribe to a plan first.",
        ));
    }
    Ok(Json(PortalSession {
        portal_url: PORTAL_URL.to_owned(),
    }))
}

/// POST /rpc/billing.cancel_subscription
async fn cancel_subscription(
    State(state): State<Arc<AppState>>,
    OwnerOnly(session): OwnerOnly,
) -> Result<Json<Success>, ApiError> {
    let billing = BillingRepo::new(&state.pool);
    if billing.subscription(session.tenant.id).await?.is_none() {
        return Err(ApiError::not_found("No active subscription found"));
    }
    billing
        .set_cancel_at_period_end(session.tenant.id, true)
        .await?;
    tracing::info!(tenant = %session.tenant.slug, "subscription set to cancel at period end");
    Ok(Json(Success::ok()))
}

/// POST /rpc/billing.resume_subscription
async fn resume_subscription(
    State(state): State<Arc<AppState>>,
    OwnerOnly(session): OwnerOnly,
) -> Result<Json<Success>, ApiError> {
    let billing = BillingRepo::new(&state.pool);
    let pending = billing
        .subscription(session.tenant.id)
        .await?
        .is_some_and(|s| s.cancel_at_period_end);
    if !pending {
        return Err(ApiError::bad_request("No subscription pending cancellation"));
    }
    billing
        .set_cancel_at_period_end(session.tenant.id, false)
        .await?;
    Ok(Json(Success::ok()))
}

/// Billing routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rpc/billing.get_plans", post(get_plans))
        .route("/rpc/billing.get_subscription", post(get_subscription))
        .route("/rpc/billing.create_checkout", post(create_checkout))
        .route("/rpc/billing.create_portal_session", post(create_portal_session))
        .route("/rpc/billing.cancel_subscription", post(cancel_subscription))
        .route("/rpc/billing.resume_subscription", post(resume_subscription))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn trial_is_active_until_end() {
        let now = Utc::now();
        assert!(is_trialing(Some(now + ChronoDuration::days(3)), now));
        assert!(!is_trialing(Some(now - ChronoDuration::seconds(1)), now));
        assert!(!is_trialing(None, now));
    }

    #[test]
    fn active_plans_key_is_under_prefix() {
        assert!(ACTIVE_PLANS_KEY.starts_with(PLANS_CACHE_PREFIX));
    }

    #[test]
    fn cached_plans_omit_price_ids() {
        let plan = PlanRecord {
            id: Uuid::nil(),
            name: "Pro".into(),
            slug: "pro".into(),
            description: None,
            price_cents: 14_900,
            currency: "usd".into(),
            interval: "month".into(),
            features: sqlx::types::Json(vec!["API access".into()]),
            limits: sqlx::types::Json(Default::default()),
            is_active: true,
            sort_order: 2,
            stripe_price_id: Some("price_123".into()),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&plan).unwrap();
        assert!(!json.contains("price_123"));
        let back: PlanRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.slug, "pro");
        assert!(back.stripe_price_id.is_none());
    }
}
