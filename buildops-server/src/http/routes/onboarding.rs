//! `onboarding.*` procedures: the post-signup setup wizard
//!
//! Each step stores its answers on the tenant row (advancing the step) and
//! mirrors them into the cached draft, so a half-finished wizard survives a
//! reload even before the row catches up.

use std::sync::Arc;

use axum::extract::State;
use axum::{routing::post, Json, Router};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::Success;
use crate::auth::Session;
use crate::db::repos::{BillingRepo, InvitationRepo, TenantPatch, TenantRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{Authed, Input};
use crate::models::onboarding::{company_size, MAX_TEAM_INVITES};
use crate::models::{
    optional_url, DisplayName, Email, HexColor, OnboardingState, OnboardingStep, UserRole,
    ValidationError,
};
use crate::state::AppState;

const INVITABLE: &[UserRole] = &[UserRole::Admin, UserRole::Member];
const MAX_INTEGRATIONS: usize = 20;

#[derive(Debug, Serialize)]
pub struct NextStep {
    pub next_step: OnboardingStep,
}

/// Persist a step's answers, then mirror them into the draft.
async fn save_step(
    state: &AppState,
    session: &Session,
    step: OnboardingStep,
    payload: Value,
) -> Result<Json<NextStep>, ApiError> {
    let tenant_id = session.tenant.id;
    let next_step = TenantRepo::new(&state.pool)
        .save_onboarding_step(tenant_id, step, payload.clone())
        .await?;

    let mut draft = Map::new();
    draft.insert(step.data_key().to_owned(), payload);
    if let Err(e) = state.onboarding_drafts().update(tenant_id, draft).await {
        tracing::warn!(error = %e, tenant = %tenant_id, step = %step, "onboarding draft not cached");
    }

    tracing::debug!(tenant = %tenant_id, saved = %step, next = %next_step, "onboarding step saved");
    Ok(Json(NextStep { next_step }))
}

async fn clear_draft(state: &AppState, tenant_id: Uuid) {
    if let Err(e) = state.onboarding_drafts().delete(tenant_id).await {
        tracing::warn!(error = %e, tenant = %tenant_id, "onboarding draft not cleared");
    }
}

/// POST /rpc/onboarding.get_state
async fn get_state(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
) -> Result<Json<OnboardingState>, ApiError> {
    let tenant = TenantRepo::new(&state.pool).get(session.tenant.id).await?;
    let draft = match state.onboarding_drafts().get(tenant.id).await {
        Ok(draft) => draft,
        Err(e) => {
            tracing::warn!(error = %e, "onboarding draft unreadable, using stored data");
            None
        }
    };
    Ok(Json(OnboardingState::new(
        tenant.onboarding_step,
        tenant.onboarding_data,
        draft,
    )))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyInput {
    pub name: String,
    pub industry: Option<String>,
    pub size: Option<String>,
    pub website: Option<String>,
}

impl CompanyInput {
    fn validate(self) -> Result<Self, ValidationError> {
        Ok(Self {
            name: DisplayName::new("company name", &self.name)?.into_string(),
            industry: self
                .industry
                .map(|i| i.trim().to_owned())
                .filter(|i| !i.is_empty()),
            size: self.size.as_deref().map(company_size).transpose()?,
            website: optional_url("website", self.website.as_deref())?,
        })
    }
}

/// POST /rpc/onboarding.update_company
async fn update_company(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<CompanyInput>,
) -> Result<Json<NextStep>, ApiError> {
    let company = input.validate()?;
    TenantRepo::new(&state.pool)
        .update(
            session.tenant.id,
            TenantPatch {
                name: Some(company.name.clone()),
                ..Default::default()
            },
        )
        .await?;
    save_step(&state, &session, OnboardingStep::Company, json!(company)).await
}

#[derive(Debug, Deserialize)]
pub struct TeamInvite {
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, Default, Deserialize)]
pub struct TeamInput {
    #[serde(default)]
    pub invites: Vec<TeamInvite>,
}

impl TeamInput {
    fn validate(self) -> Result<Vec<(String, UserRole)>, ValidationError> {
        if self.invites.len() > MAX_TEAM_INVITES {
            return Err(ValidationError::TooLong {
                field: "invites",
                max: MAX_TEAM_INVITES,
            });
        }
        self.invites
            .into_iter()
            .map(|invite| {
                if !INVITABLE.contains(&invite.role) {
                    return Err(ValidationError::InvalidVariant {
                        field: "role",
                        value: invite.role.to_string(),
                    });
                }
                Ok((Email::new(&invite.email)?.into_string(), invite.role))
            })
            .collect()
    }
}

/// POST /rpc/onboarding.update_team
async fn update_team(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<TeamInput>,
) -> Result<Json<NextStep>, ApiError> {
    let invites = input.validate()?;
    if !invites.is_empty() {
        InvitationRepo::new(&state.pool)
            .create_many(
                session.tenant.id,
                &invites,
                session.user.id,
                Duration::days(state.config.auth.invitation_ttl_days),
            )
            .await?;
        tracing::info!(tenant = %session.tenant.slug, count = invites.len(), "onboarding invitations created");
    }
    save_step(
        &state,
        &session,
        OnboardingStep::Team,
        json!({ "invite_count": invites.len() }),
    )
    .await
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrandingInput {
    pub logo: Option<String>,
    pub brand_color: Option<String>,
}

impl BrandingInput {
    fn validate(self) -> Result<Self, ValidationError> {
        Ok(Self {
            logo: optional_url("logo", self.logo.as_deref())?,
            brand_color: self
                .brand_color
                .as_deref()
                .map(|c| HexColor::new(c.trim()).map(HexColor::into_string))
                .transpose()?,
        })
    }
}

/// POST /rpc/onboarding.update_branding
async fn update_branding(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<BrandingInput>,
) -> Result<Json<NextStep>, ApiError> {
    let branding = input.validate()?;
    let settings = branding
        .brand_color
        .as_ref()
        .map(|color| json!({ "brand_color": color }));
    TenantRepo::new(&state.pool)
        .update(
            session.tenant.id,
            TenantPatch {
                logo: Some(branding.logo.clone()),
                settings,
                ..Default::default()
            },
        )
        .await?;
    save_step(&state, &session, OnboardingStep::Branding, json!(branding)).await
}

#[derive(Debug, Default, Deserialize)]
pub struct IntegrationsInput {
    #[serde(default)]
    pub integrations: Vec<String>,
}

impl IntegrationsInput {
    fn validate(self) -> Result<Vec<String>, ValidationError> {
        if self.integrations.len() > MAX_INTEGRATIONS {
            return Err(ValidationError::TooLong {
                field: "integrations",
                max: MAX_INTEGRATIONS,
            });
        }
        let mut names: Vec<String> = self
            .integrations
            .iter()
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}

/// POST /rpc/onboarding.update_integrations
async fn update_integrations(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<IntegrationsInput>,
) -> Result<Json<NextStep>, ApiError> {
    let integrations = input.validate()?;
    save_step(&state, &session, OnboardingStep::Integrations, json!(integrations)).await
}

#[derive(Debug, Deserialize)]
pub struct BillingInput {
    pub plan_id: Uuid,
}

/// POST /rpc/onboarding.update_billing
async fn update_billing(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<BillingInput>,
) -> Result<Json<NextStep>, ApiError> {
    let tenant_id = session.tenant.id;
    let plan = BillingRepo::new(&state.pool).plan(input.plan_id).await?;

    let tenants = TenantRepo::new(&state.pool);
    tenants.set_plan(tenant_id, &plan.slug).await?;
    let next_step = tenants
        .save_onboarding_step(
            tenant_id,
            OnboardingStep::Billing,
            json!({ "plan_id": plan.id, "plan": plan.slug }),
        )
        .await?;
    clear_draft(&state, tenant_id).await;

    tracing::info!(tenant = %session.tenant.slug, plan = %plan.slug, "onboarding plan selected");
    Ok(Json(NextStep { next_step }))
}

/// POST /rpc/onboarding.skip
async fn skip(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
) -> Result<Json<Success>, ApiError> {
    TenantRepo::new(&state.pool)
        .skip_onboarding(session.tenant.id)
        .await?;
    clear_draft(&state, session.tenant.id).await;
    Ok(Json(Success::ok()))
}

/// Onboarding routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rpc/onboarding.get_state", post(get_state))
        .route("/rpc/onboarding.update_company", post(update_company))
        .route("/rpc/onboarding.update_team", post(update_team))
        .route("/rpc/onboarding.update_branding", post(update_branding))
        .route("/rpc/onboarding.update_integrations", post(update_integrations))
        .route("/rpc/onboarding.update_billing", post(update_billing))
        .route("/rpc/onboarding.skip", post(skip))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn company_validated() {
        let company: CompanyInput = serde_json::from_str(
            r#"{"name": " Acme Builders ", "size": "11-50", "website": "", "industry": "  "}"#,
        )
        .unwrap();
        let company = company.validate().unwrap();
        assert_eq!(company.name, "Acme Builders");
        assert_eq!(company.size.as_deref(), Some("11-50"));
        assert_eq!(company.website, None);
        assert_eq!(company.industry, None);
    }

    #[test]
    fn company_size_must_be_a_bucket() {
        let company: CompanyInput =
            serde_json::from_str(r#"{"name": "Acme", "size": "12"}"#).unwrap();
        assert!(company.validate().is_err());
    }

    #[test]
    fn team_invites_capped_and_role_limited() {
        let invites: Vec<Value> = (0..11)
            .map(|i| json!({"email": format!("crew{i}@acme.test"), "role": "member"}))
            .collect();
        let team: TeamInput = serde_json::from_value(json!({ "invites": invites })).unwrap();
        assert!(matches!(team.validate(), Err(ValidationError::TooLong { .. })));

        let team: TeamInput = serde_json::from_value(json!({
            "invites": [{"email": "boss@acme.test", "role": "owner"}]
        }))
        .unwrap();
        assert!(matches!(team.validate(), Err(ValidationError::InvalidVariant { .. })));
    }

    #[test]
    fn team_emails_normalised() {
        let team: TeamInput = serde_json::from_value(json!({
            "invites": [{"email": "Foreman@Acme.TEST", "role": "admin"}]
        }))
        .unwrap();
        assert_eq!(
            team.validate().unwrap(),
            vec![("foreman@acme.test".to_owned(), UserRole::Admin)]
        );
        assert!(TeamInput::default().validate().unwrap().is_empty());
    }

    #[test]
    fn branding_colour_checked() {
        let ok = BrandingInput {
            logo: Some("https://cdn.acme.test/logo.png".into()),
            brand_color: Some("#1A2B3C".into()),
        };
        assert!(ok.validate().is_ok());
        let bad = BrandingInput {
            brand_color: Some("blue".into()),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn integrations_deduplicated() {
        let input = IntegrationsInput {
            integrations: vec!["QuickBooks".into(), "quickbooks".into(), " ".into(), "twilio".into()],
        };
        assert_eq!(input.validate().unwrap(), vec!["quickbooks", "twilio"]);
    }
}
