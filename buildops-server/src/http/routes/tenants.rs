//! `tenants.*` procedures: the caller's workspace

use std::sync::Arc;

use axum::extract::State;
use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::db::repos::{BillingRepo, PlanLimits, TenantPatch, TenantRecord, TenantRepo, TenantUsage};
use crate::http::error::ApiError;
use crate::http::extractors::{Authed, Input, OwnerOnly};
use crate::models::{bounded_text, double_option, optional_name, optional_url, HexColor, ValidationError};
use crate::state::AppState;

/// POST /rpc/tenants.current
async fn current(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
) -> Result<Json<TenantRecord>, ApiError> {
    let tenant = TenantRepo::new(&state.pool).get(session.tenant.id).await?;
    Ok(Json(tenant))
}

#[derive(Debug, Default, Deserialize)]
pub struct SettingsInput {
    pub brand_color: Option<String>,
    pub timezone: Option<String>,
    pub locale: Option<String>,
    pub date_format: Option<String>,
    pub currency: Option<String>,
}

impl SettingsInput {
    /// Validated settings as a JSON object holding only the supplied keys.
    fn into_object(self) -> Result<Map<String, Value>, ValidationError> {
        let mut map = Map::new();
        if let Some(color) = self.brand_color {
            map.insert("brand_color".into(), HexColor::new(&color)?.into_string().into());
        }
        let texts = [
            ("timezone", self.timezone),
            ("locale", self.locale),
            ("date_format", self.date_format),
            ("currency", self.currency),
        ];
        for (key, value) in texts {
            if let Some(value) = value {
                map.insert(key.into(), bounded_text(key, &value, 1, 64)?.into());
            }
        }
        Ok(map)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTenantInput {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub domain: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub logo: Option<Option<String>>,
    pub settings: Option<SettingsInput>,
}

fn nullable_url(
    field: &'static str,
    value: Option<Option<String>>,
) -> Result<Option<Option<String>>, ValidationError> {
    value
        .map(|inner| optional_url(field, inner.as_deref()))
        .transpose()
}

/// POST /rpc/tenants.update
async fn update(
    State(state): State<Arc<AppState>>,
    OwnerOnly(session): OwnerOnly,
    Input(input): Input<UpdateTenantInput>,
) -> Result<Json<TenantRecord>, ApiError> {
    let settings = input
        .settings
        .map(SettingsInput::into_object)
        .transpose()?
        .filter(|m| !m.is_empty())
        .map(Value::Object);

    let patch = TenantPatch {
        name: optional_name("workspace name", input.name.as_deref())?,
        domain: nullable_url("domain", input.domain)?,
        logo: nullable_url("logo", input.logo)?,
        settings,
    };
    let tenant = TenantRepo::new(&state.pool)
        .update(session.tenant.id, patch)
        .await?;
    tracing::info!(tenant_id = %tenant.id, "workspace updated");
    Ok(Json(tenant))
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub plan: String,
    pub usage: TenantUsage,
    pub limits: PlanLimits,
}

/// POST /rpc/tenants.usage
async fn usage(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
) -> Result<Json<UsageResponse>, ApiError> {
    let usage = TenantRepo::new(&state.pool).usage(session.tenant.id).await?;
    let limits = BillingRepo::new(&state.pool)
        .limits_for(&session.tenant.plan)
        .await?;
    Ok(Json(UsageResponse {
        plan: session.tenant.plan,
        usage,
        limits,
    }))
}

/// Tenant routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rpc/tenants.current", post(current))
        .route("/rpc/tenants.update", post(update))
        .route("/rpc/tenants.usage", post(usage))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_keep_only_supplied_keys() {
        let input: SettingsInput =
            serde_json::from_str(r##"{"brand_color": "#112233", "timezone": "America/Denver"}"##)
                .unwrap();
        let map = input.into_object().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["brand_color"], "#112233");
    }

    #[test]
    fn bad_brand_color_rejected() {
        let input = SettingsInput {
            brand_color: Some("red".into()),
            ..Default::default()
        };
        assert!(input.into_object().is_err());
    }

    #[test]
    fn logo_can_be_cleared() {
        let input: UpdateTenantInput = serde_json::from_str(r#"{"logo": null}"#).unwrap();
        assert_eq!(nullable_url("logo", input.logo).unwrap(), Some(None));
        assert_eq!(nullable_url("domain", input.domain).unwrap(), None);
    }
}
