//! `homeowners.*` procedures

use std::sync::Arc;

use axum::extract::State;
use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use super::{log_activity, IdInput, Success, UpdateInput};
use crate::db::repos::homeowners::{HomeownerPatch, HomeownerStats, NewHomeowner};
use crate::db::repos::{
    CommunicationRecord, CommunicationRepo, HomeownerFilter, HomeownerRecord, HomeownerRepo,
    HomeownerWithCount, InvoiceRecord, InvoiceRepo, ProjectRecord, ProjectRepo,
};
use crate::http::error::ApiError;
use crate::http::extractors::{Authed, Input};
use crate::models::{
    optional_email, optional_name, DisplayName, HomeownerStatus, Paginated, PaginationParams,
    ValidationError,
};
use crate::state::AppState;

const RECENT_LIMIT: i64 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct ListInput {
    #[serde(flatten)]
    pub page: PaginationParams,
    pub status: Option<HomeownerStatus>,
    pub search: Option<String>,
}

/// POST /rpc/homeowners.list
async fn list(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<ListInput>,
) -> Result<Json<Paginated<HomeownerWithCount>>, ApiError> {
    let filter = HomeownerFilter {
        status: input.status,
        search: input.search,
    };
    let page = HomeownerRepo::new(&state.pool)
        .list(session.tenant.id, filter, input.page.into())
        .await?;
    Ok(Json(page))
}

/// Homeowner with projects, recent communications and invoices
#[derive(Debug, Serialize)]
pub struct HomeownerDetail {
    #[serde(flatten)]
    pub homeowner: HomeownerRecord,
    pub projects: Vec<ProjectRecord>,
    pub communications: Vec<CommunicationRecord>,
    pub invoices: Vec<InvoiceRecord>,
}

/// POST /rpc/homeowners.get
async fn get(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<IdInput>,
) -> Result<Json<HomeownerDetail>, ApiError> {
    let tenant_id = session.tenant.id;
    let homeowner = HomeownerRepo::new(&state.pool).get(tenant_id, input.id).await?;

    let projects = ProjectRepo::new(&state.pool);
    let communications = CommunicationRepo::new(&state.pool);
    let invoices = InvoiceRepo::new(&state.pool);
    let (projects, communications, invoices) = tokio::try_join!(
        projects.for_homeowner(tenant_id, homeowner.id),
        communications.recent_for_homeowner(tenant_id, homeowner.id, RECENT_LIMIT),
        invoices.recent_for_homeowner(tenant_id, homeowner.id, RECENT_LIMIT),
    )?;

    Ok(Json(HomeownerDetail {
        homeowner,
        projects,
        communications,
        invoices,
    }))
}

fn validate_new(new: NewHomeowner) -> Result<NewHomeowner, ValidationError> {
    Ok(NewHomeowner {
        first_name: DisplayName::new("first name", &new.first_name)?.into_string(),
        last_name: DisplayName::new("last name", &new.last_name)?.into_string(),
        email: optional_email(new.email.as_deref())?,
        ..new
    })
}

fn validate_patch(patch: HomeownerPatch) -> Result<HomeownerPatch, ValidationError> {
    Ok(HomeownerPatch {
        first_name: optional_name("first name", patch.first_name.as_deref())?,
        last_name: optional_name("last name", patch.last_name.as_deref())?,
        email: patch
            .email
            .map(|e| optional_email(e.as_deref()))
            .transpose()?,
        ..patch
    })
}

/// POST /rpc/homeowners.create
async fn create(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<NewHomeowner>,
) -> Result<Json<HomeownerRecord>, ApiError> {
    let homeowner = HomeownerRepo::new(&state.pool)
        .create(session.tenant.id, validate_new(input)?)
        .await?;
    log_activity(&state, &session, "homeowner", "created", homeowner.id).await;
    Ok(Json(homeowner))
}

/// POST /rpc/homeowners.update
async fn update(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<UpdateInput<HomeownerPatch>>,
) -> Result<Json<HomeownerRecord>, ApiError> {
    let homeowner = HomeownerRepo::new(&state.pool)
        .update(session.tenant.id, input.id, validate_patch(input.data)?)
        .await?;
    log_activity(&state, &session, "homeowner", "updated", homeowner.id).await;
    Ok(Json(homeowner))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusInput {
    pub id: uuid::Uuid,
    pub status: HomeownerStatus,
}

/// POST /rpc/homeowners.update_status
async fn update_status(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<UpdateStatusInput>,
) -> Result<Json<HomeownerRecord>, ApiError> {
    let homeowner = HomeownerRepo::new(&state.pool)
        .update_status(session.tenant.id, input.id, input.status)
        .await?;
    log_activity(&state, &session, "homeowner", "status_changed", homeowner.id).await;
    Ok(Json(homeowner))
}

/// POST /rpc/homeowners.delete
async fn delete(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<IdInput>,
) -> Result<Json<Success>, ApiError> {
    HomeownerRepo::new(&state.pool)
        .delete(session.tenant.id, input.id)
        .await?;
    log_activity(&state, &session, "homeowner", "deleted", input.id).await;
    Ok(Json(Success::ok()))
}

/// POST /rpc/homeowners.stats
async fn stats(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<IdInput>,
) -> Result<Json<HomeownerStats>, ApiError> {
    let stats = HomeownerRepo::new(&state.pool)
        .stats(session.tenant.id, input.id)
        .await?;
    Ok(Json(stats))
}

/// Homeowner routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rpc/homeowners.list", post(list))
        .route("/rpc/homeowners.get", post(get))
        .route("/rpc/homeowners.create", post(create))
        .route("/rpc/homeowners.update", post(update))
        .route("/rpc/homeowners.update_status", post(update_status))
        .route("/rpc/homeowners.delete", post(delete))
        .route("/rpc/homeowners.stats", post(stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_input_flattens_pagination() {
        let input: ListInput =
            serde_json::from_str(r#"{"page": 2, "status": "punch_list", "search": "ada"}"#)
                .unwrap();
        assert_eq!(input.page.page, Some(2));
        assert_eq!(input.status, Some(HomeownerStatus::PunchList));
    }

    #[test]
    fn new_homeowner_names_trimmed_and_email_normalised() {
        let new = validate_new(NewHomeowner {
            first_name: "  Ada ".into(),
            last_name: "Lovelace".into(),
            email: Some("Ada@Example.COM".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(new.first_name, "Ada");
        assert_eq!(new.email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn blank_email_clears_in_patch() {
        let patch: HomeownerPatch = serde_json::from_str(r#"{"email": ""}"#).unwrap();
        let patch = validate_patch(patch).unwrap();
        assert_eq!(patch.email, Some(None));
    }

    #[test]
    fn short_name_rejected() {
        let result = validate_new(NewHomeowner {
            first_name: "A".into(),
            last_name: "Lovelace".into(),
            ..Default::default()
        });
        assert!(matches!(result, Err(ValidationError::TooShort { .. })));
    }
}
