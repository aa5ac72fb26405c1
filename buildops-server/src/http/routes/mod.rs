//! Procedure handlers organized by namespace
//!
//! Every procedure is `POST /rpc/<namespace>.<procedure>` with a JSON body.

pub mod auth;
pub mod billing;
pub mod clients;
pub mod communications;
pub mod dashboard;
pub mod health;
pub mod homeowners;
pub mod invoices;
pub mod onboarding;
pub mod projects;
pub mod subcontractors;
pub mod tasks;
pub mod tenants;
pub mod trades;
pub mod users;

use std::sync::Arc;

use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Session;
use crate::db::repos::{
    ActivityRepo, HomeownerRepo, NewActivity, ProjectRepo, SubcontractorRepo, UserRepo,
};
use crate::http::error::ApiError;
use crate::state::AppState;

/// All procedure namespaces
pub fn rpc_router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(auth::router())
        .merge(tenants::router())
        .merge(users::router())
        .merge(homeowners::router())
        .merge(clients::router())
        .merge(projects::router())
        .merge(tasks::router())
        .merge(communications::router())
        .merge(subcontractors::router())
        .merge(trades::router())
        .merge(invoices::router())
        .merge(billing::router())
        .merge(onboarding::router())
        .merge(dashboard::router())
}

/// `{ "id": ... }`
#[derive(Debug, Deserialize)]
pub struct IdInput {
    pub id: Uuid,
}

/// `{ "id": ..., "data": { ...partial fields } }`
#[derive(Debug, Deserialize)]
pub struct UpdateInput<T> {
    pub id: Uuid,
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct Success {
    pub success: bool,
}

impl Success {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Append `<entity>.<verb>` to the workspace activity log.
pub(crate) async fn log_activity(
    state: &AppState,
    session: &Session,
    entity_type: &'static str,
    verb: &str,
    entity_id: Uuid,
) {
    ActivityRepo::new(&state.pool)
        .record(NewActivity::new(
            session.tenant.id,
            session.user.id,
            entity_type,
            verb,
            entity_id,
        ))
        .await;
}

/// Row ids an input points at; each must belong to the caller's workspace.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Refs {
    pub homeowner: Option<Uuid>,
    pub project: Option<Uuid>,
    pub subcontractor: Option<Uuid>,
    pub user: Option<Uuid>,
}

impl Refs {
    /// A reference into another workspace reads as not found.
    pub(crate) async fn check(self, state: &AppState, tenant_id: Uuid) -> Result<(), ApiError> {
        let pool = &state.pool;
        let missing = |resource: &str, id: Uuid| ApiError::not_found(format!("{resource} '{id}' not found"));

        if let Some(id) = self.homeowner {
            if !HomeownerRepo::new(pool).exists(tenant_id, id).await? {
                return Err(missing("homeowner", id));
            }
        }
        if let Some(id) = self.project {
            if !ProjectRepo::new(pool).exists(tenant_id, id).await? {
                return Err(missing("project", id));
            }
        }
        if let Some(id) = self.subcontractor {
            if !SubcontractorRepo::new(pool).exists(tenant_id, id).await? {
                return Err(missing("subcontractor", id));
            }
        }
        if let Some(id) = self.user {
            UserRepo::new(pool).get(tenant_id, id).await?;
        }
        Ok(())
    }
}
