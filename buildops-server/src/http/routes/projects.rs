//! `projects.*` procedures

use std::sync::Arc;

use axum::extract::State;
use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{log_activity, IdInput, Refs, Success, UpdateInput};
use crate::db::repos::projects::{NewProject, ProjectPatch, ProjectStats};
use crate::db::repos::{
    ProjectFilter, ProjectRecord, ProjectRepo, ProjectWithHomeowner, TaskRecord, TaskRepo,
};
use crate::http::error::ApiError;
use crate::http::extractors::{Authed, Input};
use crate::models::{
    non_negative_cents, optional_name, DisplayName, Paginated, PaginationParams, ProjectStatus,
    ValidationError,
};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListInput {
    #[serde(flatten)]
    pub page: PaginationParams,
    pub status: Option<ProjectStatus>,
    pub homeowner_id: Option<Uuid>,
    pub search: Option<String>,
}

/// POST /rpc/projects.list
async fn list(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<ListInput>,
) -> Result<Json<Paginated<ProjectWithHomeowner>>, ApiError> {
    let filter = ProjectFilter {
        status: input.status,
        homeowner_id: input.homeowner_id,
        search: input.search,
    };
    let page = ProjectRepo::new(&state.pool)
        .list(session.tenant.id, filter, input.page.into())
        .await?;
    Ok(Json(page))
}

#[derive(Debug, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: ProjectWithHomeowner,
    pub tasks: Vec<TaskRecord>,
}

/// POST /rpc/projects.get
async fn get(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<IdInput>,
) -> Result<Json<ProjectDetail>, ApiError> {
    let project = ProjectRepo::new(&state.pool)
        .get(session.tenant.id, input.id)
        .await?;
    let tasks = TaskRepo::new(&state.pool)
        .for_project(session.tenant.id, project.project.id)
        .await?;
    Ok(Json(ProjectDetail { project, tasks }))
}

fn check_amount(cents: Option<i64>) -> Result<Option<i64>, ValidationError> {
    cents
        .map(|c| non_negative_cents("contract amount", c))
        .transpose()
}

/// POST /rpc/projects.create
async fn create(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<NewProject>,
) -> Result<Json<ProjectRecord>, ApiError> {
    let new = NewProject {
        name: DisplayName::new("project name", &input.name)?.into_string(),
        contract_amount_cents: check_amount(input.contract_amount_cents)?,
        ..input
    };
    Refs {
        homeowner: new.homeowner_id,
        ..Default::default()
    }
    .check(&state, session.tenant.id)
    .await?;

    let project = ProjectRepo::new(&state.pool)
        .create(session.tenant.id, new)
        .await?;
    log_activity(&state, &session, "project", "created", project.id).await;
    Ok(Json(project))
}

/// POST /rpc/projects.update
async fn update(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<UpdateInput<ProjectPatch>>,
) -> Result<Json<ProjectRecord>, ApiError> {
    let data = input.data;
    let patch = ProjectPatch {
        name: optional_name("project name", data.name.as_deref())?,
        contract_amount_cents: data
            .contract_amount_cents
            .map(check_amount)
            .transpose()?,
        ..data
    };
    Refs {
        homeowner: patch.homeowner_id.flatten(),
        ..Default::default()
    }
    .check(&state, session.tenant.id)
    .await?;

    let project = ProjectRepo::new(&state.pool)
        .update(session.tenant.id, input.id, patch)
        .await?;
    log_activity(&state, &session, "project", "updated", project.id).await;
    Ok(Json(project))
}

/// POST /rpc/projects.delete
async fn delete(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<IdInput>,
) -> Result<Json<Success>, ApiError> {
    ProjectRepo::new(&state.pool)
        .delete(session.tenant.id, input.id)
        .await?;
    log_activity(&state, &session, "project", "deleted", input.id).await;
    Ok(Json(Success::ok()))
}

/// POST /rpc/projects.stats
async fn stats(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<IdInput>,
) -> Result<Json<ProjectStats>, ApiError> {
    let stats = ProjectRepo::new(&state.pool)
        .stats(session.tenant.id, input.id)
        .await?;
    Ok(Json(stats))
}

/// Project routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rpc/projects.list", post(list))
        .route("/rpc/projects.get", post(get))
        .route("/rpc/projects.create", post(create))
        .route("/rpc/projects.update", post(update))
        .route("/rpc/projects.delete", post(delete))
        .route("/rpc/projects.stats", post(stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_contract_amount_rejected() {
        assert!(check_amount(Some(-1)).is_err());
        assert_eq!(check_amount(Some(0)).unwrap(), Some(0));
        assert_eq!(check_amount(None).unwrap(), None);
    }

    #[test]
    fn update_input_shape() {
        let input: UpdateInput<ProjectPatch> = serde_json::from_str(
            r#"{"id": "00000000-0000-0000-0000-000000000001",
                "data": {"status": "completed", "homeowner_id": null}}"#,
        )
        .unwrap();
        assert_eq!(input.data.status, Some(ProjectStatus::Completed));
        assert_eq!(input.data.homeowner_id, Some(None));
    }
}
