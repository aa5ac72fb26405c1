//! `tasks.*` procedures

use std::sync::Arc;

use axum::extract::State;
use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{log_activity, IdInput, Refs, Success, UpdateInput};
use crate::db::repos::tasks::{NewTask, TaskPatch};
use crate::db::repos::{TaskFilter, TaskRecord, TaskRepo, TaskWithRefs};
use crate::http::error::ApiError;
use crate::http::extractors::{Authed, Input};
use crate::models::{
    in_range, optional_name, DisplayName, Paginated, PaginationParams, TaskPriority, TaskStatus,
    ValidationError,
};
use crate::state::AppState;

const TASK_PAGE_SIZE: u32 = 50;
const MAX_HOURS: f64 = 10_000.0;

fn check_hours(field: &'static str, hours: Option<f64>) -> Result<Option<f64>, ValidationError> {
    hours.map(|h| in_range(field, h, 0.0, MAX_HOURS)).transpose()
}

#[derive(Debug, Default, Deserialize)]
pub struct ListInput {
    #[serde(flatten)]
    pub page: PaginationParams,
    pub project_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub subcontractor_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
}

/// POST /rpc/tasks.list
async fn list(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<ListInput>,
) -> Result<Json<Paginated<TaskWithRefs>>, ApiError> {
    let filter = TaskFilter {
        project_id: input.project_id,
        assignee_id: input.assignee_id,
        subcontractor_id: input.subcontractor_id,
        status: input.status,
        priority: input.priority,
    };
    let page = TaskRepo::new(&state.pool)
        .list(
            session.tenant.id,
            filter,
            input.page.with_default_size(TASK_PAGE_SIZE),
        )
        .await?;
    Ok(Json(page))
}

/// POST /rpc/tasks.get
async fn get(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<IdInput>,
) -> Result<Json<TaskWithRefs>, ApiError> {
    let task = TaskRepo::new(&state.pool)
        .get(session.tenant.id, input.id)
        .await?;
    Ok(Json(task))
}

/// POST /rpc/tasks.create
async fn create(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<NewTask>,
) -> Result<Json<TaskRecord>, ApiError> {
    let new = NewTask {
        title: DisplayName::new("title", &input.title)?.into_string(),
        estimated_hours: check_hours("estimated hours", input.estimated_hours)?,
        ..input
    };
    Refs {
        project: Some(new.project_id),
        subcontractor: new.subcontractor_id,
        user: new.assignee_id,
        ..Default::default()
    }
    .check(&state, session.tenant.id)
    .await?;

    let task = TaskRepo::new(&state.pool).create(new).await?;
    log_activity(&state, &session, "task", "created", task.id).await;
    Ok(Json(task))
}

/// POST /rpc/tasks.update
async fn update(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<UpdateInput<TaskPatch>>,
) -> Result<Json<TaskRecord>, ApiError> {
    let data = input.data;
    let patch = TaskPatch {
        title: optional_name("title", data.title.as_deref())?,
        estimated_hours: data
            .estimated_hours
            .map(|h| check_hours("estimated hours", h))
            .transpose()?,
        actual_hours: data
            .actual_hours
            .map(|h| check_hours("actual hours", h))
            .transpose()?,
        ..data
    };
    Refs {
        subcontractor: patch.subcontractor_id.flatten(),
        user: patch.assignee_id.flatten(),
        ..Default::default()
    }
    .check(&state, session.tenant.id)
    .await?;

    let task = TaskRepo::new(&state.pool)
        .update(session.tenant.id, input.id, patch)
        .await?;
    log_activity(&state, &session, "task", "updated", task.id).await;
    Ok(Json(task))
}

#[derive(Debug, Deserialize)]
pub struct BulkStatusInput {
    pub ids: Vec<Uuid>,
    pub status: TaskStatus,
}

#[derive(Debug, Serialize)]
pub struct BulkStatusResult {
    pub updated: u64,
}

/// POST /rpc/tasks.bulk_update_status
async fn bulk_update_status(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<BulkStatusInput>,
) -> Result<Json<BulkStatusResult>, ApiError> {
    if input.ids.is_empty() {
        return Err(ValidationError::Empty { field: "ids" }.into());
    }
    let updated = TaskRepo::new(&state.pool)
        .bulk_update_status(session.tenant.id, &input.ids, input.status)
        .await?;
    if updated == 0 {
        return Err(ApiError::not_found("No valid tasks found"));
    }
    tracing::debug!(updated, status = %input.status, "bulk task status change");
    Ok(Json(BulkStatusResult { updated }))
}

#[derive(Debug, Deserialize)]
pub struct ReorderInput {
    pub id: Uuid,
    pub sort_order: i32,
}

/// POST /rpc/tasks.reorder
async fn reorder(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<ReorderInput>,
) -> Result<Json<Success>, ApiError> {
    if input.sort_order < 0 {
        return Err(ValidationError::OutOfRange {
            field: "sort order",
            min: 0.0,
            max: f64::from(i32::MAX),
        }
        .into());
    }
    TaskRepo::new(&state.pool)
        .reorder(session.tenant.id, input.id, input.sort_order)
        .await?;
    Ok(Json(Success::ok()))
}

/// POST /rpc/tasks.delete
async fn delete(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<IdInput>,
) -> Result<Json<Success>, ApiError> {
    TaskRepo::new(&state.pool)
        .delete(session.tenant.id, input.id)
        .await?;
    log_activity(&state, &session, "task", "deleted", input.id).await;
    Ok(Json(Success::ok()))
}

/// Task routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rpc/tasks.list", post(list))
        .route("/rpc/tasks.get", post(get))
        .route("/rpc/tasks.create", post(create))
        .route("/rpc/tasks.update", post(update))
        .route("/rpc/tasks.bulk_update_status", post(bulk_update_status))
        .route("/rpc/tasks.reorder", post(reorder))
        .route("/rpc/tasks.delete", post(delete))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hours_must_be_non_negative() {
        assert!(check_hours("estimated hours", Some(-0.5)).is_err());
        assert_eq!(check_hours("estimated hours", Some(7.5)).unwrap(), Some(7.5));
        assert_eq!(check_hours("estimated hours", None).unwrap(), None);
    }

    #[test]
    fn list_defaults_to_fifty_per_page() {
        let input: ListInput = serde_json::from_str("{}").unwrap();
        assert_eq!(input.page.with_default_size(TASK_PAGE_SIZE).page_size, 50);
    }

    #[test]
    fn bulk_input_parses() {
        let input: BulkStatusInput = serde_json::from_str(
            r#"{"ids": ["00000000-0000-0000-0000-000000000001"], "status": "in_review"}"#,
        )
        .unwrap();
        assert_eq!(input.ids.len(), 1);
        assert_eq!(input.status, TaskStatus::InReview);
    }
}
