//! `dashboard.*` procedures: read-only workspace aggregates

use std::sync::Arc;

use axum::extract::State;
use axum::{routing::post, Json, Router};

use crate::db::repos::activity::ActivityEntry;
use crate::db::repos::dashboard::{DashboardStats, MonthlyRevenue, StatusCount, UpcomingDeadlines};
use crate::db::repos::{ActivityRepo, DashboardRepo, UserRecord, UserRepo};
use crate::http::error::ApiError;
use crate::http::extractors::Authed;
use crate::state::AppState;

const RECENT_ACTIVITY_LIMIT: i64 = 10;
const REVENUE_MONTHS: u32 = 6;
const DEADLINE_LIMIT: i64 = 5;
const TEAM_MEMBER_LIMIT: i64 = 10;

/// POST /rpc/dashboard.stats
async fn stats(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
) -> Result<Json<DashboardStats>, ApiError> {
    let stats = DashboardRepo::new(&state.pool)
        .stats(session.tenant.id)
        .await?;
    Ok(Json(stats))
}

/// POST /rpc/dashboard.recent_activity
async fn recent_activity(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
) -> Result<Json<Vec<ActivityEntry>>, ApiError> {
    let entries = ActivityRepo::new(&state.pool)
        .recent(session.tenant.id, RECENT_ACTIVITY_LIMIT)
        .await?;
    Ok(Json(entries))
}

/// POST /rpc/dashboard.projects_by_status
async fn projects_by_status(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
) -> Result<Json<Vec<StatusCount>>, ApiError> {
    let counts = DashboardRepo::new(&state.pool)
        .projects_by_status(session.tenant.id)
        .await?;
    Ok(Json(counts))
}

/// POST /rpc/dashboard.tasks_by_status
async fn tasks_by_status(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
) -> Result<Json<Vec<StatusCount>>, ApiError> {
    let counts = DashboardRepo::new(&state.pool)
        .tasks_by_status(session.tenant.id)
        .await?;
    Ok(Json(counts))
}

/// POST /rpc/dashboard.revenue_over_time
async fn revenue_over_time(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
) -> Result<Json<Vec<MonthlyRevenue>>, ApiError> {
    let revenue = DashboardRepo::new(&state.pool)
        .revenue_over_time(session.tenant.id, REVENUE_MONTHS)
        .await?;
    Ok(Json(revenue))
}

/// POST /rpc/dashboard.upcoming_deadlines
async fn upcoming_deadlines(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
) -> Result<Json<UpcomingDeadlines>, ApiError> {
    let deadlines = DashboardRepo::new(&state.pool)
        .upcoming_deadlines(session.tenant.id, DEADLINE_LIMIT)
        .await?;
    Ok(Json(deadlines))
}

/// POST /rpc/dashboard.team_members
async fn team_members(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
) -> Result<Json<Vec<UserRecord>>, ApiError> {
    let members = UserRepo::new(&state.pool)
        .recently_active(session.tenant.id, TEAM_MEMBER_LIMIT)
        .await?;
    Ok(Json(members))
}

/// Dashboard routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rpc/dashboard.stats", post(stats))
        .route("/rpc/dashboard.recent_activity", post(recent_activity))
        .route("/rpc/dashboard.projects_by_status", post(projects_by_status))
        .route("/rpc/dashboard.tasks_by_status", post(tasks_by_status))
        .route("/rpc/dashboard.revenue_over_time", post(revenue_over_time))
        .route("/rpc/dashboard.upcoming_deadlines", post(upcoming_deadlines))
        .route("/rpc/dashboard.team_members", post(team_members))
}
