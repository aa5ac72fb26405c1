//! `users.*` procedures: team members and invitations

use std::sync::Arc;

use axum::extract::State;
use axum::{routing::post, Json, Router};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::{IdInput, Success};
use crate::db::repos::{InvitationRecord, InvitationRepo, UserRecord, UserRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{AdminOnly, Authed, Input};
use crate::models::{
    double_option, optional_name, optional_url, Email, Paginated, PaginationParams, UserRole,
    ValidationError,
};
use crate::state::AppState;

/// Roles an admin may hand out by role change
const ASSIGNABLE_ROLES: &[UserRole] = &[UserRole::Admin, UserRole::Member];

/// Roles an invitation may carry
const INVITABLE_ROLES: &[UserRole] = &[UserRole::Admin, UserRole::Member, UserRole::Client];

fn require_role(allowed: &[UserRole], role: UserRole) -> Result<UserRole, ValidationError> {
    if allowed.contains(&role) {
        Ok(role)
    } else {
        Err(ValidationError::InvalidVariant {
            field: "role",
            value: role.to_string(),
        })
    }
}

/// POST /rpc/users.list
async fn list(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(params): Input<PaginationParams>,
) -> Result<Json<Paginated<UserRecord>>, ApiError> {
    let page = UserRepo::new(&state.pool)
        .list(session.tenant.id, params.into())
        .await?;
    Ok(Json(page))
}

/// POST /rpc/users.get
async fn get(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<IdInput>,
) -> Result<Json<UserRecord>, ApiError> {
    let user = UserRepo::new(&state.pool)
        .get(session.tenant.id, input.id)
        .await?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileInput {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub avatar: Option<Option<String>>,
}

/// POST /rpc/users.update_profile
async fn update_profile(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<UpdateProfileInput>,
) -> Result<Json<UserRecord>, ApiError> {
    let name = optional_name("name", input.name.as_deref())?;
    let avatar = input
        .avatar
        .map(|a| optional_url("avatar", a.as_deref()))
        .transpose()?;
    let user = UserRepo::new(&state.pool)
        .update_profile(session.user.id, name, avatar)
        .await?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleInput {
    pub user_id: uuid::Uuid,
    pub role: UserRole,
}

/// POST /rpc/users.update_role
async fn update_role(
    State(state): State<Arc<AppState>>,
    AdminOnly(session): AdminOnly,
    Input(input): Input<UpdateRoleInput>,
) -> Result<Json<UserRecord>, ApiError> {
    let role = require_role(ASSIGNABLE_ROLES, input.role)?;
    let users = UserRepo::new(&state.pool);

    let target = users.get(session.tenant.id, input.user_id).await?;
    if target.role == UserRole::Owner {
        return Err(ApiError::forbidden("The owner's role cannot be changed"));
    }

    let updated = users.update_role(session.tenant.id, target.id, role).await?;
    tracing::info!(user_id = %updated.id, role = %role, "role changed");
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
pub struct InviteInput {
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, Serialize)]
pub struct InviteResponse {
    #[serde(flatten)]
    pub invitation: InvitationRecord,
    /// Only returned outside production, where no mail is sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// POST /rpc/users.invite
async fn invite(
    State(state): State<Arc<AppState>>,
    AdminOnly(session): AdminOnly,
    Input(input): Input<InviteInput>,
) -> Result<Json<InviteResponse>, ApiError> {
    let email = Email::new(&input.email)?;
    let role = require_role(INVITABLE_ROLES, input.role)?;

    if UserRepo::new(&state.pool)
        .find_by_email(email.as_str())
        .await?
        .is_some()
    {
        return Err(ApiError::conflict("User is already a member"));
    }
    let invitations = InvitationRepo::new(&state.pool);
    if invitations
        .pending_exists(session.tenant.id, email.as_str())
        .await?
    {
        return Err(ApiError::conflict("An invitation is already pending for this email"));
    }

    let invitation = invitations
        .create(
            session.tenant.id,
            email.as_str(),
            role,
            session.user.id,
            Duration::days(state.config.auth.invitation_ttl_days),
        )
        .await?;
    tracing::info!(invitation_id = %invitation.id, role = %role, "invitation created");

    let token = state.dev_mode().then(|| invitation.token.clone());
    Ok(Json(InviteResponse { invitation, token }))
}

#[derive(Debug, Deserialize)]
pub struct RemoveInput {
    pub user_id: uuid::Uuid,
}

/// POST /rpc/users.remove
async fn remove(
    State(state): State<Arc<AppState>>,
    AdminOnly(session): AdminOnly,
    Input(input): Input<RemoveInput>,
) -> Result<Json<Success>, ApiError> {
    if input.user_id == session.user.id {
        return Err(ApiError::bad_request("You cannot remove yourself"));
    }
    let users = UserRepo::new(&state.pool);
    let target = users.get(session.tenant.id, input.user_id).await?;
    if target.role == UserRole::Owner {
        return Err(ApiError::forbidden("The owner cannot be removed"));
    }

    users.delete(session.tenant.id, target.id).await?;
    tracing::info!(user_id = %target.id, "team member removed");
    Ok(Json(Success::ok()))
}

/// User routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rpc/users.list", post(list))
        .route("/rpc/users.get", post(get))
        .route("/rpc/users.update_profile", post(update_profile))
        .route("/rpc/users.update_role", post(update_role))
        .route("/rpc/users.invite", post(invite))
        .route("/rpc/users.remove", post(remove))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_is_never_assignable() {
        assert!(require_role(ASSIGNABLE_ROLES, UserRole::Owner).is_err());
        assert!(require_role(ASSIGNABLE_ROLES, UserRole::Client).is_err());
        assert_eq!(
            require_role(ASSIGNABLE_ROLES, UserRole::Admin).unwrap(),
            UserRole::Admin
        );
    }

    #[test]
    fn clients_can_be_invited() {
        assert!(require_role(INVITABLE_ROLES, UserRole::Client).is_ok());
        assert!(require_role(INVITABLE_ROLES, UserRole::Owner).is_err());
    }
}
