//! `auth.*` procedures: registration, login with optional TOTP, password
//! reset and invitation acceptance

use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::{routing::post, Json, Router};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::Success;
use crate::auth::{
    clear_session_cookie, generate_backup_codes, hash_password, normalize_backup_code,
    session_cookie, verify_password, AuthContext, MfaSecret,
};
use crate::db::repos::{
    InvitationRepo, NewWorkspace, SessionRepo, TenantRecord, TenantRepo, UserRecord, UserRepo,
    VerificationRepo,
};
use crate::http::error::ApiError;
use crate::http::extractors::{Authed, Input, RequestContext};
use crate::models::{
    DisplayName, Email, OnboardingStep, Password, Slug, TenantStatus, UserRole, UserStatus,
    VerificationCode, VerificationKind,
};
use crate::state::AppState;

const MFA_TOKEN_LEN: usize = 32;
const MFA_LOGIN_TTL: StdDuration = StdDuration::from_secs(300);
const MFA_SETUP_TTL: StdDuration = StdDuration::from_secs(600);
const INVALID_CREDENTIALS: &str = "Invalid email or password";

fn mfa_login_key(token: &str) -> String {
    format!("mfa:{token}")
}

fn mfa_setup_key(user_id: Uuid) -> String {
    format!("mfa-setup:{user_id}")
}

/// Signed-in user with their workspace
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub user: UserRecord,
    pub tenant: TenantRecord,
}

async fn start_session(
    state: &AppState,
    ctx: &AuthContext,
    user: UserRecord,
    tenant: TenantRecord,
) -> Result<Response, ApiError> {
    let token = SessionRepo::new(&state.pool)
        .create(
            user.id,
            state.session_ttl(),
            ctx.ip_address.as_deref(),
            ctx.user_agent.as_deref(),
        )
        .await?;
    tracing::info!(user_id = %user.id, tenant_id = %tenant.id, "session created");

    let cookie = session_cookie(&token, state.session_ttl().num_seconds(), !state.dev_mode());
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            requires_mfa: false,
            mfa_token: None,
            session: Some(SessionView { user, tenant }),
        }),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub tenant_name: String,
    pub tenant_slug: String,
}

/// POST /rpc/auth.register
async fn register(
    State(state): State<Arc<AppState>>,
    RequestContext(ctx): RequestContext,
    Input(input): Input<RegisterInput>,
) -> Result<Response, ApiError> {
    let name = DisplayName::new("name", &input.name)?;
    let email = Email::new(&input.email)?;
    let password = Password::strong(&input.password)?;
    let tenant_name = DisplayName::new("workspace name", &input.tenant_name)?;
    let slug = Slug::new(&input.tenant_slug)?;

    if UserRepo::new(&state.pool)
        .find_by_email(email.as_str())
        .await?
        .is_some()
    {
        return Err(ApiError::conflict("Email already registered"));
    }
    let tenants = TenantRepo::new(&state.pool);
    if tenants.find_by_slug(slug.as_str()).await?.is_some() {
        return Err(ApiError::conflict("Workspace URL is already taken"));
    }

    let (tenant, user) = tenants
        .create_workspace(NewWorkspace {
            name: tenant_name.into_string(),
            slug: slug.as_str().to_owned(),
            plan: "free".to_owned(),
            status: TenantStatus::Trial,
            onboarding_step: OnboardingStep::Company,
            settings: json!({}),
            trial_ends_at: Some(Utc::now() + Duration::days(state.config.auth.trial_days)),
            owner_name: name.into_string(),
            owner_email: email.into_string(),
            owner_password_hash: hash_password(password.expose())?,
            owner_role: UserRole::Owner,
            owner_email_verified: false,
        })
        .await?;
    tracing::info!(tenant = %tenant.slug, "workspace registered");

    start_session(&state, &ctx, user, tenant).await
}

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub requires_mfa: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mfa_token: Option<String>,
    #[serde(flatten)]
    pub session: Option<SessionView>,
}

/// POST /rpc/auth.login
async fn login(
    State(state): State<Arc<AppState>>,
    RequestContext(ctx): RequestContext,
    Input(input): Input<LoginInput>,
) -> Result<Response, ApiError> {
    let email = Email::new(&input.email)?;
    let users = UserRepo::new(&state.pool);

    let user = users
        .find_by_email(email.as_str())
        .await?
        .ok_or_else(|| ApiError::unauthorized(INVALID_CREDENTIALS))?;
    let Some(hash) = user.password_hash.as_deref() else {
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };
    if user.status != UserStatus::Active {
        return Err(ApiError::forbidden("Account is not active"));
    }
    if !verify_password(&input.password, hash) {
        tracing::debug!(user_id = %user.id, "password mismatch");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    if user.mfa_enabled {
        let mfa_token = buildops_core::generate_token(MFA_TOKEN_LEN);
        state
            .sessions()
            .set(&mfa_login_key(&mfa_token), &user.id.to_string(), MFA_LOGIN_TTL)
            .await?;
        return Ok(Json(LoginResponse {
            requires_mfa: true,
            mfa_token: Some(mfa_token),
            session: None,
        })
        .into_response());
    }

    users.record_login(user.id).await?;
    let tenant = TenantRepo::new(&state.pool).get(user.tenant_id).await?;
    start_session(&state, &ctx, user, tenant).await
}

#[derive(Debug, Deserialize)]
pub struct VerifyMfaInput {
    pub mfa_token: String,
    pub code: String,
}

/// POST /rpc/auth.verify_mfa
async fn verify_mfa(
    State(state): State<Arc<AppState>>,
    RequestContext(ctx): RequestContext,
    Input(input): Input<VerifyMfaInput>,
) -> Result<Response, ApiError> {
    let sessions = state.sessions();
    let key = mfa_login_key(&input.mfa_token);
    let user_id = sessions
        .get(&key)
        .await?
        .and_then(|raw| raw.parse::<Uuid>().ok())
        .ok_or_else(|| ApiError::unauthorized("MFA session expired, sign in again"))?;

    let users = UserRepo::new(&state.pool);
    let user = users.get_by_id(user_id).await?;
    let secret = user
        .mfa_secret
        .as_deref()
        .map(MfaSecret::from_base32)
        .ok_or_else(|| ApiError::unauthorized("MFA is not configured"))?;

    let code = input.code.trim();
    let valid = secret.verify(code)?
        || users
            .consume_backup_code(user.id, &normalize_backup_code(code))
            .await?;
    if !valid {
        return Err(ApiError::unauthorized("Invalid verification code"));
    }

    sessions.delete(&key).await?;
    users.record_login(user.id).await?;
    let tenant = TenantRepo::new(&state.pool).get(user.tenant_id).await?;
    start_session(&state, &ctx, user, tenant).await
}

/// POST /rpc/auth.logout
async fn logout(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
) -> Result<Response, ApiError> {
    SessionRepo::new(&state.pool).delete(&session.token).await?;
    let cookie = clear_session_cookie(!state.dev_mode());
    Ok(([(header::SET_COOKIE, cookie)], Json(Success::ok())).into_response())
}

/// POST /rpc/auth.me
async fn me(RequestContext(ctx): RequestContext) -> Json<Option<SessionView>> {
    Json(ctx.session.map(|s| SessionView {
        user: s.user,
        tenant: s.tenant,
    }))
}

#[derive(Debug, Serialize)]
pub struct MfaSetup {
    pub secret: String,
    pub uri: String,
}

/// POST /rpc/auth.setup_mfa
async fn setup_mfa(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
) -> Result<Json<MfaSetup>, ApiError> {
    if session.user.mfa_enabled {
        return Err(ApiError::bad_request("MFA is already enabled"));
    }
    let secret = MfaSecret::generate();
    state
        .sessions()
        .set(
            &mfa_setup_key(session.user.id),
            secret.as_base32(),
            MFA_SETUP_TTL,
        )
        .await?;

    let uri = secret.provisioning_uri(&state.config.auth.mfa_issuer, &session.user.email);
    Ok(Json(MfaSetup {
        secret: secret.as_base32().to_owned(),
        uri,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CodeInput {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct BackupCodes {
    pub backup_codes: Vec<String>,
}

/// POST /rpc/auth.enable_mfa
async fn enable_mfa(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<CodeInput>,
) -> Result<Json<BackupCodes>, ApiError> {
    let code = VerificationCode::new(&input.code)?;
    let sessions = state.sessions();
    let key = mfa_setup_key(session.user.id);

    let secret = sessions
        .get(&key)
        .await?
        .map(MfaSecret::from_base32)
        .ok_or_else(|| ApiError::bad_request("MFA setup expired, start again"))?;
    if !secret.verify(code.as_str())? {
        return Err(ApiError::bad_request("Invalid verification code"));
    }

    let backup_codes = generate_backup_codes();
    UserRepo::new(&state.pool)
        .enable_mfa(session.user.id, secret.as_base32(), &backup_codes)
        .await?;
    sessions.delete(&key).await?;
    tracing::info!(user_id = %session.user.id, "MFA enabled");

    Ok(Json(BackupCodes { backup_codes }))
}

/// POST /rpc/auth.disable_mfa
async fn disable_mfa(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<CodeInput>,
) -> Result<Json<Success>, ApiError> {
    let code = VerificationCode::new(&input.code)?;
    let secret = match (&session.user.mfa_secret, session.user.mfa_enabled) {
        (Some(secret), true) => MfaSecret::from_base32(secret.as_str()),
        _ => return Err(ApiError::bad_request("MFA is not enabled")),
    };
    if !secret.verify(code.as_str())? {
        return Err(ApiError::bad_request("Invalid verification code"));
    }

    UserRepo::new(&state.pool).disable_mfa(session.user.id).await?;
    tracing::info!(user_id = %session.user.id, "MFA disabled");
    Ok(Json(Success::ok()))
}

#[derive(Debug, Deserialize)]
pub struct ResetRequestInput {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ResetRequested {
    pub success: bool,
    /// Only returned outside production, where no mail is sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// POST /rpc/auth.request_password_reset
async fn request_password_reset(
    State(state): State<Arc<AppState>>,
    Input(input): Input<ResetRequestInput>,
) -> Result<Json<ResetRequested>, ApiError> {
    let email = Email::new(&input.email)?;
    let mut token = None;

    if let Some(user) = UserRepo::new(&state.pool)
        .find_by_email(email.as_str())
        .await?
    {
        let issued = VerificationRepo::new(&state.pool)
            .create(user.id, VerificationKind::PasswordReset, Duration::hours(1))
            .await?;
        tracing::info!(user_id = %user.id, "password reset requested");
        if state.dev_mode() {
            token = Some(issued);
        }
    }

    Ok(Json(ResetRequested {
        success: true,
        token,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordInput {
    pub token: String,
    pub password: String,
}

/// POST /rpc/auth.reset_password
async fn reset_password(
    State(state): State<Arc<AppState>>,
    Input(input): Input<ResetPasswordInput>,
) -> Result<Json<Success>, ApiError> {
    let password = Password::strong(&input.password)?;
    let tokens = VerificationRepo::new(&state.pool);

    let token = tokens
        .find(&input.token)
        .await?
        .filter(|t| t.kind == VerificationKind::PasswordReset)
        .ok_or_else(|| ApiError::bad_request("Invalid reset token"))?;
    if token.expires_at <= Utc::now() {
        tokens.delete(token.id).await?;
        return Err(ApiError::bad_request("Reset token expired"));
    }

    UserRepo::new(&state.pool)
        .set_password(token.user_id, &hash_password(password.expose())?)
        .await?;
    tokens.delete(token.id).await?;
    let revoked = SessionRepo::new(&state.pool)
        .delete_for_user(token.user_id)
        .await?;
    tracing::info!(user_id = %token.user_id, revoked, "password reset");

    Ok(Json(Success::ok()))
}

#[derive(Debug, Deserialize)]
pub struct AcceptInvitationInput {
    pub token: String,
    pub name: String,
    pub password: String,
}

/// POST /rpc/auth.accept_invitation
async fn accept_invitation(
    State(state): State<Arc<AppState>>,
    RequestContext(ctx): RequestContext,
    Input(input): Input<AcceptInvitationInput>,
) -> Result<Response, ApiError> {
    let name = DisplayName::new("name", &input.name)?;
    let password = Password::strong(&input.password)?;
    let invitations = InvitationRepo::new(&state.pool);

    let invitation = invitations
        .find_by_token(&input.token)
        .await?
        .ok_or_else(|| ApiError::bad_request("Invalid invitation"))?;
    if !invitation.is_usable(Utc::now()) {
        return Err(ApiError::bad_request(
            "Invitation has expired or was already accepted",
        ));
    }

    let users = UserRepo::new(&state.pool);
    if users.find_by_email(&invitation.email).await?.is_some() {
        return Err(ApiError::conflict("Email already registered"));
    }

    let user = users
        .create_member(
            invitation.tenant_id,
            &invitation.email,
            name.as_str(),
            &hash_password(password.expose())?,
            invitation.role,
        )
        .await?;
    invitations.mark_accepted(invitation.id).await?;
    tracing::info!(user_id = %user.id, tenant_id = %invitation.tenant_id, "invitation accepted");

    let tenant = TenantRepo::new(&state.pool).get(invitation.tenant_id).await?;
    start_session(&state, &ctx, user, tenant).await
}

/// Auth routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rpc/auth.register", post(register))
        .route("/rpc/auth.login", post(login))
        .route("/rpc/auth.verify_mfa", post(verify_mfa))
        .route("/rpc/auth.logout", post(logout))
        .route("/rpc/auth.me", post(me))
        .route("/rpc/auth.setup_mfa", post(setup_mfa))
        .route("/rpc/auth.enable_mfa", post(enable_mfa))
        .route("/rpc/auth.disable_mfa", post(disable_mfa))
        .route("/rpc/auth.request_password_reset", post(request_password_reset))
        .route("/rpc/auth.reset_password", post(reset_password))
        .route("/rpc/auth.accept_invitation", post(accept_invitation))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mfa_challenge_omits_session() {
        let body = serde_json::to_value(LoginResponse {
            requires_mfa: true,
            mfa_token: Some("tok".into()),
            session: None,
        })
        .unwrap();
        assert_eq!(body, json!({"requires_mfa": true, "mfa_token": "tok"}));
    }

    #[test]
    fn cache_keys() {
        let id = Uuid::nil();
        assert_eq!(mfa_login_key("abc"), "mfa:abc");
        assert_eq!(
            mfa_setup_key(id),
            "mfa-setup:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn reset_token_hidden_when_absent() {
        let body = serde_json::to_value(ResetRequested {
            success: true,
            token: None,
        })
        .unwrap();
        assert_eq!(body, json!({"success": true}));
    }
}
