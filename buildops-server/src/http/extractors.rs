//! Custom Axum extractors: procedure input and the session gates

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

use super::error::ApiError;
use super::middleware::client_ip;
use crate::auth::{resolve_context, AuthContext, Gate, Session};
use crate::state::AppState;

/// JSON procedure input. An empty body decodes as `{}`, so procedures
/// whose fields are all optional can be called without one.
pub struct Input<T>(pub T);

impl<S, T> FromRequest<S> for Input<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::InvalidInput {
                message: e.body_text(),
            })?;
        decode(&bytes).map(Self)
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    let body = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"{}".as_slice()
    } else {
        bytes
    };
    serde_json::from_slice(body).map_err(|e| ApiError::InvalidInput {
        message: format!("invalid input: {e}"),
    })
}

/// Resolved request context, anonymous when no session is live.
///
/// Resolution happens once per request; later extractors reuse the result.
pub struct RequestContext(pub AuthContext);

impl FromRequestParts<Arc<AppState>> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<AuthContext>() {
            return Ok(Self(ctx.clone()));
        }
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let ip_address = peer
            .map(|_| client_ip(&parts.headers, peer, &state.config.rate_limit.trusted_proxies));
        let ctx = resolve_context(&state.pool, &parts.headers, ip_address).await;
        parts.extensions.insert(ctx.clone());
        Ok(Self(ctx))
    }
}

async fn gated(
    parts: &mut Parts,
    state: &Arc<AppState>,
    gate: Gate,
) -> Result<Session, ApiError> {
    let RequestContext(ctx) = RequestContext::from_request_parts(parts, state).await?;
    let session = ctx
        .session
        .ok_or_else(|| ApiError::unauthorized("You must be signed in"))?;
    if !gate.allows(session.user.role) {
        let reason = match gate {
            Gate::Owner => "Only the workspace owner can do this",
            _ => "Admin access required",
        };
        return Err(ApiError::forbidden(reason));
    }
    Ok(session)
}

/// Any signed-in user
pub struct Authed(pub Session);

impl FromRequestParts<Arc<AppState>> for Authed {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        gated(parts, state, Gate::Authed).await.map(Self)
    }
}

/// Owner or admin
pub struct AdminOnly(pub Session);

impl FromRequestParts<Arc<AppState>> for AdminOnly {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        gated(parts, state, Gate::Admin).await.map(Self)
    }
}

/// Workspace owner
pub struct OwnerOnly(pub Session);

impl FromRequestParts<Arc<AppState>> for OwnerOnly {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        gated(parts, state, Gate::Owner).await.map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct ListInput {
        page: Option<u32>,
    }

    #[derive(Debug, Deserialize)]
    struct GetInput {
        #[allow(dead_code)]
        id: uuid::Uuid,
    }

    #[test]
    fn empty_body_is_empty_object() {
        let input: ListInput = decode(b"").unwrap();
        assert!(input.page.is_none());
        let input: ListInput = decode(b"  \n").unwrap();
        assert!(input.page.is_none());
    }

    #[test]
    fn required_fields_still_required() {
        let err = decode::<GetInput>(b"").unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput { .. }));
    }

    #[test]
    fn malformed_json_rejected() {
        let err = decode::<ListInput>(b"{page:").unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
