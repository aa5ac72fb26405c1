//! Request authentication context
//!
//! A token comes from the `session` cookie, or failing that from an
//! `Authorization: Bearer` header. Resolution never errors: anything that
//! prevents a live session yields an anonymous context.

use axum::http::{header, HeaderMap};
use sqlx::PgPool;

use crate::db::repos::{SessionRepo, TenantRecord, UserRecord};

pub const SESSION_COOKIE: &str = "session";

/// Signed-in user with their workspace
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: UserRecord,
    pub tenant: TenantRecord,
}

/// Per-request context: a session, or anonymous
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub session: Option<Session>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_owned())
}

/// Session token from the request, cookie first.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    cookie_token(headers).or_else(|| bearer_token(headers))
}

/// `Set-Cookie` value for a new session.
pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age_secs}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

/// Build the context for a request.
///
/// `ip_address` is the already-derived client address, recorded on new sessions.
pub async fn resolve_context(pool: &PgPool, headers: &HeaderMap, ip_address: Option<String>) -> AuthContext {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let session = match extract_token(headers) {
        Some(token) => match SessionRepo::new(pool).resolve(&token).await {
            Ok(Some((user, tenant))) => Some(Session { token, user, tenant }),
            Ok(None) => None,
            Err(e) => {
                tracing::error!(error = %e, "session lookup failed");
                None
            }
        },
        None => None,
    };

    AuthContext {
        session,
        ip_address,
        user_agent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn cookie_wins_over_bearer() {
        let h = headers(&[
            (header::COOKIE, "theme=dark; session=from-cookie"),
            (header::AUTHORIZATION, "Bearer from-header"),
        ]);
        assert_eq!(extract_token(&h).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn bearer_used_without_cookie() {
        let h = headers(&[(header::AUTHORIZATION, "bearer abc123")]);
        assert_eq!(extract_token(&h).as_deref(), Some("abc123"));

        let basic = headers(&[(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")]);
        assert_eq!(extract_token(&basic), None);
    }

    #[test]
    fn empty_session_cookie_falls_through() {
        let h = headers(&[
            (header::COOKIE, "session="),
            (header::AUTHORIZATION, "Bearer fallback"),
        ]);
        assert_eq!(extract_token(&h).as_deref(), Some("fallback"));
        assert_eq!(extract_token(&HeaderMap::new()), None);
    }

    #[test]
    fn cookie_attributes() {
        let dev = session_cookie("tok", 2_592_000, false);
        assert_eq!(dev, "session=tok; HttpOnly; SameSite=Lax; Path=/; Max-Age=2592000");

        let prod = session_cookie("tok", 60, true);
        assert!(prod.ends_with("; Secure"));

        let cleared = clear_session_cookie(false);
        assert!(cleared.starts_with("session=;"));
        assert!(cleared.contains("Max-Age=0"));
    }
}
