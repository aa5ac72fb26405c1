//! API error types with IntoResponse
//!
//! Errors are converted to `{ "error": <code>, "message": <text> }` JSON
//! responses. Internal failures are logged and answered with a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::auth::AuthError;
use crate::cache::CacheError;
use crate::db::repos::DbError;
use crate::models::ValidationError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Validation failed (400)
    Validation(ValidationError),

    /// Request body could not be decoded (400)
    InvalidInput { message: String },

    /// Request is well-formed but not acceptable now (400)
    BadRequest { message: String },

    /// No usable session, or bad credentials (401)
    Unauthorized { message: String },

    /// Signed in without the required role (403)
    Forbidden { reason: String },

    /// Resource not found (404)
    NotFound { message: String },

    /// Duplicate of an existing resource (409)
    Conflict { message: String },

    /// Rate limit exceeded (429)
    TooManyRequests { retry_after_secs: u64 },

    /// Database error (500, logged)
    Database(DbError),

    /// Cache error (500, logged)
    Cache(CacheError),

    /// Internal error (500, logged)
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidInput { .. } | Self::BadRequest { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Database(_) | Self::Cache(_) | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::InvalidInput { .. } => "validation_error",
            Self::BadRequest { .. } => "bad_request",
            Self::Unauthorized { .. } => "unauthorized",
            Self::Forbidden { .. } => "forbidden",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::TooManyRequests { .. } => "too_many_requests",
            Self::Database(_) | Self::Cache(_) | Self::Internal { .. } => "internal_error",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::InvalidInput { message }
            | Self::BadRequest { message }
            | Self::Unauthorized { message }
            | Self::NotFound { message }
            | Self::Conflict { message } => message.clone(),
            Self::Forbidden { reason } => reason.clone(),
            Self::TooManyRequests { retry_after_secs } => {
                format!("too many requests, retry in {retry_after_secs}s")
            }
            Self::Database(e) => {
                tracing::error!("Database error: {}", e);
                "an internal error occurred".into()
            }
            Self::Cache(e) => {
                tracing::error!("Cache error: {}", e);
                "an internal error occurred".into()
            }
            Self::Internal { message } => {
                tracing::error!("Internal error: {}", message);
                "an internal error occurred".into()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({
            "error": self.code(),
            "message": self.message(),
        });

        let mut response = (status, Json(body)).into_response();
        if let Self::TooManyRequests { retry_after_secs } = self {
            response.headers_mut().insert(
                axum::http::header::RETRY_AFTER,
                axum::http::HeaderValue::from(retry_after_secs),
            );
        }
        response
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

/// Friendly message for a unique constraint name.
fn conflict_message(constraint: &str) -> String {
    match constraint {
        "users_email_key" => "Email already registered".into(),
        "tenants_slug_key" => "Workspace URL is already taken".into(),
        "invoices_tenant_id_invoice_number_key" => "Invoice number already in use".into(),
        "subcontractor_trades_pkey" => "Trade already linked to this subcontractor".into(),
        other => format!("duplicate value violates {other}"),
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { resource, id } => Self::NotFound {
                message: format!("{resource} '{id}' not found"),
            },
            DbError::Conflict { constraint } => Self::Conflict {
                message: conflict_message(&constraint),
            },
            other => Self::Database(other),
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(e: CacheError) -> Self {
        Self::Cache(e)
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        Self::Internal {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_error_is_400() {
        let err = ApiError::Validation(ValidationError::Empty { field: "name" });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "validation_error");
    }

    #[tokio::test]
    async fn status_mapping() {
        let cases = [
            (ApiError::bad_request("x"), StatusCode::BAD_REQUEST, "bad_request"),
            (ApiError::unauthorized("x"), StatusCode::UNAUTHORIZED, "unauthorized"),
            (ApiError::forbidden("x"), StatusCode::FORBIDDEN, "forbidden"),
            (ApiError::not_found("x"), StatusCode::NOT_FOUND, "not_found"),
            (ApiError::conflict("x"), StatusCode::CONFLICT, "conflict"),
            (
                ApiError::TooManyRequests { retry_after_secs: 30 },
                StatusCode::TOO_MANY_REQUESTS,
                "too_many_requests",
            ),
        ];
        for (err, status, code) in cases {
            let response = err.into_response();
            assert_eq!(response.status(), status);
            assert_eq!(body_json(response).await["error"], code);
        }
    }

    #[tokio::test]
    async fn internal_details_are_hidden() {
        let response = ApiError::Internal {
            message: "connection refused at 10.0.0.5".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["message"], "an internal error occurred");
    }

    #[test]
    fn db_errors_map_to_api_errors() {
        let not_found: ApiError = DbError::not_found("project", "abc").into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let conflict: ApiError = DbError::Conflict {
            constraint: "tenants_slug_key".into(),
        }
        .into();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        assert_eq!(conflict.message(), "Workspace URL is already taken");
    }

    #[tokio::test]
    async fn rate_limited_carries_retry_after() {
        let response = ApiError::TooManyRequests { retry_after_secs: 60 }.into_response();
        assert_eq!(response.headers()["retry-after"], "60");
    }
}
