//! One-time verification tokens (password reset)

use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::DbError;
use crate::models::VerificationKind;

const VERIFICATION_TOKEN_LEN: usize = 32;

#[derive(Debug, Clone, FromRow)]
pub struct VerificationToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub kind: VerificationKind,
    pub expires_at: DateTime<Utc>,
}

/// Verification token repository
pub struct VerificationRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> VerificationRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a fresh token for `user_id` and return it.
    pub async fn create(&self, user_id: Uuid, kind: VerificationKind, ttl: Duration) -> Result<String, DbError> {
        let token = buildops_core::generate_token(VERIFICATION_TOKEN_LEN);
        sqlx::query(
            r#"
            INSERT INTO verification_tokens (user_id, token, kind, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user_id)
        .bind(&token)
        .bind(kind)
        .bind(Utc::now() + ttl)
        .execute(self.pool)
        .await?;
        Ok(token)
    }

    pub async fn find(&self, token: &str) -> Result<Option<VerificationToken>, DbError> {
        let found = sqlx::query_as::<_, VerificationToken>(
            "SELECT id, user_id, token, kind, expires_at FROM verification_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;
        Ok(found)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query("DELETE FROM verification_tokens WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
