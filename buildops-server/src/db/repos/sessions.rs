//! Session repository
//!
//! Session ids are opaque random tokens. Resolution joins session, user and
//! tenant in one query and only accepts live sessions of active users whose
//! tenant is not suspended.

use chrono::{Duration, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::tenants::{TenantRecord, TENANT_PREFIXED_COLUMNS};
use super::users::UserRecord;
use super::DbError;

const SESSION_TOKEN_LEN: usize = 32;

/// Session repository
pub struct SessionRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> SessionRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a session and return its token.
    pub async fn create(
        &self,
        user_id: Uuid,
        ttl: Duration,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<String, DbError> {
        let token = buildops_core::generate_token(SESSION_TOKEN_LEN);
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, expires_at, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&token)
        .bind(user_id)
        .bind(Utc::now() + ttl)
        .bind(ip_address)
        .bind(user_agent)
        .execute(self.pool)
        .await?;
        Ok(token)
    }

    /// Resolve a token to its user and tenant, or `None` if not usable.
    pub async fn resolve(&self, token: &str) -> Result<Option<(UserRecord, TenantRecord)>, DbError> {
        let sql = format!(
            r#"
            SELECT u.*, {TENANT_PREFIXED_COLUMNS}
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            JOIN tenants t ON t.id = u.tenant_id
            WHERE s.id = $1
              AND s.expires_at > NOW()
              AND u.status = 'active'
              AND t.status <> 'suspended'
            "#
        );
        let row = sqlx::query(&sql)
            .bind(token)
            .fetch_optional(self.pool)
            .await?;

        match row {
            Some(row) => {
                let user = UserRecord::from_row(&row)?;
                let tenant = TenantRecord::from_prefixed_row(&row)?;
                Ok(Some((user, tenant)))
            }
            None => Ok(None),
        }
    }

    pub async fn delete(&self, token: &str) -> Result<(), DbError> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(token)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Revoke every session of a user (after a password reset).
    pub async fn delete_for_user(&self, user_id: Uuid) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
