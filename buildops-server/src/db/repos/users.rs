//! User repository
//!
//! Lookups by email are global (an email belongs to one workspace); every
//! other query is scoped by tenant id.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{fetch_page, DbError};
use crate::models::{Paginated, Pagination, UserRole, UserStatus};

/// User record from database. Secrets never serialize.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub name: String,
    pub avatar: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    #[serde(skip_serializing)]
    pub mfa_secret: Option<String>,
    pub mfa_enabled: bool,
    #[serde(skip_serializing)]
    pub backup_codes: Vec<String>,
    pub email_verified: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User repository
pub struct UserRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, DbError> {
        let user = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    /// Unscoped lookup for auth flows that start from a token.
    pub async fn get_by_id(&self, id: Uuid) -> Result<UserRecord, DbError> {
        sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("user", id))
    }

    pub async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<UserRecord, DbError> {
        sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("user", id))
    }

    /// Team members, newest first.
    pub async fn list(&self, tenant_id: Uuid, page: Pagination) -> Result<Paginated<UserRecord>, DbError> {
        let (rows, total) = fetch_page(&page, |limit, offset| {
            sqlx::query(
                r#"
                SELECT *, COUNT(*) OVER() AS total
                FROM users
                WHERE tenant_id = $1
                ORDER BY created_at DESC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(tenant_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
        })
        .await?;

        let items = rows
            .iter()
            .map(UserRecord::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(page.wrap(items, total))
    }

    /// Create an active member inside an existing tenant.
    pub async fn create_member(
        &self,
        tenant_id: Uuid,
        email: &str,
        name: &str,
        password_hash: &str,
        role: UserRole,
    ) -> Result<UserRecord, DbError> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (tenant_id, email, password_hash, name, role, status, email_verified)
            VALUES ($1, $2, $3, $4, $5, 'active', TRUE)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .bind(role)
        .fetch_one(self.pool)
        .await?;
        Ok(user)
    }

    pub async fn update_profile(
        &self,
        id: Uuid,
        name: Option<String>,
        avatar: Option<Option<String>>,
    ) -> Result<UserRecord, DbError> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                avatar = CASE WHEN $3 THEN $4 ELSE avatar END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(avatar.is_some())
        .bind(avatar.flatten())
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("user", id))
    }

    pub async fn update_role(&self, tenant_id: Uuid, id: Uuid, role: UserRole) -> Result<UserRecord, DbError> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            UPDATE users SET role = $3, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(role)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("user", id))
    }

    pub async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("user", id));
        }
        Ok(())
    }

    pub async fn record_login(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<(), DbError> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    pub async fn enable_mfa(&self, id: Uuid, secret: &str, backup_codes: &[String]) -> Result<(), DbError> {
        sqlx::query(
            r#"
            UPDATE users SET mfa_secret = $2, mfa_enabled = TRUE, backup_codes = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(secret)
        .bind(backup_codes)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn disable_mfa(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query(
            r#"
            UPDATE users SET mfa_secret = NULL, mfa_enabled = FALSE, backup_codes = '{}', updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Remove a used backup code. Returns false if it was not on file.
    pub async fn consume_backup_code(&self, id: Uuid, code: &str) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET backup_codes = array_remove(backup_codes, $2), updated_at = NOW()
            WHERE id = $1 AND $2 = ANY(backup_codes)
            "#,
        )
        .bind(id)
        .bind(code)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Members ordered by most recent login, for the dashboard.
    pub async fn recently_active(&self, tenant_id: Uuid, limit: i64) -> Result<Vec<UserRecord>, DbError> {
        let users = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT * FROM users
            WHERE tenant_id = $1
            ORDER BY last_login_at DESC NULLS LAST
            LIMIT $2
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_not_serialized() {
        let user = UserRecord {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            email: "crew@example.com".into(),
            password_hash: Some("$argon2id$...".into()),
            name: "Crew Lead".into(),
            avatar: None,
            role: UserRole::Member,
            status: UserStatus::Active,
            mfa_secret: Some("SECRET".into()),
            mfa_enabled: true,
            backup_codes: vec!["ABCDEFGH".into()],
            email_verified: true,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("mfa_secret").is_none());
        assert!(json.get("backup_codes").is_none());
        assert_eq!(json["role"], "member");
        assert_eq!(json["mfa_enabled"], true);
    }
}
