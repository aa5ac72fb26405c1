//! Invitation repository

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::DbError;
use crate::models::UserRole;

const INVITATION_TOKEN_LEN: usize = 32;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct InvitationRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub role: UserRole,
    #[serde(skip_serializing)]
    pub token: String,
    pub invited_by_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl InvitationRecord {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.accepted_at.is_none() && self.expires_at > now
    }
}

/// Invitation repository
pub struct InvitationRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> InvitationRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Whether an unaccepted, unexpired invitation exists for this email.
    pub async fn pending_exists(&self, tenant_id: Uuid, email: &str) -> Result<bool, DbError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM invitations
                WHERE tenant_id = $1 AND email = $2
                  AND accepted_at IS NULL AND expires_at > NOW()
            )
            "#,
        )
        .bind(tenant_id)
        .bind(email)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn create(
        &self,
        tenant_id: Uuid,
        email: &str,
        role: UserRole,
        invited_by: Uuid,
        ttl: Duration,
    ) -> Result<InvitationRecord, DbError> {
        let invitation = sqlx::query_as::<_, InvitationRecord>(
            r#"
            INSERT INTO invitations (tenant_id, email, role, token, invited_by_id, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(email)
        .bind(role)
        .bind(buildops_core::generate_token(INVITATION_TOKEN_LEN))
        .bind(invited_by)
        .bind(Utc::now() + ttl)
        .fetch_one(self.pool)
        .await?;
        Ok(invitation)
    }

    /// Create several invitations atomically (onboarding team step).
    pub async fn create_many(
        &self,
        tenant_id: Uuid,
        invites: &[(String, UserRole)],
        invited_by: Uuid,
        ttl: Duration,
    ) -> Result<Vec<InvitationRecord>, DbError> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(invites.len());
        for (email, role) in invites {
            let invitation = sqlx::query_as::<_, InvitationRecord>(
                r#"
                INSERT INTO invitations (tenant_id, email, role, token, invited_by_id, expires_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
                "#,
            )
            .bind(tenant_id)
            .bind(email)
            .bind(role)
            .bind(buildops_core::generate_token(INVITATION_TOKEN_LEN))
            .bind(invited_by)
            .bind(Utc::now() + ttl)
            .fetch_one(&mut *tx)
            .await?;
            created.push(invitation);
        }
        tx.commit().await?;
        Ok(created)
    }

    pub async fn find_by_token(&self, token: &str) -> Result<Option<InvitationRecord>, DbError> {
        let invitation =
            sqlx::query_as::<_, InvitationRecord>("SELECT * FROM invitations WHERE token = $1")
                .bind(token)
                .fetch_optional(self.pool)
                .await?;
        Ok(invitation)
    }

    pub async fn mark_accepted(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query("UPDATE invitations SET accepted_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invitation(expires_in: Duration, accepted: bool) -> InvitationRecord {
        let now = Utc::now();
        InvitationRecord {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            email: "new@example.com".into(),
            role: UserRole::Member,
            token: "tok".into(),
            invited_by_id: None,
            expires_at: now + expires_in,
            accepted_at: accepted.then_some(now),
            created_at: now,
        }
    }

    #[test]
    fn usable_only_when_pending_and_unexpired() {
        let now = Utc::now();
        assert!(invitation(Duration::days(7), false).is_usable(now));
        assert!(!invitation(Duration::days(7), true).is_usable(now));
        assert!(!invitation(Duration::seconds(-1), false).is_usable(now));
    }
}
