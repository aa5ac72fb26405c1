//! Tenant repository
//!
//! Tenants are the root of every scoped query. Workspace creation inserts the
//! tenant and its first user in one transaction; onboarding answers are merged
//! into `onboarding_data` under a row lock so the step only moves forward.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use super::users::UserRecord;
use super::DbError;
use crate::models::{OnboardingStep, TenantStatus, UserRole, UserStatus};

/// Tenant record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TenantRecord {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub domain: Option<String>,
    pub logo: Option<String>,
    pub settings: Value,
    pub plan: String,
    pub status: TenantStatus,
    pub onboarding_step: OnboardingStep,
    pub onboarding_data: Value,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantRecord {
    /// Map tenant columns selected with a `t_` alias prefix.
    pub(crate) fn from_prefixed_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("t_id")?,
            name: row.try_get("t_name")?,
            slug: row.try_get("t_slug")?,
            domain: row.try_get("t_domain")?,
            logo: row.try_get("t_logo")?,
            settings: row.try_get("t_settings")?,
            plan: row.try_get("t_plan")?,
            status: row.try_get("t_status")?,
            onboarding_step: row.try_get("t_onboarding_step")?,
            onboarding_data: row.try_get("t_onboarding_data")?,
            trial_ends_at: row.try_get("t_trial_ends_at")?,
            created_at: row.try_get("t_created_at")?,
            updated_at: row.try_get("t_updated_at")?,
        })
    }
}

/// Column list for [`TenantRecord::from_prefixed_row`], table aliased as `t`
pub(crate) const TENANT_PREFIXED_COLUMNS: &str = r#"
    t.id AS t_id, t.name AS t_name, t.slug AS t_slug, t.domain AS t_domain,
    t.logo AS t_logo, t.settings AS t_settings, t.plan AS t_plan,
    t.status AS t_status, t.onboarding_step AS t_onboarding_step,
    t.onboarding_data AS t_onboarding_data, t.trial_ends_at AS t_trial_ends_at,
    t.created_at AS t_created_at, t.updated_at AS t_updated_at
"#;

/// A tenant plus its first user, created together
#[derive(Debug, Clone)]
pub struct NewWorkspace {
    pub name: String,
    pub slug: String,
    pub plan: String,
    pub status: TenantStatus,
    pub onboarding_step: OnboardingStep,
    pub settings: Value,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub owner_name: String,
    pub owner_email: String,
    pub owner_password_hash: String,
    pub owner_role: UserRole,
    pub owner_email_verified: bool,
}

/// Partial tenant update; `None` leaves a column unchanged
#[derive(Debug, Clone, Default)]
pub struct TenantPatch {
    pub name: Option<String>,
    pub domain: Option<Option<String>>,
    pub logo: Option<Option<String>>,
    /// Merged into `settings` key by key
    pub settings: Option<Value>,
}

/// Resource counts checked against plan limits
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TenantUsage {
    pub projects: i64,
    pub team_members: i64,
    pub homeowners: i64,
}

/// Tenant repository
pub struct TenantRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> TenantRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<TenantRecord, DbError> {
        sqlx::query_as::<_, TenantRecord>("SELECT * FROM tenants WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("tenant", id))
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<TenantRecord>, DbError> {
        let tenant = sqlx::query_as::<_, TenantRecord>("SELECT * FROM tenants WHERE slug = $1")
            .bind(slug)
            .fetch_optional(self.pool)
            .await?;
        Ok(tenant)
    }

    /// Insert the tenant and its first user in one transaction.
    pub async fn create_workspace(
        &self,
        workspace: NewWorkspace,
    ) -> Result<(TenantRecord, UserRecord), DbError> {
        let mut tx = self.pool.begin().await?;

        let tenant = sqlx::query_as::<_, TenantRecord>(
            r#"
            INSERT INTO tenants (name, slug, plan, status, onboarding_step, settings, trial_ends_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&workspace.name)
        .bind(&workspace.slug)
        .bind(&workspace.plan)
        .bind(workspace.status)
        .bind(workspace.onboarding_step)
        .bind(&workspace.settings)
        .bind(workspace.trial_ends_at)
        .fetch_one(&mut *tx)
        .await?;

        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (tenant_id, email, password_hash, name, role, status, email_verified)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(tenant.id)
        .bind(&workspace.owner_email)
        .bind(&workspace.owner_password_hash)
        .bind(&workspace.owner_name)
        .bind(workspace.owner_role)
        .bind(UserStatus::Active)
        .bind(workspace.owner_email_verified)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((tenant, user))
    }

    pub async fn update(&self, id: Uuid, patch: TenantPatch) -> Result<TenantRecord, DbError> {
        sqlx::query_as::<_, TenantRecord>(
            r#"
            UPDATE tenants SET
                name = COALESCE($2, name),
                domain = CASE WHEN $3 THEN $4 ELSE domain END,
                logo = CASE WHEN $5 THEN $6 ELSE logo END,
                settings = settings || COALESCE($7::jsonb, '{}'::jsonb),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.domain.is_some())
        .bind(patch.domain.flatten())
        .bind(patch.logo.is_some())
        .bind(patch.logo.flatten())
        .bind(patch.settings)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("tenant", id))
    }

    pub async fn set_plan(&self, id: Uuid, plan_slug: &str) -> Result<(), DbError> {
        let result = sqlx::query("UPDATE tenants SET plan = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(plan_slug)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("tenant", id));
        }
        Ok(())
    }

    pub async fn usage(&self, id: Uuid) -> Result<TenantUsage, DbError> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM projects WHERE tenant_id = $1) AS projects,
                (SELECT COUNT(*) FROM users WHERE tenant_id = $1) AS team_members,
                (SELECT COUNT(*) FROM homeowners WHERE tenant_id = $1) AS homeowners
            "#,
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        Ok(TenantUsage {
            projects: row.get("projects"),
            team_members: row.get("team_members"),
            homeowners: row.get("homeowners"),
        })
    }

    /// Merge one step's answers into `onboarding_data` and advance the step.
    ///
    /// The tenant row is locked so concurrent saves cannot move the step
    /// backwards. Returns the step the tenant is on afterwards.
    pub async fn save_onboarding_step(
        &self,
        id: Uuid,
        saved: OnboardingStep,
        payload: Value,
    ) -> Result<OnboardingStep, DbError> {
        let mut tx = self.pool.begin().await?;

        let current: OnboardingStep =
            sqlx::query_scalar("SELECT onboarding_step FROM tenants WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DbError::not_found("tenant", id))?;

        let next = current.advance_after(saved);

        sqlx::query(
            r#"
            UPDATE tenants SET
                onboarding_data = onboarding_data || jsonb_build_object($2::text, $3::jsonb),
                onboarding_step = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(saved.data_key())
        .bind(payload)
        .bind(next)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(next)
    }

    /// Jump straight to `complete`, recording that onboarding was skipped.
    pub async fn skip_onboarding(&self, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query(
            r#"
            UPDATE tenants SET
                onboarding_step = 'complete',
                onboarding_data = onboarding_data || jsonb_build_object('skipped_at', NOW()),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("tenant", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Integration tests - run with DATABASE_URL set against a migrated database
    // cargo test -p buildops-server -- --ignored

    async fn pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = crate::db::create_pool(&url).await.expect("pool");
        crate::db::run_migrations(&pool).await.expect("migrations");
        pool
    }

    fn workspace(slug: &str) -> NewWorkspace {
        NewWorkspace {
            name: "Test Builders".into(),
            slug: slug.into(),
            plan: "free".into(),
            status: TenantStatus::Trial,
            onboarding_step: OnboardingStep::Company,
            settings: serde_json::json!({}),
            trial_ends_at: None,
            owner_name: "Owner".into(),
            owner_email: format!("{slug}@example.com"),
            owner_password_hash: "hash".into(),
            owner_role: UserRole::Owner,
            owner_email_verified: false,
        }
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn onboarding_step_never_regresses() {
        let pool = pool().await;
        let repo = TenantRepo::new(&pool);
        let slug = format!("t-{}", &Uuid::new_v4().simple().to_string()[..12]);
        let (tenant, _) = repo.create_workspace(workspace(&slug)).await.unwrap();

        let step = repo
            .save_onboarding_step(tenant.id, OnboardingStep::Branding, serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(step, OnboardingStep::Integrations);

        let step = repo
            .save_onboarding_step(tenant.id, OnboardingStep::Company, serde_json::json!({"name": "X"}))
            .await
            .unwrap();
        assert_eq!(step, OnboardingStep::Integrations);

        let reloaded = repo.get(tenant.id).await.unwrap();
        assert_eq!(reloaded.onboarding_data["company"]["name"], "X");
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn duplicate_slug_is_conflict() {
        let pool = pool().await;
        let repo = TenantRepo::new(&pool);
        let slug = format!("t-{}", &Uuid::new_v4().simple().to_string()[..12]);
        repo.create_workspace(workspace(&slug)).await.unwrap();

        let mut again = workspace(&slug);
        again.owner_email = format!("other-{slug}@example.com");
        let err = repo.create_workspace(again).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }));
    }
}
