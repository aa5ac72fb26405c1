//! Project repository

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use super::{fetch_page, search_pattern, DbError};
use crate::models::{double_option, Paginated, Pagination, ProjectStatus};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProjectRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub homeowner_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub status: ProjectStatus,
    pub contract_amount_cents: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Homeowner name shown next to a project
#[derive(Debug, Clone, Serialize)]
pub struct HomeownerSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectWithHomeowner {
    #[serde(flatten)]
    pub project: ProjectRecord,
    pub homeowner: Option<HomeownerSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub homeowner_id: Option<Uuid>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub status: Option<ProjectStatus>,
    pub contract_amount_cents: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub homeowner_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub contract_amount_cents: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub start_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub end_date: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub status: Option<ProjectStatus>,
    pub homeowner_id: Option<Uuid>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TaskProgress {
    pub total: i64,
    pub completed: i64,
    pub progress: u8,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BudgetSummary {
    pub contract_cents: i64,
    pub invoiced_cents: i64,
    pub paid_cents: i64,
    pub remaining_cents: i64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProjectStats {
    pub tasks: TaskProgress,
    pub budget: BudgetSummary,
}

/// Whole-number completion percentage, 0 when there is nothing to complete.
pub fn progress_percent(completed: i64, total: i64) -> u8 {
    if total <= 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round().clamp(0.0, 100.0) as u8
}

fn homeowner_summary(row: &sqlx::postgres::PgRow) -> Result<Option<HomeownerSummary>, sqlx::Error> {
    let id: Option<Uuid> = row.try_get("h_id")?;
    Ok(match id {
        Some(id) => Some(HomeownerSummary {
            id,
            first_name: row.try_get("h_first_name")?,
            last_name: row.try_get("h_last_name")?,
        }),
        None => None,
    })
}

/// Project repository
pub struct ProjectRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> ProjectRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List projects with their homeowner, newest first.
    pub async fn list(
        &self,
        tenant_id: Uuid,
        filter: ProjectFilter,
        page: Pagination,
    ) -> Result<Paginated<ProjectWithHomeowner>, DbError> {
        let pattern = search_pattern(filter.search.as_deref());
        let (rows, total) = fetch_page(&page, |limit, offset| {
            sqlx::query(
                r#"
                SELECT
                    p.*,
                    h.id AS h_id, h.first_name AS h_first_name, h.last_name AS h_last_name,
                    COUNT(*) OVER() AS total
                FROM projects p
                LEFT JOIN homeowners h ON h.id = p.homeowner_id
                WHERE p.tenant_id = $1
                  AND ($2::project_status IS NULL OR p.status = $2)
                  AND ($3::uuid IS NULL OR p.homeowner_id = $3)
                  AND ($4::text IS NULL OR p.name ILIKE $4)
                ORDER BY p.created_at DESC
                LIMIT $5 OFFSET $6
                "#,
            )
            .bind(tenant_id)
            .bind(filter.status)
            .bind(filter.homeowner_id)
            .bind(pattern.clone())
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
        })
        .await?;

        let items = rows
            .iter()
            .map(|r| {
                Ok(ProjectWithHomeowner {
                    project: ProjectRecord::from_row(r)?,
                    homeowner: homeowner_summary(r)?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(page.wrap(items, total))
    }

    pub async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<ProjectWithHomeowner, DbError> {
        let row = sqlx::query(
            r#"
            SELECT
                p.*,
                h.id AS h_id, h.first_name AS h_first_name, h.last_name AS h_last_name
            FROM projects p
            LEFT JOIN homeowners h ON h.id = p.homeowner_id
            WHERE p.id = $1 AND p.tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("project", id))?;

        Ok(ProjectWithHomeowner {
            project: ProjectRecord::from_row(&row)?,
            homeowner: homeowner_summary(&row)?,
        })
    }

    pub async fn exists(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, DbError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM projects WHERE id = $1 AND tenant_id = $2)",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn for_homeowner(&self, tenant_id: Uuid, homeowner_id: Uuid) -> Result<Vec<ProjectRecord>, DbError> {
        let projects = sqlx::query_as::<_, ProjectRecord>(
            r#"
            SELECT * FROM projects
            WHERE tenant_id = $1 AND homeowner_id = $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(tenant_id)
        .bind(homeowner_id)
        .fetch_all(self.pool)
        .await?;
        Ok(projects)
    }

    pub async fn create(&self, tenant_id: Uuid, new: NewProject) -> Result<ProjectRecord, DbError> {
        let project = sqlx::query_as::<_, ProjectRecord>(
            r#"
            INSERT INTO projects
                (tenant_id, homeowner_id, name, description, address, status,
                 contract_amount_cents, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(new.homeowner_id)
        .bind(new.name)
        .bind(new.description)
        .bind(new.address)
        .bind(new.status.unwrap_or(ProjectStatus::Draft))
        .bind(new.contract_amount_cents)
        .bind(new.start_date)
        .bind(new.end_date)
        .fetch_one(self.pool)
        .await?;
        Ok(project)
    }

    /// Partial update. Moving into `completed` stamps `completed_at`.
    pub async fn update(&self, tenant_id: Uuid, id: Uuid, patch: ProjectPatch) -> Result<ProjectRecord, DbError> {
        sqlx::query_as::<_, ProjectRecord>(
            r#"
            UPDATE projects SET
                name = COALESCE($3, name),
                homeowner_id = CASE WHEN $4 THEN $5 ELSE homeowner_id END,
                description = CASE WHEN $6 THEN $7 ELSE description END,
                address = CASE WHEN $8 THEN $9 ELSE address END,
                status = COALESCE($10, status),
                contract_amount_cents = CASE WHEN $11 THEN $12 ELSE contract_amount_cents END,
                start_date = CASE WHEN $13 THEN $14 ELSE start_date END,
                end_date = CASE WHEN $15 THEN $16 ELSE end_date END,
                completed_at = CASE
                    WHEN $10 = 'completed'::project_status AND status <> 'completed' THEN NOW()
                    ELSE completed_at
                END,
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(patch.name)
        .bind(patch.homeowner_id.is_some())
        .bind(patch.homeowner_id.flatten())
        .bind(patch.description.is_some())
        .bind(patch.description.flatten())
        .bind(patch.address.is_some())
        .bind(patch.address.flatten())
        .bind(patch.status)
        .bind(patch.contract_amount_cents.is_some())
        .bind(patch.contract_amount_cents.flatten())
        .bind(patch.start_date.is_some())
        .bind(patch.start_date.flatten())
        .bind(patch.end_date.is_some())
        .bind(patch.end_date.flatten())
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("project", id))
    }

    pub async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("project", id));
        }
        Ok(())
    }

    pub async fn stats(&self, tenant_id: Uuid, id: Uuid) -> Result<ProjectStats, DbError> {
        let row = sqlx::query(
            r#"
            SELECT
                p.contract_amount_cents,
                (SELECT COUNT(*) FROM tasks t WHERE t.project_id = p.id) AS total_tasks,
                (SELECT COUNT(*) FROM tasks t WHERE t.project_id = p.id AND t.status = 'done') AS done_tasks,
                (SELECT COALESCE(SUM(i.total_cents), 0)::BIGINT
                   FROM invoices i WHERE i.project_id = p.id AND i.status <> 'void') AS invoiced,
                (SELECT COALESCE(SUM(i.paid_amount_cents), 0)::BIGINT
                   FROM invoices i WHERE i.project_id = p.id AND i.status = 'paid') AS paid
            FROM projects p
            WHERE p.id = $1 AND p.tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("project", id))?;

        let total: i64 = row.get("total_tasks");
        let completed: i64 = row.get("done_tasks");
        let contract: i64 = row.get::<Option<i64>, _>("contract_amount_cents").unwrap_or(0);
        let paid: i64 = row.get("paid");

        Ok(ProjectStats {
            tasks: TaskProgress {
                total,
                completed,
                progress: progress_percent(completed, total),
            },
            budget: BudgetSummary {
                contract_cents: contract,
                invoiced_cents: row.get("invoiced"),
                paid_cents: paid,
                remaining_cents: contract - paid,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_rounds() {
        assert_eq!(progress_percent(0, 0), 0);
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 67);
        assert_eq!(progress_percent(4, 4), 100);
    }

    #[test]
    fn patch_can_detach_homeowner() {
        let patch: ProjectPatch =
            serde_json::from_str(r#"{"homeowner_id": null, "status": "in_progress"}"#).unwrap();
        assert_eq!(patch.homeowner_id, Some(None));
        assert_eq!(patch.status, Some(ProjectStatus::InProgress));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn page_past_the_end_keeps_total() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = PgPool::connect(&url).await.unwrap();
        let tenant_id: Uuid = sqlx::query_scalar(
            "INSERT INTO tenants (name, slug) VALUES ('Paging Test', $1) RETURNING id",
        )
        .bind(format!("paging-{}", &Uuid::new_v4().simple().to_string()[..12]))
        .fetch_one(&pool)
        .await
        .unwrap();

        let repo = ProjectRepo::new(&pool);
        for name in ["Kitchen remodel", "Deck", "Garage"] {
            repo.create(
                tenant_id,
                NewProject {
                    name: name.into(),
                    homeowner_id: None,
                    description: None,
                    address: None,
                    status: None,
                    contract_amount_cents: None,
                    start_date: None,
                    end_date: None,
                },
            )
            .await
            .unwrap();
        }

        let past_end = repo
            .list(tenant_id, ProjectFilter::default(), Pagination::new(99, 20))
            .await
            .unwrap();
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.total, 3);
        assert_eq!(past_end.total_pages, 1);

        let first = repo
            .list(tenant_id, ProjectFilter::default(), Pagination::new(1, 2))
            .await
            .unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.total, 3);
        assert_eq!(first.total_pages, 2);
    }
}
