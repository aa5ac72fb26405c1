//! Aggregate queries behind the dashboard

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use super::{enum_texts, DbError};
use crate::models::{ProjectStatus, TaskPriority, TaskStatus};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DashboardStats {
    pub total_homeowners: i64,
    pub active_projects: i64,
    pub completed_projects: i64,
    pub pending_tasks: i64,
    pub revenue_cents: i64,
    pub pending_payments_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: &'static str,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyRevenue {
    pub month: String,
    pub revenue_cents: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TaskDeadline {
    pub id: Uuid,
    pub title: String,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: TaskPriority,
    pub project_id: Uuid,
    pub project_name: String,
    pub assignee_id: Option<Uuid>,
    pub assignee_name: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProjectDeadline {
    pub id: Uuid,
    pub name: String,
    pub end_date: Option<DateTime<Utc>>,
    pub status: ProjectStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpcomingDeadlines {
    pub tasks: Vec<TaskDeadline>,
    pub projects: Vec<ProjectDeadline>,
}

/// Pair every known status with its count, in declaration order.
fn zero_fill(
    statuses: impl IntoIterator<Item = &'static str>,
    counts: &HashMap<String, i64>,
) -> Vec<StatusCount> {
    statuses
        .into_iter()
        .map(|status| StatusCount {
            status,
            count: counts.get(status).copied().unwrap_or(0),
        })
        .collect()
}

/// `YYYY-MM` keys for the `months` calendar months ending with `today`'s.
pub fn month_keys(today: NaiveDate, months: u32) -> Vec<String> {
    let current = today.year() * 12 + today.month0() as i32;
    (0..months as i32)
        .rev()
        .map(|back| {
            let m = current - back;
            format!("{:04}-{:02}", m.div_euclid(12), m.rem_euclid(12) + 1)
        })
        .collect()
}

/// First day of the oldest month in `month_keys(today, months)`.
fn window_start(today: NaiveDate, months: u32) -> Option<NaiveDate> {
    let first = today.with_day(1)?;
    first.checked_sub_months(chrono::Months::new(months.saturating_sub(1)))
}

/// Dashboard repository
pub struct DashboardRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> DashboardRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn stats(&self, tenant_id: Uuid) -> Result<DashboardStats, DbError> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM homeowners WHERE tenant_id = $1) AS homeowners,
                (SELECT COUNT(*) FROM projects WHERE tenant_id = $1 AND status::text = ANY($2)) AS active,
                (SELECT COUNT(*) FROM projects WHERE tenant_id = $1 AND status = 'completed') AS completed,
                (SELECT COUNT(*) FROM tasks t JOIN projects p ON p.id = t.project_id
                   WHERE p.tenant_id = $1 AND t.status::text = ANY($3)) AS pending_tasks,
                (SELECT COALESCE(SUM(paid_amount_cents), 0)::BIGINT FROM invoices
                   WHERE tenant_id = $1 AND status = 'paid') AS revenue,
                (SELECT COALESCE(SUM(GREATEST(total_cents - paid_amount_cents, 0)), 0)::BIGINT FROM invoices
                   WHERE tenant_id = $1 AND status = 'open') AS pending
            "#,
        )
        .bind(tenant_id)
        .bind(enum_texts(ProjectStatus::ACTIVE))
        .bind(enum_texts(TaskStatus::PENDING))
        .fetch_one(self.pool)
        .await?;

        Ok(DashboardStats {
            total_homeowners: row.try_get("homeowners")?,
            active_projects: row.try_get("active")?,
            completed_projects: row.try_get("completed")?,
            pending_tasks: row.try_get("pending_tasks")?,
            revenue_cents: row.try_get("revenue")?,
            pending_payments_cents: row.try_get("pending")?,
        })
    }

    pub async fn projects_by_status(&self, tenant_id: Uuid) -> Result<Vec<StatusCount>, DbError> {
        let counts = self
            .grouped(
                "SELECT status::text AS key, COUNT(*) AS n FROM projects WHERE tenant_id = $1 GROUP BY status",
                tenant_id,
            )
            .await?;
        Ok(zero_fill(ProjectStatus::ALL.iter().map(ProjectStatus::as_str), &counts))
    }

    pub async fn tasks_by_status(&self, tenant_id: Uuid) -> Result<Vec<StatusCount>, DbError> {
        let counts = self
            .grouped(
                r#"
                SELECT t.status::text AS key, COUNT(*) AS n
                FROM tasks t JOIN projects p ON p.id = t.project_id
                WHERE p.tenant_id = $1
                GROUP BY t.status
                "#,
                tenant_id,
            )
            .await?;
        Ok(zero_fill(TaskStatus::ALL.iter().map(TaskStatus::as_str), &counts))
    }

    async fn grouped(&self, sql: &str, tenant_id: Uuid) -> Result<HashMap<String, i64>, DbError> {
        let rows = sqlx::query(sql).bind(tenant_id).fetch_all(self.pool).await?;
        rows.iter()
            .map(|r| Ok((r.try_get::<String, _>("key")?, r.try_get::<i64, _>("n")?)))
            .collect::<Result<HashMap<_, _>, sqlx::Error>>()
            .map_err(DbError::from)
    }

    /// Paid invoice totals per calendar month, oldest first, zero-filled.
    pub async fn revenue_over_time(&self, tenant_id: Uuid, months: u32) -> Result<Vec<MonthlyRevenue>, DbError> {
        let today = Utc::now().date_naive();
        let keys = month_keys(today, months);
        let Some(start) = window_start(today, months) else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(
            r#"
            SELECT to_char(paid_at AT TIME ZONE 'UTC', 'YYYY-MM') AS month,
                   COALESCE(SUM(paid_amount_cents), 0)::BIGINT AS revenue
            FROM invoices
            WHERE tenant_id = $1 AND status = 'paid' AND paid_at >= $2
            GROUP BY 1
            "#,
        )
        .bind(tenant_id)
        .bind(start.and_hms_opt(0, 0, 0).map(|d| d.and_utc()))
        .fetch_all(self.pool)
        .await?;

        let by_month = rows
            .iter()
            .map(|r| Ok((r.try_get::<String, _>("month")?, r.try_get::<i64, _>("revenue")?)))
            .collect::<Result<HashMap<_, _>, sqlx::Error>>()?;

        Ok(keys
            .into_iter()
            .map(|month| {
                let revenue_cents = by_month.get(&month).copied().unwrap_or(0);
                MonthlyRevenue { month, revenue_cents }
            })
            .collect())
    }

    /// Next open tasks and active projects by due/end date from now.
    pub async fn upcoming_deadlines(&self, tenant_id: Uuid, limit: i64) -> Result<UpcomingDeadlines, DbError> {
        let tasks = sqlx::query_as::<_, TaskDeadline>(
            r#"
            SELECT t.id, t.title, t.due_date, t.priority,
                   p.id AS project_id, p.name AS project_name,
                   u.id AS assignee_id, u.name AS assignee_name
            FROM tasks t
            JOIN projects p ON p.id = t.project_id
            LEFT JOIN users u ON u.id = t.assignee_id
            WHERE p.tenant_id = $1 AND t.status::text = ANY($2) AND t.due_date >= NOW()
            ORDER BY t.due_date ASC
            LIMIT $3
            "#,
        )
        .bind(tenant_id)
        .bind(enum_texts(TaskStatus::PENDING))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        let projects = sqlx::query_as::<_, ProjectDeadline>(
            r#"
            SELECT id, name, end_date, status
            FROM projects
            WHERE tenant_id = $1 AND status::text = ANY($2) AND end_date >= NOW()
            ORDER BY end_date ASC
            LIMIT $3
            "#,
        )
        .bind(tenant_id)
        .bind(enum_texts(ProjectStatus::ACTIVE))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(UpcomingDeadlines { tasks, projects })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_keys_cross_year_boundary() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 14).unwrap();
        assert_eq!(
            month_keys(today, 6),
            ["2025-09", "2025-10", "2025-11", "2025-12", "2026-01", "2026-02"]
        );
    }

    #[test]
    fn window_starts_on_first_of_oldest_month() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 14).unwrap();
        assert_eq!(window_start(today, 6), NaiveDate::from_ymd_opt(2025, 9, 1));
    }

    #[test]
    fn zero_fill_lists_every_status() {
        let counts = HashMap::from([("done".to_owned(), 4), ("todo".to_owned(), 1)]);
        let filled = zero_fill(TaskStatus::ALL.iter().map(TaskStatus::as_str), &counts);
        assert_eq!(filled.len(), TaskStatus::ALL.len());
        assert_eq!(filled[0], StatusCount { status: "backlog", count: 0 });
        assert_eq!(filled.iter().find(|s| s.status == "done").unwrap().count, 4);
    }
}
