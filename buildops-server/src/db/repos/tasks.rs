//! Task repository
//!
//! Tasks have no tenant column; every query reaches the tenant through
//! `projects.tenant_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use super::{fetch_page, DbError};
use crate::models::{double_option, Paginated, Pagination, TaskPriority, TaskStatus};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TaskRecord {
    pub id: Uuid,
    pub project_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub subcontractor_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub sort_order: i32,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Task with the names a board view shows alongside it
#[derive(Debug, Clone, Serialize)]
pub struct TaskWithRefs {
    #[serde(flatten)]
    pub task: TaskRecord,
    pub project_name: String,
    pub assignee_name: Option<String>,
    pub subcontractor_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Uuid>,
    pub subcontractor_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    #[serde(default, deserialize_with = "double_option")]
    pub assignee_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub subcontractor_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub estimated_hours: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub actual_hours: Option<Option<f64>>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub project_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub subcontractor_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
}

const TASK_WITH_REFS: &str = r#"
    SELECT
        t.*,
        p.name AS project_name,
        u.name AS assignee_name,
        s.company_name AS subcontractor_name
    FROM tasks t
    JOIN projects p ON p.id = t.project_id
    LEFT JOIN users u ON u.id = t.assignee_id
    LEFT JOIN subcontractors s ON s.id = t.subcontractor_id
"#;

fn task_with_refs(row: &sqlx::postgres::PgRow) -> Result<TaskWithRefs, sqlx::Error> {
    Ok(TaskWithRefs {
        task: TaskRecord::from_row(row)?,
        project_name: row.try_get("project_name")?,
        assignee_name: row.try_get("assignee_name")?,
        subcontractor_name: row.try_get("subcontractor_name")?,
    })
}

/// Task repository
pub struct TaskRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> TaskRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        tenant_id: Uuid,
        filter: TaskFilter,
        page: Pagination,
    ) -> Result<Paginated<TaskWithRefs>, DbError> {
        let sql = format!(
            r#"
            SELECT *, COUNT(*) OVER() AS total FROM ({TASK_WITH_REFS}
                WHERE p.tenant_id = $1
                  AND ($2::uuid IS NULL OR t.project_id = $2)
                  AND ($3::uuid IS NULL OR t.assignee_id = $3)
                  AND ($4::uuid IS NULL OR t.subcontractor_id = $4)
                  AND ($5::task_status IS NULL OR t.status = $5)
                  AND ($6::task_priority IS NULL OR t.priority = $6)
            ) scoped
            ORDER BY sort_order ASC, created_at DESC
            LIMIT $7 OFFSET $8
            "#
        );
        let (rows, total) = fetch_page(&page, |limit, offset| {
            sqlx::query(&sql)
                .bind(tenant_id)
                .bind(filter.project_id)
                .bind(filter.assignee_id)
                .bind(filter.subcontractor_id)
                .bind(filter.status)
                .bind(filter.priority)
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool)
        })
        .await?;

        let items = rows
            .iter()
            .map(task_with_refs)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(page.wrap(items, total))
    }

    pub async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<TaskWithRefs, DbError> {
        let sql = format!("{TASK_WITH_REFS} WHERE t.id = $1 AND p.tenant_id = $2");
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("task", id))?;
        Ok(task_with_refs(&row)?)
    }

    /// Tasks of one project in board order.
    pub async fn for_project(&self, tenant_id: Uuid, project_id: Uuid) -> Result<Vec<TaskRecord>, DbError> {
        let tasks = sqlx::query_as::<_, TaskRecord>(
            r#"
            SELECT t.* FROM tasks t
            JOIN projects p ON p.id = t.project_id
            WHERE t.project_id = $1 AND p.tenant_id = $2
            ORDER BY t.sort_order ASC, t.created_at DESC
            "#,
        )
        .bind(project_id)
        .bind(tenant_id)
        .fetch_all(self.pool)
        .await?;
        Ok(tasks)
    }

    /// Open tasks assigned to a subcontractor.
    pub async fn active_for_subcontractor(
        &self,
        tenant_id: Uuid,
        subcontractor_id: Uuid,
        limit: i64,
    ) -> Result<Vec<TaskRecord>, DbError> {
        let tasks = sqlx::query_as::<_, TaskRecord>(
            r#"
            SELECT t.* FROM tasks t
            JOIN projects p ON p.id = t.project_id
            WHERE t.subcontractor_id = $1 AND p.tenant_id = $2 AND t.status = 'in_progress'
            ORDER BY t.due_date ASC NULLS LAST
            LIMIT $3
            "#,
        )
        .bind(subcontractor_id)
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(tasks)
    }

    /// Append a task to the end of its project's board.
    ///
    /// The caller has already checked that the project, assignee and
    /// subcontractor belong to the tenant.
    pub async fn create(&self, new: NewTask) -> Result<TaskRecord, DbError> {
        let mut tx = self.pool.begin().await?;

        // Lock the project row so concurrent creates get distinct sort orders
        sqlx::query("SELECT id FROM projects WHERE id = $1 FOR UPDATE")
            .bind(new.project_id)
            .execute(&mut *tx)
            .await?;

        let next_order: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(sort_order), 0) + 1 FROM tasks WHERE project_id = $1",
        )
        .bind(new.project_id)
        .fetch_one(&mut *tx)
        .await?;

        let status = new.status.unwrap_or(TaskStatus::Todo);
        let task = sqlx::query_as::<_, TaskRecord>(
            r#"
            INSERT INTO tasks
                (project_id, title, description, status, priority, assignee_id,
                 subcontractor_id, due_date, estimated_hours, sort_order, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    CASE WHEN $4 = 'done'::task_status THEN NOW() END)
            RETURNING *
            "#,
        )
        .bind(new.project_id)
        .bind(new.title)
        .bind(new.description)
        .bind(status)
        .bind(new.priority.unwrap_or(TaskPriority::Medium))
        .bind(new.assignee_id)
        .bind(new.subcontractor_id)
        .bind(new.due_date)
        .bind(new.estimated_hours)
        .bind(next_order)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(task)
    }

    /// Partial update. `done` stamps `completed_at`; any other status clears it.
    pub async fn update(&self, tenant_id: Uuid, id: Uuid, patch: TaskPatch) -> Result<TaskRecord, DbError> {
        sqlx::query_as::<_, TaskRecord>(
            r#"
            UPDATE tasks t SET
                title = COALESCE($3, t.title),
                description = CASE WHEN $4 THEN $5 ELSE t.description END,
                status = COALESCE($6, t.status),
                priority = COALESCE($7, t.priority),
                assignee_id = CASE WHEN $8 THEN $9 ELSE t.assignee_id END,
                subcontractor_id = CASE WHEN $10 THEN $11 ELSE t.subcontractor_id END,
                due_date = CASE WHEN $12 THEN $13 ELSE t.due_date END,
                estimated_hours = CASE WHEN $14 THEN $15 ELSE t.estimated_hours END,
                actual_hours = CASE WHEN $16 THEN $17 ELSE t.actual_hours END,
                completed_at = CASE
                    WHEN $6 IS NULL THEN t.completed_at
                    WHEN $6 = 'done'::task_status THEN COALESCE(t.completed_at, NOW())
                    ELSE NULL
                END,
                updated_at = NOW()
            FROM projects p
            WHERE t.id = $1 AND p.id = t.project_id AND p.tenant_id = $2
            RETURNING t.*
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(patch.title)
        .bind(patch.description.is_some())
        .bind(patch.description.flatten())
        .bind(patch.status)
        .bind(patch.priority)
        .bind(patch.assignee_id.is_some())
        .bind(patch.assignee_id.flatten())
        .bind(patch.subcontractor_id.is_some())
        .bind(patch.subcontractor_id.flatten())
        .bind(patch.due_date.is_some())
        .bind(patch.due_date.flatten())
        .bind(patch.estimated_hours.is_some())
        .bind(patch.estimated_hours.flatten())
        .bind(patch.actual_hours.is_some())
        .bind(patch.actual_hours.flatten())
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("task", id))
    }

    /// Set the status of every listed task that belongs to the tenant.
    ///
    /// Ids of other tenants are silently skipped. Returns how many changed.
    pub async fn bulk_update_status(&self, tenant_id: Uuid, ids: &[Uuid], status: TaskStatus) -> Result<u64, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE tasks t SET
                status = $3,
                completed_at = CASE WHEN $3 = 'done'::task_status THEN COALESCE(t.completed_at, NOW()) ELSE NULL END,
                updated_at = NOW()
            FROM projects p
            WHERE t.id = ANY($1) AND p.id = t.project_id AND p.tenant_id = $2
            "#,
        )
        .bind(ids)
        .bind(tenant_id)
        .bind(status)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn reorder(&self, tenant_id: Uuid, id: Uuid, sort_order: i32) -> Result<(), DbError> {
        let result = sqlx::query(
            r#"
            UPDATE tasks t SET sort_order = $3, updated_at = NOW()
            FROM projects p
            WHERE t.id = $1 AND p.id = t.project_id AND p.tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(sort_order)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("task", id));
        }
        Ok(())
    }

    pub async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query(
            r#"
            DELETE FROM tasks t
            USING projects p
            WHERE t.id = $1 AND p.id = t.project_id AND p.tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("task", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_parses_status_and_clears() {
        let patch: TaskPatch = serde_json::from_str(
            r#"{"status": "done", "assignee_id": null, "actual_hours": 6.5}"#,
        )
        .unwrap();
        assert_eq!(patch.status, Some(TaskStatus::Done));
        assert_eq!(patch.assignee_id, Some(None));
        assert_eq!(patch.actual_hours, Some(Some(6.5)));
        assert!(patch.title.is_none());
    }

    #[test]
    fn new_task_defaults_are_optional() {
        let new: NewTask = serde_json::from_str(&format!(
            r#"{{"project_id": "{}", "title": "Pour foundation"}}"#,
            Uuid::nil()
        ))
        .unwrap();
        assert!(new.status.is_none());
        assert!(new.priority.is_none());
    }
}
