//! Activity log repository

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use super::DbError;

/// One entry to append, named `<entity>.<verb>`
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub entity_type: &'static str,
    pub entity_id: Option<Uuid>,
    pub metadata: Value,
}

impl NewActivity {
    pub fn new(tenant_id: Uuid, user_id: Uuid, entity_type: &'static str, verb: &str, entity_id: Uuid) -> Self {
        Self {
            tenant_id,
            user_id: Some(user_id),
            action: format!("{entity_type}.{verb}"),
            entity_type,
            entity_id: Some(entity_id),
            metadata: Value::Object(Default::default()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityActor {
    pub id: Uuid,
    pub name: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub metadata: Value,
    pub user: Option<ActivityActor>,
    pub created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ActivityRow {
    id: Uuid,
    action: String,
    entity_type: String,
    entity_id: Option<Uuid>,
    metadata: Value,
    created_at: DateTime<Utc>,
}

/// Activity repository
pub struct ActivityRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> ActivityRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, entry: NewActivity) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO activity_logs (tenant_id, user_id, action, entity_type, entity_id, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.tenant_id)
        .bind(entry.user_id)
        .bind(&entry.action)
        .bind(entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.metadata)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Append an entry; failures are logged and swallowed.
    pub async fn record(&self, entry: NewActivity) {
        let action = entry.action.clone();
        if let Err(e) = self.insert(entry).await {
            tracing::warn!(action = %action, error = %e, "failed to record activity");
        }
    }

    /// Latest entries with the acting user, newest first.
    pub async fn recent(&self, tenant_id: Uuid, limit: i64) -> Result<Vec<ActivityEntry>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.action, a.entity_type, a.entity_id, a.metadata, a.created_at,
                   u.id AS user_id, u.name AS user_name, u.avatar AS user_avatar
            FROM activity_logs a
            LEFT JOIN users u ON u.id = a.user_id
            WHERE a.tenant_id = $1
            ORDER BY a.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        let entries = rows
            .iter()
            .map(|r| {
                let base = ActivityRow::from_row(r)?;
                let user = match r.try_get::<Option<Uuid>, _>("user_id")? {
                    Some(id) => Some(ActivityActor {
                        id,
                        name: r.try_get("user_name")?,
                        avatar: r.try_get("user_avatar")?,
                    }),
                    None => None,
                };
                Ok(ActivityEntry {
                    id: base.id,
                    action: base.action,
                    entity_type: base.entity_type,
                    entity_id: base.entity_id,
                    metadata: base.metadata,
                    user,
                    created_at: base.created_at,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_name_is_entity_dot_verb() {
        let entry = NewActivity::new(Uuid::nil(), Uuid::nil(), "homeowner", "created", Uuid::nil());
        assert_eq!(entry.action, "homeowner.created");
        assert_eq!(entry.entity_type, "homeowner");
        assert!(entry.metadata.as_object().is_some_and(|m| m.is_empty()));
    }
}
