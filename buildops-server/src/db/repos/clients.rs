//! Agency client repository

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{fetch_page, search_pattern, DbError};
use crate::models::{double_option, ClientStatus, Paginated, Pagination};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ClientRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub company_name: String,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub notes: Option<String>,
    pub status: ClientStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewClient {
    pub company_name: String,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub notes: Option<String>,
}

/// Partial update; `company_name`, `contact_name` and `email` cannot be cleared.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientPatch {
    pub company_name: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub website: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub industry: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct ClientFilter {
    pub status: Option<ClientStatus>,
    pub search: Option<String>,
}

pub struct ClientRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> ClientRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Newest first; search matches company, contact or email.
    pub async fn list(
        &self,
        tenant_id: Uuid,
        filter: ClientFilter,
        page: Pagination,
    ) -> Result<Paginated<ClientRecord>, DbError> {
        let pattern = search_pattern(filter.search.as_deref());
        let (rows, total) = fetch_page(&page, |limit, offset| {
            sqlx::query(
                r#"
                SELECT c.*, COUNT(*) OVER() AS total
                FROM clients c
                WHERE c.tenant_id = $1
                  AND ($2::client_status IS NULL OR c.status = $2)
                  AND ($3::text IS NULL OR c.company_name ILIKE $3 OR c.contact_name ILIKE $3
                       OR c.email ILIKE $3)
                ORDER BY c.created_at DESC
                LIMIT $4 OFFSET $5
                "#,
            )
            .bind(tenant_id)
            .bind(filter.status)
            .bind(pattern.clone())
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
        })
        .await?;

        let items = rows
            .iter()
            .map(ClientRecord::from_row)
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(page.wrap(items, total))
    }

    pub async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<ClientRecord, DbError> {
        sqlx::query_as::<_, ClientRecord>("SELECT * FROM clients WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("client", id))
    }

    pub async fn create(&self, tenant_id: Uuid, new: NewClient) -> Result<ClientRecord, DbError> {
        let client = sqlx::query_as::<_, ClientRecord>(
            r#"
            INSERT INTO clients
                (tenant_id, company_name, contact_name, email, phone, website, industry, notes, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'lead')
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(new.company_name)
        .bind(new.contact_name)
        .bind(new.email)
        .bind(new.phone)
        .bind(new.website)
        .bind(new.industry)
        .bind(new.notes)
        .fetch_one(self.pool)
        .await?;
        Ok(client)
    }

    pub async fn update(&self, tenant_id: Uuid, id: Uuid, patch: ClientPatch) -> Result<ClientRecord, DbError> {
        sqlx::query_as::<_, ClientRecord>(
            r#"
            UPDATE clients SET
                company_name = COALESCE($3, company_name),
                contact_name = COALESCE($4, contact_name),
                email = COALESCE($5, email),
                phone = CASE WHEN $6 THEN $7 ELSE phone END,
                website = CASE WHEN $8 THEN $9 ELSE website END,
                industry = CASE WHEN $10 THEN $11 ELSE industry END,
                notes = CASE WHEN $12 THEN $13 ELSE notes END,
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(patch.company_name)
        .bind(patch.contact_name)
        .bind(patch.email)
        .bind(patch.phone.is_some())
        .bind(patch.phone.flatten())
        .bind(patch.website.is_some())
        .bind(patch.website.flatten())
        .bind(patch.industry.is_some())
        .bind(patch.industry.flatten())
        .bind(patch.notes.is_some())
        .bind(patch.notes.flatten())
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("client", id))
    }

    pub async fn update_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        status: ClientStatus,
    ) -> Result<ClientRecord, DbError> {
        sqlx::query_as::<_, ClientRecord>(
            r#"
            UPDATE clients SET status = $3, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(status)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("client", id))
    }

    pub async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("client", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_clears_optional_fields_only() {
        let patch: ClientPatch =
            serde_json::from_str(r#"{"company_name": "Acme", "website": null}"#).unwrap();
        assert_eq!(patch.company_name.as_deref(), Some("Acme"));
        assert_eq!(patch.website, Some(None));
        assert_eq!(patch.industry, None);

        let rejected = serde_json::from_str::<ClientPatch>(r#"{"email": 5}"#);
        assert!(rejected.is_err());
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn clients_stay_inside_their_workspace() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = PgPool::connect(&url).await.unwrap();
        let mut tenants = Vec::new();
        for name in ["Clients A", "Clients B"] {
            let id: Uuid = sqlx::query_scalar(
                "INSERT INTO tenants (name, slug) VALUES ($1, $2) RETURNING id",
            )
            .bind(name)
            .bind(format!("clients-{}", &Uuid::new_v4().simple().to_string()[..12]))
            .fetch_one(&pool)
            .await
            .unwrap();
            tenants.push(id);
        }
        let (ours, theirs) = (tenants[0], tenants[1]);

        let repo = ClientRepo::new(&pool);
        let acme = repo
            .create(
                ours,
                NewClient {
                    company_name: "Acme Roofing".into(),
                    contact_name: "Dana Ruiz".into(),
                    email: "dana@acme.test".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(acme.status, ClientStatus::Lead);

        let found = repo
            .list(
                ours,
                ClientFilter {
                    search: Some("ACME".into()),
                    ..Default::default()
                },
                Pagination::new(1, 20),
            )
            .await
            .unwrap();
        assert_eq!(found.total, 1);

        let active = repo.update_status(ours, acme.id, ClientStatus::Active).await.unwrap();
        assert_eq!(active.status, ClientStatus::Active);

        assert!(matches!(
            repo.get(theirs, acme.id).await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            repo.delete(theirs, acme.id).await,
            Err(DbError::NotFound { .. })
        ));
        repo.delete(ours, acme.id).await.unwrap();
    }
}
