//! Homeowner repository

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use super::{fetch_page, search_pattern, DbError};
use crate::models::{double_option, HomeownerStatus, Paginated, Pagination};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct HomeownerRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub status: HomeownerStatus,
    pub contract_signed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Homeowner with project count for list display
#[derive(Debug, Clone, Serialize)]
pub struct HomeownerWithCount {
    #[serde(flatten)]
    pub homeowner: HomeownerRecord,
    pub project_count: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewHomeowner {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub notes: Option<String>,
}

/// Partial update. Nullable fields accept `null` to clear.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HomeownerPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub city: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub state: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub zip_code: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct HomeownerFilter {
    pub status: Option<HomeownerStatus>,
    pub search: Option<String>,
}

/// Money summary for one homeowner
#[derive(Debug, Clone, Copy, Serialize)]
pub struct HomeownerStats {
    pub total_projects: i64,
    pub total_contract_value_cents: i64,
    pub total_invoiced_cents: i64,
    pub total_paid_cents: i64,
    pub balance_due_cents: i64,
}

/// Homeowner repository
pub struct HomeownerRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> HomeownerRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List homeowners with project counts, newest first.
    pub async fn list(
        &self,
        tenant_id: Uuid,
        filter: HomeownerFilter,
        page: Pagination,
    ) -> Result<Paginated<HomeownerWithCount>, DbError> {
        let pattern = search_pattern(filter.search.as_deref());
        let (rows, total) = fetch_page(&page, |limit, offset| {
            sqlx::query(
                r#"
                SELECT
                    h.*,
                    (SELECT COUNT(*) FROM projects p WHERE p.homeowner_id = h.id) AS project_count,
                    COUNT(*) OVER() AS total
                FROM homeowners h
                WHERE h.tenant_id = $1
                  AND ($2::homeowner_status IS NULL OR h.status = $2)
                  AND ($3::text IS NULL OR h.first_name ILIKE $3 OR h.last_name ILIKE $3
                       OR h.email ILIKE $3 OR h.phone ILIKE $3)
                ORDER BY h.created_at DESC
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
            .map(|r| {
                Ok(HomeownerWithCount {
                    homeowner: HomeownerRecord::from_row(r)?,
                    project_count: r.try_get("project_count")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(page.wrap(items, total))
    }

    pub async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<HomeownerRecord, DbError> {
        sqlx::query_as::<_, HomeownerRecord>(
            "SELECT * FROM homeowners WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("homeowner", id))
    }

    /// Check that a homeowner belongs to the tenant.
    pub async fn exists(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, DbError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM homeowners WHERE id = $1 AND tenant_id = $2)",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn create(&self, tenant_id: Uuid, new: NewHomeowner) -> Result<HomeownerRecord, DbError> {
        let homeowner = sqlx::query_as::<_, HomeownerRecord>(
            r#"
            INSERT INTO homeowners
                (tenant_id, first_name, last_name, email, phone, address, city, state, zip_code, notes, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'inquiry')
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(new.first_name)
        .bind(new.last_name)
        .bind(new.email)
        .bind(new.phone)
        .bind(new.address)
        .bind(new.city)
        .bind(new.state)
        .bind(new.zip_code)
        .bind(new.notes)
        .fetch_one(self.pool)
        .await?;
        Ok(homeowner)
    }

    pub async fn update(&self, tenant_id: Uuid, id: Uuid, patch: HomeownerPatch) -> Result<HomeownerRecord, DbError> {
        sqlx::query_as::<_, HomeownerRecord>(
            r#"
            UPDATE homeowners SET
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                email = CASE WHEN $5 THEN $6 ELSE email END,
                phone = CASE WHEN $7 THEN $8 ELSE phone END,
                address = CASE WHEN $9 THEN $10 ELSE address END,
                city = CASE WHEN $11 THEN $12 ELSE city END,
                state = CASE WHEN $13 THEN $14 ELSE state END,
                zip_code = CASE WHEN $15 THEN $16 ELSE zip_code END,
                notes = CASE WHEN $17 THEN $18 ELSE notes END,
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(patch.first_name)
        .bind(patch.last_name)
        .bind(patch.email.is_some())
        .bind(patch.email.flatten())
        .bind(patch.phone.is_some())
        .bind(patch.phone.flatten())
        .bind(patch.address.is_some())
        .bind(patch.address.flatten())
        .bind(patch.city.is_some())
        .bind(patch.city.flatten())
        .bind(patch.state.is_some())
        .bind(patch.state.flatten())
        .bind(patch.zip_code.is_some())
        .bind(patch.zip_code.flatten())
        .bind(patch.notes.is_some())
        .bind(patch.notes.flatten())
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("homeowner", id))
    }

    /// Change pipeline status. Entering `contracted` stamps the signing date once.
    pub async fn update_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        status: HomeownerStatus,
    ) -> Result<HomeownerRecord, DbError> {
        sqlx::query_as::<_, HomeownerRecord>(
            r#"
            UPDATE homeowners SET
                status = $3,
                contract_signed_at = CASE
                    WHEN $3 = 'contracted'::homeowner_status AND contract_signed_at IS NULL THEN NOW()
                    ELSE contract_signed_at
                END,
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(status)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("homeowner", id))
    }

    pub async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM homeowners WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("homeowner", id));
        }
        Ok(())
    }

    /// Contract and invoice totals. Void invoices are excluded.
    pub async fn stats(&self, tenant_id: Uuid, id: Uuid) -> Result<HomeownerStats, DbError> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM projects p WHERE p.homeowner_id = h.id) AS total_projects,
                (SELECT COALESCE(SUM(p.contract_amount_cents), 0)::BIGINT
                   FROM projects p WHERE p.homeowner_id = h.id) AS contract_value,
                (SELECT COALESCE(SUM(i.total_cents), 0)::BIGINT
                   FROM invoices i WHERE i.homeowner_id = h.id AND i.status <> 'void') AS invoiced,
                (SELECT COALESCE(SUM(i.paid_amount_cents), 0)::BIGINT
                   FROM invoices i WHERE i.homeowner_id = h.id AND i.status = 'paid') AS paid
            FROM homeowners h
            WHERE h.id = $1 AND h.tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("homeowner", id))?;

        let invoiced: i64 = row.get("invoiced");
        let paid: i64 = row.get("paid");
        Ok(HomeownerStats {
            total_projects: row.get("total_projects"),
            total_contract_value_cents: row.get("contract_value"),
            total_invoiced_cents: invoiced,
            total_paid_cents: paid,
            balance_due_cents: invoiced - paid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_distinguishes_null_from_absent() {
        let patch: HomeownerPatch =
            serde_json::from_str(r#"{"first_name": "Rosa", "phone": null}"#).unwrap();
        assert_eq!(patch.first_name.as_deref(), Some("Rosa"));
        assert_eq!(patch.phone, Some(None));
        assert_eq!(patch.email, None);
    }

    #[test]
    fn list_row_serializes_flat() {
        let now = Utc::now();
        let row = HomeownerWithCount {
            homeowner: HomeownerRecord {
                id: Uuid::nil(),
                tenant_id: Uuid::nil(),
                first_name: "Rosa".into(),
                last_name: "Garza".into(),
                email: None,
                phone: None,
                address: None,
                city: None,
                state: None,
                zip_code: None,
                status: HomeownerStatus::Inquiry,
                contract_signed_at: None,
                notes: None,
                created_at: now,
                updated_at: now,
            },
            project_count: 2,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["first_name"], "Rosa");
        assert_eq!(json["project_count"], 2);
        assert_eq!(json["status"], "inquiry");
    }
}
