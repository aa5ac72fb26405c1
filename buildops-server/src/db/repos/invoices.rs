//! Homeowner invoice repository

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{fetch_page, DbError};
use crate::models::{double_option, InvoiceStatus, Paginated, Pagination};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct InvoiceRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub homeowner_id: Uuid,
    pub project_id: Option<Uuid>,
    pub invoice_number: String,
    pub total_cents: i64,
    pub paid_amount_cents: i64,
    pub status: InvoiceStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InvoiceRecord {
    pub fn balance_cents(&self) -> i64 {
        (self.total_cents - self.paid_amount_cents).max(0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInvoice {
    pub homeowner_id: Uuid,
    pub project_id: Option<Uuid>,
    pub invoice_number: String,
    pub total_cents: i64,
    pub due_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoicePatch {
    pub invoice_number: Option<String>,
    pub total_cents: Option<i64>,
    pub status: Option<InvoiceStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub project_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub homeowner_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
}

/// Invoice repository
pub struct InvoiceRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> InvoiceRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        tenant_id: Uuid,
        filter: InvoiceFilter,
        page: Pagination,
    ) -> Result<Paginated<InvoiceRecord>, DbError> {
        let (rows, total) = fetch_page(&page, |limit, offset| {
            sqlx::query(
                r#"
                SELECT *, COUNT(*) OVER() AS total
                FROM invoices
                WHERE tenant_id = $1
                  AND ($2::invoice_status IS NULL OR status = $2)
                  AND ($3::uuid IS NULL OR homeowner_id = $3)
                  AND ($4::uuid IS NULL OR project_id = $4)
                ORDER BY created_at DESC
                LIMIT $5 OFFSET $6
                "#,
            )
            .bind(tenant_id)
            .bind(filter.status)
            .bind(filter.homeowner_id)
            .bind(filter.project_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
        })
        .await?;

        let items = rows
            .iter()
            .map(InvoiceRecord::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(page.wrap(items, total))
    }

    pub async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<InvoiceRecord, DbError> {
        sqlx::query_as::<_, InvoiceRecord>("SELECT * FROM invoices WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("invoice", id))
    }

    pub async fn recent_for_homeowner(
        &self,
        tenant_id: Uuid,
        homeowner_id: Uuid,
        limit: i64,
    ) -> Result<Vec<InvoiceRecord>, DbError> {
        let invoices = sqlx::query_as::<_, InvoiceRecord>(
            r#"
            SELECT * FROM invoices
            WHERE tenant_id = $1 AND homeowner_id = $2
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(tenant_id)
        .bind(homeowner_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(invoices)
    }

    /// New invoices start as `draft`. A reused number is a `Conflict`.
    pub async fn create(&self, tenant_id: Uuid, new: NewInvoice) -> Result<InvoiceRecord, DbError> {
        let invoice = sqlx::query_as::<_, InvoiceRecord>(
            r#"
            INSERT INTO invoices (tenant_id, homeowner_id, project_id, invoice_number, total_cents, due_date, notes, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'draft')
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(new.homeowner_id)
        .bind(new.project_id)
        .bind(new.invoice_number)
        .bind(new.total_cents)
        .bind(new.due_date)
        .bind(new.notes)
        .fetch_one(self.pool)
        .await?;
        Ok(invoice)
    }

    pub async fn update(&self, tenant_id: Uuid, id: Uuid, patch: InvoicePatch) -> Result<InvoiceRecord, DbError> {
        sqlx::query_as::<_, InvoiceRecord>(
            r#"
            UPDATE invoices SET
                invoice_number = COALESCE($3, invoice_number),
                total_cents = COALESCE($4, total_cents),
                status = COALESCE($5, status),
                project_id = CASE WHEN $6 THEN $7 ELSE project_id END,
                due_date = CASE WHEN $8 THEN $9 ELSE due_date END,
                notes = CASE WHEN $10 THEN $11 ELSE notes END,
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(patch.invoice_number)
        .bind(patch.total_cents)
        .bind(patch.status)
        .bind(patch.project_id.is_some())
        .bind(patch.project_id.flatten())
        .bind(patch.due_date.is_some())
        .bind(patch.due_date.flatten())
        .bind(patch.notes.is_some())
        .bind(patch.notes.flatten())
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("invoice", id))
    }

    /// Record payment. Without an explicit amount the invoice is paid in full.
    pub async fn mark_paid(&self, tenant_id: Uuid, id: Uuid, amount_cents: Option<i64>) -> Result<InvoiceRecord, DbError> {
        sqlx::query_as::<_, InvoiceRecord>(
            r#"
            UPDATE invoices SET
                status = 'paid',
                paid_amount_cents = COALESCE($3, total_cents),
                paid_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(amount_cents)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("invoice", id))
    }

    pub async fn void(&self, tenant_id: Uuid, id: Uuid) -> Result<InvoiceRecord, DbError> {
        sqlx::query_as::<_, InvoiceRecord>(
            r#"
            UPDATE invoices SET status = 'void', updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("invoice", id))
    }

    pub async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM invoices WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("invoice", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice(total: i64, paid: i64) -> InvoiceRecord {
        let now = Utc::now();
        InvoiceRecord {
            id: Uuid::nil(),
            tenant_id: Uuid::nil(),
            homeowner_id: Uuid::nil(),
            project_id: None,
            invoice_number: "INV-1001".into(),
            total_cents: total,
            paid_amount_cents: paid,
            status: InvoiceStatus::Open,
            due_date: None,
            paid_at: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn balance_never_negative() {
        assert_eq!(invoice(50_000, 20_000).balance_cents(), 30_000);
        assert_eq!(invoice(50_000, 60_000).balance_cents(), 0);
    }

    #[test]
    fn patch_status_parses() {
        let patch: InvoicePatch = serde_json::from_str(r#"{"status": "open", "notes": null}"#).unwrap();
        assert_eq!(patch.status, Some(InvoiceStatus::Open));
        assert_eq!(patch.notes, Some(None));
    }
}
