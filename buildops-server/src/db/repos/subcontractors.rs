//! Subcontractor repository and the subcontractor ↔ trade links

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{fetch_page, search_pattern, DbError};
use crate::models::{double_option, Paginated, Pagination, SubcontractorStatus, TradeCategory};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SubcontractorRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub company_name: String,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub license_number: Option<String>,
    pub insurance_expires_at: Option<DateTime<Utc>>,
    pub insurance_coverage_cents: Option<i64>,
    pub status: SubcontractorStatus,
    pub rating: Option<f64>,
    pub on_time_percentage: Option<f64>,
    pub quality_score: Option<f64>,
    pub total_projects_completed: i32,
    pub primary_trade_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One trade a subcontractor offers
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TradeLink {
    pub subcontractor_id: Uuid,
    pub trade_id: Uuid,
    pub trade_name: String,
    pub category: TradeCategory,
    pub is_primary: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubcontractorWithTrades {
    #[serde(flatten)]
    pub subcontractor: SubcontractorRecord,
    pub trades: Vec<TradeLink>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSubcontractor {
    pub company_name: String,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub license_number: Option<String>,
    pub insurance_expires_at: Option<DateTime<Utc>>,
    pub insurance_coverage_cents: Option<i64>,
    pub primary_trade_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubcontractorPatch {
    pub company_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub contact_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub contact_email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub contact_phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub license_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub insurance_expires_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub insurance_coverage_cents: Option<Option<i64>>,
    pub status: Option<SubcontractorStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

/// Scores from a rating review. Unset optional scores keep their value.
#[derive(Debug, Clone, Copy)]
pub struct Rating {
    pub rating: f64,
    pub on_time_percentage: Option<f64>,
    pub quality_score: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct SubcontractorFilter {
    pub status: Option<SubcontractorStatus>,
    pub trade_id: Option<Uuid>,
    pub search: Option<String>,
}

/// Subcontractor repository
pub struct SubcontractorRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> SubcontractorRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Best rated first, then newest. Each row carries its trades.
    pub async fn list(
        &self,
        tenant_id: Uuid,
        filter: SubcontractorFilter,
        page: Pagination,
    ) -> Result<Paginated<SubcontractorWithTrades>, DbError> {
        let pattern = search_pattern(filter.search.as_deref());
        let (rows, total) = fetch_page(&page, |limit, offset| {
            sqlx::query(
                r#"
                SELECT s.*, COUNT(*) OVER() AS total
                FROM subcontractors s
                WHERE s.tenant_id = $1
                  AND ($2::subcontractor_status IS NULL OR s.status = $2)
                  AND ($3::uuid IS NULL OR EXISTS (
                        SELECT 1 FROM subcontractor_trades st
                        WHERE st.subcontractor_id = s.id AND st.trade_id = $3))
                  AND ($4::text IS NULL OR s.company_name ILIKE $4 OR s.contact_name ILIKE $4
                       OR s.contact_email ILIKE $4 OR s.license_number ILIKE $4)
                ORDER BY s.rating DESC NULLS LAST, s.created_at DESC
                LIMIT $5 OFFSET $6
                "#,
            )
            .bind(tenant_id)
            .bind(filter.status)
            .bind(filter.trade_id)
            .bind(pattern.clone())
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
        })
        .await?;

        let subcontractors = rows
            .iter()
            .map(SubcontractorRecord::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let ids: Vec<Uuid> = subcontractors.iter().map(|s| s.id).collect();
        let mut links = self.trades_for(&ids).await?;

        let items = subcontractors
            .into_iter()
            .map(|subcontractor| {
                let (mine, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut links)
                    .into_iter()
                    .partition(|l| l.subcontractor_id == subcontractor.id);
                links = rest;
                SubcontractorWithTrades {
                    subcontractor,
                    trades: mine,
                }
            })
            .collect();
        Ok(page.wrap(items, total))
    }

    pub async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<SubcontractorWithTrades, DbError> {
        let subcontractor = self.get_record(tenant_id, id).await?;
        let trades = self.trades_for(&[id]).await?;
        Ok(SubcontractorWithTrades {
            subcontractor,
            trades,
        })
    }

    async fn get_record(&self, tenant_id: Uuid, id: Uuid) -> Result<SubcontractorRecord, DbError> {
        sqlx::query_as::<_, SubcontractorRecord>(
            "SELECT * FROM subcontractors WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("subcontractor", id))
    }

    pub async fn exists(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, DbError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM subcontractors WHERE id = $1 AND tenant_id = $2)",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    async fn trades_for(&self, ids: &[Uuid]) -> Result<Vec<TradeLink>, DbError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let links = sqlx::query_as::<_, TradeLink>(
            r#"
            SELECT st.subcontractor_id, st.trade_id, t.name AS trade_name, t.category, st.is_primary
            FROM subcontractor_trades st
            JOIN trades t ON t.id = st.trade_id
            WHERE st.subcontractor_id = ANY($1)
            ORDER BY st.is_primary DESC, t.sort_order, t.name
            "#,
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;
        Ok(links)
    }

    /// Insert an `active` subcontractor. A primary trade is linked in the same transaction.
    pub async fn create(&self, tenant_id: Uuid, new: NewSubcontractor) -> Result<SubcontractorRecord, DbError> {
        let mut tx = self.pool.begin().await?;

        let subcontractor = sqlx::query_as::<_, SubcontractorRecord>(
            r#"
            INSERT INTO subcontractors
                (tenant_id, company_name, contact_name, contact_email, contact_phone, license_number,
                 insurance_expires_at, insurance_coverage_cents, primary_trade_id, notes, status,
                 total_projects_completed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'active', 0)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(new.company_name)
        .bind(new.contact_name)
        .bind(new.contact_email)
        .bind(new.contact_phone)
        .bind(new.license_number)
        .bind(new.insurance_expires_at)
        .bind(new.insurance_coverage_cents)
        .bind(new.primary_trade_id)
        .bind(new.notes)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(trade_id) = new.primary_trade_id {
            sqlx::query(
                "INSERT INTO subcontractor_trades (subcontractor_id, trade_id, is_primary) VALUES ($1, $2, TRUE)",
            )
            .bind(subcontractor.id)
            .bind(trade_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(subcontractor)
    }

    pub async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        patch: SubcontractorPatch,
    ) -> Result<SubcontractorRecord, DbError> {
        sqlx::query_as::<_, SubcontractorRecord>(
            r#"
            UPDATE subcontractors SET
                company_name = COALESCE($3, company_name),
                contact_name = CASE WHEN $4 THEN $5 ELSE contact_name END,
                contact_email = CASE WHEN $6 THEN $7 ELSE contact_email END,
                contact_phone = CASE WHEN $8 THEN $9 ELSE contact_phone END,
                license_number = CASE WHEN $10 THEN $11 ELSE license_number END,
                insurance_expires_at = CASE WHEN $12 THEN $13 ELSE insurance_expires_at END,
                insurance_coverage_cents = CASE WHEN $14 THEN $15 ELSE insurance_coverage_cents END,
                status = COALESCE($16, status),
                notes = CASE WHEN $17 THEN $18 ELSE notes END,
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(patch.company_name)
        .bind(patch.contact_name.is_some())
        .bind(patch.contact_name.flatten())
        .bind(patch.contact_email.is_some())
        .bind(patch.contact_email.flatten())
        .bind(patch.contact_phone.is_some())
        .bind(patch.contact_phone.flatten())
        .bind(patch.license_number.is_some())
        .bind(patch.license_number.flatten())
        .bind(patch.insurance_expires_at.is_some())
        .bind(patch.insurance_expires_at.flatten())
        .bind(patch.insurance_coverage_cents.is_some())
        .bind(patch.insurance_coverage_cents.flatten())
        .bind(patch.status)
        .bind(patch.notes.is_some())
        .bind(patch.notes.flatten())
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("subcontractor", id))
    }

    pub async fn update_rating(&self, tenant_id: Uuid, id: Uuid, rating: Rating) -> Result<SubcontractorRecord, DbError> {
        sqlx::query_as::<_, SubcontractorRecord>(
            r#"
            UPDATE subcontractors SET
                rating = $3,
                on_time_percentage = COALESCE($4, on_time_percentage),
                quality_score = COALESCE($5, quality_score),
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(rating.rating)
        .bind(rating.on_time_percentage)
        .bind(rating.quality_score)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("subcontractor", id))
    }

    pub async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM subcontractors WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("subcontractor", id));
        }
        Ok(())
    }

    /// Link a trade. A primary link also becomes the subcontractor's primary trade.
    ///
    /// The caller has checked that both rows belong to the tenant. Linking the
    /// same trade twice is a `Conflict`.
    pub async fn add_trade(&self, subcontractor_id: Uuid, trade_id: Uuid, is_primary: bool) -> Result<TradeLink, DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO subcontractor_trades (subcontractor_id, trade_id, is_primary) VALUES ($1, $2, $3)",
        )
        .bind(subcontractor_id)
        .bind(trade_id)
        .bind(is_primary)
        .execute(&mut *tx)
        .await?;

        if is_primary {
            sqlx::query(
                r#"
                UPDATE subcontractor_trades SET is_primary = FALSE
                WHERE subcontractor_id = $1 AND trade_id <> $2
                "#,
            )
            .bind(subcontractor_id)
            .bind(trade_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE subcontractors SET primary_trade_id = $2, updated_at = NOW() WHERE id = $1")
                .bind(subcontractor_id)
                .bind(trade_id)
                .execute(&mut *tx)
                .await?;
        }

        let link = sqlx::query_as::<_, TradeLink>(
            r#"
            SELECT st.subcontractor_id, st.trade_id, t.name AS trade_name, t.category, st.is_primary
            FROM subcontractor_trades st
            JOIN trades t ON t.id = st.trade_id
            WHERE st.subcontractor_id = $1 AND st.trade_id = $2
            "#,
        )
        .bind(subcontractor_id)
        .bind(trade_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(link)
    }

    /// Unlink a trade. Removing the primary trade also clears `primary_trade_id`.
    pub async fn remove_trade(&self, tenant_id: Uuid, subcontractor_id: Uuid, trade_id: Uuid) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            DELETE FROM subcontractor_trades st
            USING subcontractors s
            WHERE st.subcontractor_id = $1 AND st.trade_id = $2
              AND s.id = st.subcontractor_id AND s.tenant_id = $3
            "#,
        )
        .bind(subcontractor_id)
        .bind(trade_id)
        .bind(tenant_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("trade link", trade_id));
        }

        sqlx::query(
            r#"
            UPDATE subcontractors SET primary_trade_id = NULL, updated_at = NOW()
            WHERE id = $1 AND primary_trade_id = $2
            "#,
        )
        .bind(subcontractor_id)
        .bind(trade_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_allows_clearing_insurance() {
        let patch: SubcontractorPatch = serde_json::from_str(
            r#"{"insurance_expires_at": null, "status": "preferred"}"#,
        )
        .unwrap();
        assert_eq!(patch.insurance_expires_at, Some(None));
        assert_eq!(patch.status, Some(SubcontractorStatus::Preferred));
        assert!(patch.company_name.is_none());
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn primary_trade_is_linked_on_create() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let pool = PgPool::connect(&url).await.unwrap();
        let tenant_id: Uuid = sqlx::query_scalar(
            "INSERT INTO tenants (name, slug) VALUES ('Sub Test', $1) RETURNING id",
        )
        .bind(format!("sub-test-{}", Uuid::new_v4().simple()))
        .fetch_one(&pool)
        .await
        .unwrap();
        let trade_id: Uuid = sqlx::query_scalar(
            "INSERT INTO trades (tenant_id, name, category) VALUES ($1, 'Roofing', 'roofing') RETURNING id",
        )
        .bind(tenant_id)
        .fetch_one(&pool)
        .await
        .unwrap();

        let repo = SubcontractorRepo::new(&pool);
        let sub = repo
            .create(
                tenant_id,
                NewSubcontractor {
                    company_name: "Top Roofing".into(),
                    contact_name: None,
                    contact_email: None,
                    contact_phone: None,
                    license_number: None,
                    insurance_expires_at: None,
                    insurance_coverage_cents: None,
                    primary_trade_id: Some(trade_id),
                    notes: None,
                },
            )
            .await
            .unwrap();

        let detail = repo.get(tenant_id, sub.id).await.unwrap();
        assert_eq!(detail.trades.len(), 1);
        assert!(detail.trades[0].is_primary);
        assert_eq!(detail.subcontractor.status, SubcontractorStatus::Active);

        sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(tenant_id)
            .execute(&pool)
            .await
            .unwrap();
    }
}
