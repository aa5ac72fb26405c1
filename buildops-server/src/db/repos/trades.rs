//! Trade catalogue repository

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::DbError;
use crate::models::{double_option, TradeCategory};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TradeRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub category: TradeCategory,
    pub description: Option<String>,
    pub typical_duration_days: Option<i32>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Subcontractor that offers a trade
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TradeProvider {
    pub subcontractor_id: Uuid,
    pub company_name: String,
    pub is_primary: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeDetail {
    #[serde(flatten)]
    pub trade: TradeRecord,
    pub subcontractors: Vec<TradeProvider>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTrade {
    pub name: String,
    pub category: TradeCategory,
    pub description: Option<String>,
    pub typical_duration_days: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TradePatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub typical_duration_days: Option<Option<i32>>,
    pub sort_order: Option<i32>,
}

/// Trade repository
pub struct TradeRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> TradeRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Whole catalogue in display order.
    pub async fn list(&self, tenant_id: Uuid) -> Result<Vec<TradeRecord>, DbError> {
        let trades = sqlx::query_as::<_, TradeRecord>(
            "SELECT * FROM trades WHERE tenant_id = $1 ORDER BY sort_order ASC, name ASC",
        )
        .bind(tenant_id)
        .fetch_all(self.pool)
        .await?;
        Ok(trades)
    }

    pub async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<TradeDetail, DbError> {
        let trade = sqlx::query_as::<_, TradeRecord>(
            "SELECT * FROM trades WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("trade", id))?;

        let subcontractors = sqlx::query_as::<_, TradeProvider>(
            r#"
            SELECT st.subcontractor_id, s.company_name, st.is_primary
            FROM subcontractor_trades st
            JOIN subcontractors s ON s.id = st.subcontractor_id
            WHERE st.trade_id = $1
            ORDER BY s.company_name
            "#,
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(TradeDetail {
            trade,
            subcontractors,
        })
    }

    pub async fn exists(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, DbError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM trades WHERE id = $1 AND tenant_id = $2)",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn create(&self, tenant_id: Uuid, new: NewTrade) -> Result<TradeRecord, DbError> {
        let trade = sqlx::query_as::<_, TradeRecord>(
            r#"
            INSERT INTO trades (tenant_id, name, category, description, typical_duration_days)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(new.name)
        .bind(new.category)
        .bind(new.description)
        .bind(new.typical_duration_days)
        .fetch_one(self.pool)
        .await?;
        Ok(trade)
    }

    pub async fn update(&self, tenant_id: Uuid, id: Uuid, patch: TradePatch) -> Result<TradeRecord, DbError> {
        sqlx::query_as::<_, TradeRecord>(
            r#"
            UPDATE trades SET
                name = COALESCE($3, name),
                description = CASE WHEN $4 THEN $5 ELSE description END,
                typical_duration_days = CASE WHEN $6 THEN $7 ELSE typical_duration_days END,
                sort_order = COALESCE($8, sort_order),
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(patch.name)
        .bind(patch.description.is_some())
        .bind(patch.description.flatten())
        .bind(patch.typical_duration_days.is_some())
        .bind(patch.typical_duration_days.flatten())
        .bind(patch.sort_order)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("trade", id))
    }

    pub async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM trades WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("trade", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trade_requires_category() {
        let err = serde_json::from_str::<NewTrade>(r#"{"name": "Framing"}"#);
        assert!(err.is_err());

        let trade: NewTrade =
            serde_json::from_str(r#"{"name": "Framing", "category": "framing"}"#).unwrap();
        assert_eq!(trade.category, TradeCategory::Framing);
    }
}
