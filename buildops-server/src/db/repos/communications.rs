//! Communication repository: calls, texts and emails with their transcripts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use super::{enum_texts, fetch_page, search_pattern, DbError};
use crate::models::{
    double_option, CommunicationStatus, CommunicationType, Paginated, Pagination, Sentiment,
};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CommunicationRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: CommunicationType,
    pub status: CommunicationStatus,
    pub homeowner_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub subcontractor_id: Option<Uuid>,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
    pub from_email: Option<String>,
    pub to_email: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub duration_seconds: Option<i32>,
    pub recording_url: Option<String>,
    pub ai_summary: Option<String>,
    pub requires_follow_up: bool,
    pub followed_up_at: Option<DateTime<Utc>>,
    pub created_by_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TranscriptionRecord {
    pub id: Uuid,
    pub communication_id: Uuid,
    pub speaker: String,
    pub text: String,
    pub confidence: Option<f64>,
    pub start_seconds: Option<f64>,
    pub end_seconds: Option<f64>,
    pub sentiment: Option<Sentiment>,
    pub keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Communication with the names of whatever it is linked to
#[derive(Debug, Clone, Serialize)]
pub struct CommunicationWithRefs {
    #[serde(flatten)]
    pub communication: CommunicationRecord,
    pub project_name: Option<String>,
    pub homeowner_name: Option<String>,
    pub subcontractor_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommunicationDetail {
    #[serde(flatten)]
    pub communication: CommunicationWithRefs,
    pub transcriptions: Vec<TranscriptionRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCommunication {
    #[serde(rename = "type")]
    pub kind: CommunicationType,
    pub status: Option<CommunicationStatus>,
    pub homeowner_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub subcontractor_id: Option<Uuid>,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
    pub from_email: Option<String>,
    pub to_email: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub duration_seconds: Option<i32>,
    pub recording_url: Option<String>,
    pub ai_summary: Option<String>,
    #[serde(default)]
    pub requires_follow_up: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommunicationPatch {
    pub status: Option<CommunicationStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub homeowner_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub project_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub subcontractor_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub subject: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub body: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub ai_summary: Option<Option<String>>,
    pub requires_follow_up: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTranscription {
    pub speaker: String,
    pub text: String,
    pub confidence: Option<f64>,
    pub start_seconds: Option<f64>,
    pub end_seconds: Option<f64>,
    pub sentiment: Option<Sentiment>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CommunicationFilter {
    pub kind: Option<CommunicationType>,
    pub status: Option<CommunicationStatus>,
    /// Only `urgent` rows when true
    pub urgent: bool,
    pub project_id: Option<Uuid>,
    pub homeowner_id: Option<Uuid>,
    pub subcontractor_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

/// Counts since midnight (database time) plus the open urgent queue
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CommunicationStats {
    pub calls_today: i64,
    pub sms_today: i64,
    pub missed_calls_today: i64,
    pub urgent_pending: i64,
}

const WITH_REFS: &str = r#"
    SELECT
        c.*,
        p.name AS project_name,
        NULLIF(CONCAT_WS(' ', h.first_name, h.last_name), '') AS homeowner_name,
        s.company_name AS subcontractor_name
    FROM communications c
    LEFT JOIN projects p ON p.id = c.project_id
    LEFT JOIN homeowners h ON h.id = c.homeowner_id
    LEFT JOIN subcontractors s ON s.id = c.subcontractor_id
"#;

fn with_refs(row: &sqlx::postgres::PgRow) -> Result<CommunicationWithRefs, sqlx::Error> {
    Ok(CommunicationWithRefs {
        communication: CommunicationRecord::from_row(row)?,
        project_name: row.try_get("project_name")?,
        homeowner_name: row.try_get("homeowner_name")?,
        subcontractor_name: row.try_get("subcontractor_name")?,
    })
}

/// Communication repository
pub struct CommunicationRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> CommunicationRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Newest first. Returns the page and the tenant-wide urgent count.
    pub async fn list(
        &self,
        tenant_id: Uuid,
        filter: CommunicationFilter,
        page: Pagination,
    ) -> Result<(Paginated<CommunicationWithRefs>, i64), DbError> {
        let sql = format!(
            r#"
            SELECT *, COUNT(*) OVER() AS total FROM ({WITH_REFS}
                WHERE c.tenant_id = $1
                  AND ($2::communication_type IS NULL OR c.type = $2)
                  AND ($3::communication_status IS NULL OR c.status = $3)
                  AND (NOT $4 OR c.status = 'urgent')
                  AND ($5::uuid IS NULL OR c.project_id = $5)
                  AND ($6::uuid IS NULL OR c.homeowner_id = $6)
                  AND ($7::uuid IS NULL OR c.subcontractor_id = $7)
                  AND ($8::timestamptz IS NULL OR c.created_at >= $8)
                  AND ($9::timestamptz IS NULL OR c.created_at <= $9)
                  AND ($10::text IS NULL OR c.body ILIKE $10 OR c.from_number ILIKE $10
                       OR c.to_number ILIKE $10 OR c.from_email ILIKE $10
                       OR c.to_email ILIKE $10 OR c.ai_summary ILIKE $10)
            ) scoped
            ORDER BY created_at DESC
            LIMIT $11 OFFSET $12
            "#
        );
        let pattern = search_pattern(filter.search.as_deref());
        let (rows, total) = fetch_page(&page, |limit, offset| {
            sqlx::query(&sql)
                .bind(tenant_id)
                .bind(filter.kind)
                .bind(filter.status)
                .bind(filter.urgent)
                .bind(filter.project_id)
                .bind(filter.homeowner_id)
                .bind(filter.subcontractor_id)
                .bind(filter.start_date)
                .bind(filter.end_date)
                .bind(pattern.clone())
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool)
        })
        .await?;

        let items = rows
            .iter()
            .map(with_refs)
            .collect::<Result<Vec<_>, _>>()?;

        let urgent: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM communications WHERE tenant_id = $1 AND status = 'urgent'",
        )
        .bind(tenant_id)
        .fetch_one(self.pool)
        .await?;

        Ok((page.wrap(items, total), urgent))
    }

    pub async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<CommunicationDetail, DbError> {
        let sql = format!("{WITH_REFS} WHERE c.id = $1 AND c.tenant_id = $2");
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("communication", id))?;
        let communication = with_refs(&row)?;

        let transcriptions = sqlx::query_as::<_, TranscriptionRecord>(
            r#"
            SELECT * FROM call_transcriptions
            WHERE communication_id = $1
            ORDER BY start_seconds ASC NULLS LAST, created_at ASC
            "#,
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(CommunicationDetail {
            communication,
            transcriptions,
        })
    }

    pub async fn exists(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, DbError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM communications WHERE id = $1 AND tenant_id = $2)",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    /// Latest communications linked to a homeowner.
    pub async fn recent_for_homeowner(
        &self,
        tenant_id: Uuid,
        homeowner_id: Uuid,
        limit: i64,
    ) -> Result<Vec<CommunicationRecord>, DbError> {
        let rows = sqlx::query_as::<_, CommunicationRecord>(
            r#"
            SELECT * FROM communications
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
        Ok(rows)
    }

    /// Latest communications linked to a subcontractor.
    pub async fn recent_for_subcontractor(
        &self,
        tenant_id: Uuid,
        subcontractor_id: Uuid,
        limit: i64,
    ) -> Result<Vec<CommunicationRecord>, DbError> {
        let rows = sqlx::query_as::<_, CommunicationRecord>(
            r#"
            SELECT * FROM communications
            WHERE tenant_id = $1 AND subcontractor_id = $2
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(tenant_id)
        .bind(subcontractor_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn create(
        &self,
        tenant_id: Uuid,
        created_by: Uuid,
        new: NewCommunication,
    ) -> Result<CommunicationRecord, DbError> {
        let communication = sqlx::query_as::<_, CommunicationRecord>(
            r#"
            INSERT INTO communications
                (tenant_id, type, status, homeowner_id, project_id, subcontractor_id,
                 from_number, to_number, from_email, to_email, subject, body,
                 duration_seconds, recording_url, ai_summary, requires_follow_up, created_by_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(new.kind)
        .bind(new.status.unwrap_or(CommunicationStatus::Completed))
        .bind(new.homeowner_id)
        .bind(new.project_id)
        .bind(new.subcontractor_id)
        .bind(new.from_number)
        .bind(new.to_number)
        .bind(new.from_email)
        .bind(new.to_email)
        .bind(new.subject)
        .bind(new.body)
        .bind(new.duration_seconds)
        .bind(new.recording_url)
        .bind(new.ai_summary)
        .bind(new.requires_follow_up)
        .bind(created_by)
        .fetch_one(self.pool)
        .await?;
        Ok(communication)
    }

    pub async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        patch: CommunicationPatch,
    ) -> Result<CommunicationRecord, DbError> {
        sqlx::query_as::<_, CommunicationRecord>(
            r#"
            UPDATE communications SET
                status = COALESCE($3, status),
                homeowner_id = CASE WHEN $4 THEN $5 ELSE homeowner_id END,
                project_id = CASE WHEN $6 THEN $7 ELSE project_id END,
                subcontractor_id = CASE WHEN $8 THEN $9 ELSE subcontractor_id END,
                subject = CASE WHEN $10 THEN $11 ELSE subject END,
                body = CASE WHEN $12 THEN $13 ELSE body END,
                ai_summary = CASE WHEN $14 THEN $15 ELSE ai_summary END,
                requires_follow_up = COALESCE($16, requires_follow_up),
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(patch.status)
        .bind(patch.homeowner_id.is_some())
        .bind(patch.homeowner_id.flatten())
        .bind(patch.project_id.is_some())
        .bind(patch.project_id.flatten())
        .bind(patch.subcontractor_id.is_some())
        .bind(patch.subcontractor_id.flatten())
        .bind(patch.subject.is_some())
        .bind(patch.subject.flatten())
        .bind(patch.body.is_some())
        .bind(patch.body.flatten())
        .bind(patch.ai_summary.is_some())
        .bind(patch.ai_summary.flatten())
        .bind(patch.requires_follow_up)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("communication", id))
    }

    pub async fn mark_followed_up(&self, tenant_id: Uuid, id: Uuid) -> Result<CommunicationRecord, DbError> {
        sqlx::query_as::<_, CommunicationRecord>(
            r#"
            UPDATE communications SET
                status = 'completed',
                followed_up_at = NOW(),
                requires_follow_up = FALSE,
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("communication", id))
    }

    /// Append a transcript segment. The caller checks tenant ownership first.
    pub async fn add_transcription(
        &self,
        communication_id: Uuid,
        new: NewTranscription,
    ) -> Result<TranscriptionRecord, DbError> {
        let segment = sqlx::query_as::<_, TranscriptionRecord>(
            r#"
            INSERT INTO call_transcriptions
                (communication_id, speaker, text, confidence, start_seconds, end_seconds, sentiment, keywords)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(communication_id)
        .bind(new.speaker)
        .bind(new.text)
        .bind(new.confidence)
        .bind(new.start_seconds)
        .bind(new.end_seconds)
        .bind(new.sentiment)
        .bind(new.keywords)
        .fetch_one(self.pool)
        .await?;
        Ok(segment)
    }

    pub async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM communications WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("communication", id));
        }
        Ok(())
    }

    pub async fn stats(&self, tenant_id: Uuid) -> Result<CommunicationStats, DbError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE created_at >= date_trunc('day', NOW())
                                   AND type::text = ANY($2)) AS calls,
                COUNT(*) FILTER (WHERE created_at >= date_trunc('day', NOW())
                                   AND type::text = ANY($3)) AS sms,
                COUNT(*) FILTER (WHERE created_at >= date_trunc('day', NOW())
                                   AND type = 'call_missed') AS missed,
                COUNT(*) FILTER (WHERE status = 'urgent') AS urgent
            FROM communications
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .bind(enum_texts(CommunicationType::CALLS))
        .bind(enum_texts(CommunicationType::SMS))
        .fetch_one(self.pool)
        .await?;

        Ok(CommunicationStats {
            calls_today: row.try_get("calls")?,
            sms_today: row.try_get("sms")?,
            missed_calls_today: row.try_get("missed")?,
            urgent_pending: row.try_get("urgent")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_communication_reads_type_field() {
        let new: NewCommunication = serde_json::from_str(
            r#"{"type": "call_missed", "from_number": "+15125550100"}"#,
        )
        .unwrap();
        assert_eq!(new.kind, CommunicationType::CallMissed);
        assert!(!new.requires_follow_up);
        assert!(new.status.is_none());
    }

    #[test]
    fn transcription_keywords_default_empty() {
        let segment: NewTranscription =
            serde_json::from_str(r#"{"speaker": "caller", "text": "The roof is leaking"}"#).unwrap();
        assert!(segment.keywords.is_empty());
        assert!(segment.sentiment.is_none());
    }
}
