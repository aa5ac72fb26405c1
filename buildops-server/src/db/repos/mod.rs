//! Repository implementations for database access
//!
//! Each repository borrows the pool (`XRepo::new(&pool)`) and takes the
//! caller's tenant id as an explicit argument on tenant-scoped methods.

pub mod activity;
pub mod billing;
pub mod clients;
pub mod communications;
pub mod dashboard;
pub mod homeowners;
pub mod invitations;
pub mod invoices;
pub mod projects;
pub mod sessions;
pub mod subcontractors;
pub mod tasks;
pub mod tenants;
pub mod trades;
pub mod users;
pub mod verification;

pub use activity::{ActivityEntry, ActivityRepo, NewActivity};
pub use billing::{BillingRepo, PlanLimits, PlanRecord, SubscriptionRecord};
pub use clients::{ClientFilter, ClientRecord, ClientRepo};
pub use communications::{CommunicationFilter, CommunicationRecord, CommunicationRepo, TranscriptionRecord};
pub use dashboard::DashboardRepo;
pub use homeowners::{HomeownerFilter, HomeownerRecord, HomeownerRepo, HomeownerWithCount};
pub use invitations::{InvitationRecord, InvitationRepo};
pub use invoices::{InvoiceFilter, InvoiceRecord, InvoiceRepo};
pub use projects::{ProjectFilter, ProjectRecord, ProjectRepo, ProjectWithHomeowner};
pub use sessions::SessionRepo;
pub use subcontractors::{SubcontractorFilter, SubcontractorRecord, SubcontractorRepo, TradeLink};
pub use tasks::{TaskFilter, TaskRecord, TaskRepo, TaskWithRefs};
pub use tenants::{NewWorkspace, TenantPatch, TenantRecord, TenantRepo, TenantUsage};
pub use trades::{TradeRecord, TradeRepo};
pub use users::{UserRecord, UserRepo};
pub use verification::{VerificationRepo, VerificationToken};

use std::future::Future;

use sqlx::postgres::PgRow;

use crate::models::Pagination;

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    /// A unique constraint rejected the write
    #[error("conflict: {constraint}")]
    Conflict { constraint: String },
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return Self::Conflict {
                    constraint: db.constraint().unwrap_or("unique").to_owned(),
                };
            }
        }
        Self::Sqlx(e)
    }
}

impl DbError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}

/// Read the `total` column written by `COUNT(*) OVER()`; `None` without rows.
fn window_total(rows: &[PgRow]) -> Option<i64> {
    use sqlx::Row;
    rows.first().and_then(|r| r.try_get::<i64, _>("total").ok())
}

/// Run a list query for one page and read its `COUNT(*) OVER()` total.
///
/// `fetch(limit, offset)` must issue the same filtered query each time. A
/// page past the end has no rows to carry the window count, so the query is
/// reissued for the first row only and the total read from that.
pub(crate) async fn fetch_page<F, Fut>(page: &Pagination, fetch: F) -> Result<(Vec<PgRow>, i64), DbError>
where
    F: Fn(i64, i64) -> Fut,
    Fut: Future<Output = Result<Vec<PgRow>, sqlx::Error>>,
{
    let rows = fetch(page.limit(), page.offset()).await?;
    let total = match window_total(&rows) {
        Some(total) => total,
        None if page.offset() > 0 => window_total(&fetch(1, 0).await?).unwrap_or(0),
        None => 0,
    };
    Ok((rows, total))
}

/// Build a `%term%` pattern for ILIKE search; blank terms disable the filter.
pub(crate) fn search_pattern(term: Option<&str>) -> Option<String> {
    term.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            let escaped = t.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
            format!("%{escaped}%")
        })
}

/// Render enum filters as text for `col::text = ANY($n)` comparisons.
pub(crate) fn enum_texts<T: AsRef<str>>(values: &[T]) -> Vec<String> {
    values.iter().map(|v| v.as_ref().to_owned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_pattern_escapes_wildcards() {
        assert_eq!(search_pattern(Some("  ")), None);
        assert_eq!(search_pattern(None), None);
        assert_eq!(search_pattern(Some("Smith")).as_deref(), Some("%Smith%"));
        assert_eq!(search_pattern(Some("50%_off")).as_deref(), Some("%50\\%\\_off%"));
    }

    #[tokio::test]
    async fn past_end_page_recounts_from_the_start() {
        use std::cell::RefCell;

        let calls = RefCell::new(Vec::new());
        let fetch = |limit: i64, offset: i64| {
            calls.borrow_mut().push((limit, offset));
            async { Ok::<Vec<PgRow>, sqlx::Error>(Vec::new()) }
        };

        let (rows, total) = fetch_page(&Pagination::new(99, 20), &fetch).await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(total, 0);
        assert_eq!(*calls.borrow(), [(20, 1960), (1, 0)]);

        calls.borrow_mut().clear();
        fetch_page(&Pagination::new(1, 20), &fetch).await.unwrap();
        assert_eq!(*calls.borrow(), [(20, 0)]);
    }

    #[test]
    fn not_found_display() {
        let err = DbError::not_found("project", "abc");
        assert_eq!(err.to_string(), "not found: project 'abc'");
    }
}
