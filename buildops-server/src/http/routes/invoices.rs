//! `invoices.*` procedures: homeowner billing

use std::sync::Arc;

use axum::extract::State;
use axum::{routing::post, Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use super::{log_activity, IdInput, Refs, Success, UpdateInput};
use crate::db::repos::invoices::{InvoicePatch, NewInvoice};
use crate::db::repos::{InvoiceFilter, InvoiceRecord, InvoiceRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{Authed, Input};
use crate::models::{
    bounded_text, non_negative_cents, InvoiceStatus, Paginated, PaginationParams, ValidationError,
};
use crate::state::AppState;

const MAX_INVOICE_NUMBER: usize = 50;

#[derive(Debug, Default, Deserialize)]
pub struct ListInput {
    #[serde(flatten)]
    pub page: PaginationParams,
    pub status: Option<InvoiceStatus>,
    pub homeowner_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
}

/// POST /rpc/invoices.list
async fn list(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<ListInput>,
) -> Result<Json<Paginated<InvoiceRecord>>, ApiError> {
    let filter = InvoiceFilter {
        status: input.status,
        homeowner_id: input.homeowner_id,
        project_id: input.project_id,
    };
    let page = InvoiceRepo::new(&state.pool)
        .list(session.tenant.id, filter, input.page.into())
        .await?;
    Ok(Json(page))
}

/// POST /rpc/invoices.get
async fn get(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<IdInput>,
) -> Result<Json<InvoiceRecord>, ApiError> {
    let invoice = InvoiceRepo::new(&state.pool)
        .get(session.tenant.id, input.id)
        .await?;
    Ok(Json(invoice))
}

fn validate_new(new: NewInvoice) -> Result<NewInvoice, ValidationError> {
    Ok(NewInvoice {
        invoice_number: bounded_text("invoice number", &new.invoice_number, 1, MAX_INVOICE_NUMBER)?,
        total_cents: non_negative_cents("total", new.total_cents)?,
        ..new
    })
}

fn validate_patch(patch: InvoicePatch) -> Result<InvoicePatch, ValidationError> {
    Ok(InvoicePatch {
        invoice_number: patch
            .invoice_number
            .as_deref()
            .map(|n| bounded_text("invoice number", n, 1, MAX_INVOICE_NUMBER))
            .transpose()?,
        total_cents: patch
            .total_cents
            .map(|c| non_negative_cents("total", c))
            .transpose()?,
        ..patch
    })
}

/// POST /rpc/invoices.create
async fn create(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<NewInvoice>,
) -> Result<Json<InvoiceRecord>, ApiError> {
    let new = validate_new(input)?;
    Refs {
        homeowner: Some(new.homeowner_id),
        project: new.project_id,
        ..Default::default()
    }
    .check(&state, session.tenant.id)
    .await?;

    let invoice = InvoiceRepo::new(&state.pool)
        .create(session.tenant.id, new)
        .await?;
    log_activity(&state, &session, "invoice", "created", invoice.id).await;
    Ok(Json(invoice))
}

/// POST /rpc/invoices.update
async fn update(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<UpdateInput<InvoicePatch>>,
) -> Result<Json<InvoiceRecord>, ApiError> {
    let patch = validate_patch(input.data)?;
    Refs {
        project: patch.project_id.flatten(),
        ..Default::default()
    }
    .check(&state, session.tenant.id)
    .await?;

    let invoice = InvoiceRepo::new(&state.pool)
        .update(session.tenant.id, input.id, patch)
        .await?;
    log_activity(&state, &session, "invoice", "updated", invoice.id).await;
    Ok(Json(invoice))
}

#[derive(Debug, Deserialize)]
pub struct MarkPaidInput {
    pub id: Uuid,
    /// Defaults to the invoice total
    pub amount_cents: Option<i64>,
}

/// POST /rpc/invoices.mark_paid
async fn mark_paid(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<MarkPaidInput>,
) -> Result<Json<InvoiceRecord>, ApiError> {
    let amount = input
        .amount_cents
        .map(|c| non_negative_cents("paid amount", c))
        .transpose()?;
    let invoice = InvoiceRepo::new(&state.pool)
        .mark_paid(session.tenant.id, input.id, amount)
        .await?;
    log_activity(&state, &session, "invoice", "paid", invoice.id).await;
    Ok(Json(invoice))
}

/// POST /rpc/invoices.void
async fn void(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<IdInput>,
) -> Result<Json<InvoiceRecord>, ApiError> {
    let invoice = InvoiceRepo::new(&state.pool)
        .void(session.tenant.id, input.id)
        .await?;
    log_activity(&state, &session, "invoice", "voided", invoice.id).await;
    Ok(Json(invoice))
}

/// POST /rpc/invoices.delete
async fn delete(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<IdInput>,
) -> Result<Json<Success>, ApiError> {
    InvoiceRepo::new(&state.pool)
        .delete(session.tenant.id, input.id)
        .await?;
    log_activity(&state, &session, "invoice", "deleted", input.id).await;
    Ok(Json(Success::ok()))
}

/// Invoice routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rpc/invoices.list", post(list))
        .route("/rpc/invoices.get", post(get))
        .route("/rpc/invoices.create", post(create))
        .route("/rpc/invoices.update", post(update))
        .route("/rpc/invoices.mark_paid", post(mark_paid))
        .route("/rpc/invoices.void", post(void))
        .route("/rpc/invoices.delete", post(delete))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_invoice(number: &str, total: i64) -> NewInvoice {
        serde_json::from_value(serde_json::json!({
            "homeowner_id": "00000000-0000-0000-0000-000000000001",
            "invoice_number": number,
            "total_cents": total,
        }))
        .unwrap()
    }

    #[test]
    fn invoice_number_required() {
        assert!(matches!(
            validate_new(new_invoice("   ", 100)),
            Err(ValidationError::Empty { .. })
        ));
        assert_eq!(validate_new(new_invoice(" INV-001 ", 100)).unwrap().invoice_number, "INV-001");
    }

    #[test]
    fn negative_total_rejected() {
        assert!(validate_new(new_invoice("INV-002", -1)).is_err());
        let patch: InvoicePatch = serde_json::from_str(r#"{"total_cents": -10}"#).unwrap();
        assert!(validate_patch(patch).is_err());
    }

    #[test]
    fn mark_paid_amount_optional() {
        let input: MarkPaidInput =
            serde_json::from_str(r#"{"id": "00000000-0000-0000-0000-000000000001"}"#).unwrap();
        assert_eq!(input.amount_cents, None);
    }
}
