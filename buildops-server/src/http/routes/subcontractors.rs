//! `subcontractors.*` procedures

use std::sync::Arc;

use axum::extract::State;
use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{log_activity, IdInput, Success, UpdateInput};
use crate::db::repos::subcontractors::{
    NewSubcontractor, Rating, SubcontractorPatch, SubcontractorWithTrades,
};
use crate::db::repos::{
    CommunicationRecord, CommunicationRepo, SubcontractorFilter, SubcontractorRecord,
    SubcontractorRepo, TaskRecord, TaskRepo, TradeLink, TradeRepo,
};
use crate::http::error::ApiError;
use crate::http::extractors::{Authed, Input};
use crate::models::{
    in_range, non_negative_cents, optional_email, optional_name, DisplayName, Paginated,
    PaginationParams, SubcontractorStatus, ValidationError,
};
use crate::state::AppState;

const ACTIVE_TASK_LIMIT: i64 = 5;
const RECENT_COMMUNICATION_LIMIT: i64 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct ListInput {
    #[serde(flatten)]
    pub page: PaginationParams,
    pub status: Option<SubcontractorStatus>,
    pub trade_id: Option<Uuid>,
    pub search: Option<String>,
}

/// POST /rpc/subcontractors.list
async fn list(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<ListInput>,
) -> Result<Json<Paginated<SubcontractorWithTrades>>, ApiError> {
    let filter = SubcontractorFilter {
        status: input.status,
        trade_id: input.trade_id,
        search: input.search,
    };
    let page = SubcontractorRepo::new(&state.pool)
        .list(session.tenant.id, filter, input.page.into())
        .await?;
    Ok(Json(page))
}

#[derive(Debug, Serialize)]
pub struct SubcontractorDetail {
    #[serde(flatten)]
    pub subcontractor: SubcontractorWithTrades,
    pub active_tasks: Vec<TaskRecord>,
    pub recent_communications: Vec<CommunicationRecord>,
}

/// POST /rpc/subcontractors.get
async fn get(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<IdInput>,
) -> Result<Json<SubcontractorDetail>, ApiError> {
    let tenant_id = session.tenant.id;
    let subcontractor = SubcontractorRepo::new(&state.pool)
        .get(tenant_id, input.id)
        .await?;

    let tasks = TaskRepo::new(&state.pool);
    let communications = CommunicationRepo::new(&state.pool);
    let (active_tasks, recent_communications) = tokio::try_join!(
        tasks.active_for_subcontractor(tenant_id, input.id, ACTIVE_TASK_LIMIT),
        communications.recent_for_subcontractor(tenant_id, input.id, RECENT_COMMUNICATION_LIMIT),
    )?;

    Ok(Json(SubcontractorDetail {
        subcontractor,
        active_tasks,
        recent_communications,
    }))
}

fn check_coverage(cents: Option<i64>) -> Result<Option<i64>, ValidationError> {
    cents
        .map(|c| non_negative_cents("insurance coverage", c))
        .transpose()
}

fn validate_new(new: NewSubcontractor) -> Result<NewSubcontractor, ValidationError> {
    Ok(NewSubcontractor {
        company_name: DisplayName::new("company name", &new.company_name)?.into_string(),
        contact_name: optional_name("contact name", new.contact_name.as_deref())?,
        contact_email: optional_email(new.contact_email.as_deref())?,
        insurance_coverage_cents: check_coverage(new.insurance_coverage_cents)?,
        ..new
    })
}

fn validate_patch(patch: SubcontractorPatch) -> Result<SubcontractorPatch, ValidationError> {
    Ok(SubcontractorPatch {
        company_name: optional_name("company name", patch.company_name.as_deref())?,
        contact_email: patch
            .contact_email
            .map(|e| optional_email(e.as_deref()))
            .transpose()?,
        insurance_coverage_cents: patch
            .insurance_coverage_cents
            .map(check_coverage)
            .transpose()?,
        ..patch
    })
}

async fn require_trade(state: &AppState, tenant_id: Uuid, trade_id: Uuid) -> Result<(), ApiError> {
    if TradeRepo::new(&state.pool).exists(tenant_id, trade_id).await? {
        Ok(())
    } else {
        Err(ApiError::not_found(format!("trade '{trade_id}' not found")))
    }
}

/// POST /rpc/subcontractors.create
async fn create(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<NewSubcontractor>,
) -> Result<Json<SubcontractorRecord>, ApiError> {
    let new = validate_new(input)?;
    if let Some(trade_id) = new.primary_trade_id {
        require_trade(&state, session.tenant.id, trade_id).await?;
    }

    let subcontractor = SubcontractorRepo::new(&state.pool)
        .create(session.tenant.id, new)
        .await?;
    log_activity(&state, &session, "subcontractor", "created", subcontractor.id).await;
    Ok(Json(subcontractor))
}

/// POST /rpc/subcontractors.update
async fn update(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<UpdateInput<SubcontractorPatch>>,
) -> Result<Json<SubcontractorRecord>, ApiError> {
    let subcontractor = SubcontractorRepo::new(&state.pool)
        .update(session.tenant.id, input.id, validate_patch(input.data)?)
        .await?;
    log_activity(&state, &session, "subcontractor", "updated", subcontractor.id).await;
    Ok(Json(subcontractor))
}

#[derive(Debug, Deserialize)]
pub struct RatingInput {
    pub id: Uuid,
    pub rating: f64,
    pub on_time_percentage: Option<f64>,
    pub quality_score: Option<f64>,
}

impl RatingInput {
    fn validate(&self) -> Result<Rating, ValidationError> {
        Ok(Rating {
            rating: in_range("rating", self.rating, 1.0, 5.0)?,
            on_time_percentage: self
                .on_time_percentage
                .map(|p| in_range("on-time percentage", p, 0.0, 100.0))
                .transpose()?,
            quality_score: self
                .quality_score
                .map(|q| in_range("quality score", q, 0.0, 10.0))
                .transpose()?,
        })
    }
}

/// POST /rpc/subcontractors.update_rating
async fn update_rating(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<RatingInput>,
) -> Result<Json<SubcontractorRecord>, ApiError> {
    let rating = input.validate()?;
    let subcontractor = SubcontractorRepo::new(&state.pool)
        .update_rating(session.tenant.id, input.id, rating)
        .await?;
    log_activity(&state, &session, "subcontractor", "rated", subcontractor.id).await;
    Ok(Json(subcontractor))
}

/// POST /rpc/subcontractors.delete
async fn delete(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<IdInput>,
) -> Result<Json<Success>, ApiError> {
    SubcontractorRepo::new(&state.pool)
        .delete(session.tenant.id, input.id)
        .await?;
    log_activity(&state, &session, "subcontractor", "deleted", input.id).await;
    Ok(Json(Success::ok()))
}

#[derive(Debug, Deserialize)]
pub struct TradeLinkInput {
    pub subcontractor_id: Uuid,
    pub trade_id: Uuid,
    #[serde(default)]
    pub is_primary: bool,
}

/// POST /rpc/subcontractors.add_trade
async fn add_trade(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<TradeLinkInput>,
) -> Result<Json<TradeLink>, ApiError> {
    let tenant_id = session.tenant.id;
    let subcontractors = SubcontractorRepo::new(&state.pool);
    if !subcontractors.exists(tenant_id, input.subcontractor_id).await? {
        return Err(ApiError::not_found(format!(
            "subcontractor '{}' not found",
            input.subcontractor_id
        )));
    }
    require_trade(&state, tenant_id, input.trade_id).await?;

    let link = subcontractors
        .add_trade(input.subcontractor_id, input.trade_id, input.is_primary)
        .await?;
    log_activity(&state, &session, "subcontractor", "trade_added", input.subcontractor_id).await;
    Ok(Json(link))
}

/// POST /rpc/subcontractors.remove_trade
async fn remove_trade(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<TradeLinkInput>,
) -> Result<Json<Success>, ApiError> {
    SubcontractorRepo::new(&state.pool)
        .remove_trade(session.tenant.id, input.subcontractor_id, input.trade_id)
        .await?;
    log_activity(&state, &session, "subcontractor", "trade_removed", input.subcontractor_id).await;
    Ok(Json(Success::ok()))
}

/// Subcontractor routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rpc/subcontractors.list", post(list))
        .route("/rpc/subcontractors.get", post(get))
        .route("/rpc/subcontractors.create", post(create))
        .route("/rpc/subcontractors.update", post(update))
        .route("/rpc/subcontractors.update_rating", post(update_rating))
        .route("/rpc/subcontractors.delete", post(delete))
        .route("/rpc/subcontractors.add_trade", post(add_trade))
        .route("/rpc/subcontractors.remove_trade", post(remove_trade))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rating(json: &str) -> Result<Rating, ValidationError> {
        serde_json::from_str::<RatingInput>(json).unwrap().validate()
    }

    const ID: &str = "00000000-0000-0000-0000-000000000001";

    #[test]
    fn rating_bounds() {
        assert!(rating(&format!(r#"{{"id": "{ID}", "rating": 0.5}}"#)).is_err());
        assert!(rating(&format!(r#"{{"id": "{ID}", "rating": 5.5}}"#)).is_err());
        let ok = rating(&format!(
            r#"{{"id": "{ID}", "rating": 4.5, "on_time_percentage": 92, "quality_score": 8}}"#
        ))
        .unwrap();
        assert_eq!(ok.rating, 4.5);
        assert_eq!(ok.on_time_percentage, Some(92.0));
    }

    #[test]
    fn optional_scores_bounded() {
        assert!(rating(&format!(r#"{{"id": "{ID}", "rating": 3, "on_time_percentage": 101}}"#)).is_err());
        assert!(rating(&format!(r#"{{"id": "{ID}", "rating": 3, "quality_score": 11}}"#)).is_err());
        let unset = rating(&format!(r#"{{"id": "{ID}", "rating": 3}}"#)).unwrap();
        assert_eq!(unset.quality_score, None);
    }

    #[test]
    fn new_subcontractor_validated() {
        let new: NewSubcontractor = serde_json::from_str(
            r#"{"company_name": " Sparks Electric ", "contact_email": "Ops@Sparks.io"}"#,
        )
        .unwrap();
        let new = validate_new(new).unwrap();
        assert_eq!(new.company_name, "Sparks Electric");
        assert_eq!(new.contact_email.as_deref(), Some("ops@sparks.io"));

        let bad: NewSubcontractor = serde_json::from_str(
            r#"{"company_name": "Sparks", "insurance_coverage_cents": -5}"#,
        )
        .unwrap();
        assert!(validate_new(bad).is_err());
    }

    #[test]
    fn trade_link_defaults_to_secondary() {
        let input: TradeLinkInput = serde_json::from_str(&format!(
            r#"{{"subcontractor_id": "{ID}", "trade_id": "{ID}"}}"#
        ))
        .unwrap();
        assert!(!input.is_primary);
    }
}
