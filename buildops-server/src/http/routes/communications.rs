//! `communications.*` procedures: call, SMS and email log

use std::sync::Arc;

use axum::extract::State;
use axum::{routing::post, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{log_activity, IdInput, Refs, Success, UpdateInput};
use crate::db::repos::communications::{
    CommunicationDetail, CommunicationPatch, CommunicationStats, CommunicationWithRefs,
    NewCommunication, NewTranscription,
};
use crate::db::repos::{
    CommunicationFilter, CommunicationRecord, CommunicationRepo, TranscriptionRecord,
};
use crate::http::error::ApiError;
use crate::http::extractors::{Authed, Input};
use crate::models::{
    bounded_text, in_range, optional_email, CommunicationStatus, CommunicationType, Paginated,
    PaginationParams, ValidationError,
};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListInput {
    #[serde(flatten)]
    pub page: PaginationParams,
    #[serde(rename = "type")]
    pub kind: Option<CommunicationType>,
    pub status: Option<CommunicationStatus>,
    #[serde(default)]
    pub urgent: bool,
    pub project_id: Option<Uuid>,
    pub homeowner_id: Option<Uuid>,
    pub subcontractor_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommunicationPage {
    #[serde(flatten)]
    pub page: Paginated<CommunicationWithRefs>,
    /// Urgent items across the whole workspace, ignoring filters
    pub urgent_count: i64,
}

/// POST /rpc/communications.list
async fn list(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<ListInput>,
) -> Result<Json<CommunicationPage>, ApiError> {
    let filter = CommunicationFilter {
        kind: input.kind,
        status: input.status,
        urgent: input.urgent,
        project_id: input.project_id,
        homeowner_id: input.homeowner_id,
        subcontractor_id: input.subcontractor_id,
        start_date: input.start_date,
        end_date: input.end_date,
        search: input.search,
    };
    let (page, urgent_count) = CommunicationRepo::new(&state.pool)
        .list(session.tenant.id, filter, input.page.into())
        .await?;
    Ok(Json(CommunicationPage { page, urgent_count }))
}

/// POST /rpc/communications.get
async fn get(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<IdInput>,
) -> Result<Json<CommunicationDetail>, ApiError> {
    let detail = CommunicationRepo::new(&state.pool)
        .get(session.tenant.id, input.id)
        .await?;
    Ok(Json(detail))
}

fn validate_new(new: NewCommunication) -> Result<NewCommunication, ValidationError> {
    if let Some(seconds) = new.duration_seconds {
        in_range("duration", f64::from(seconds), 0.0, f64::from(i32::MAX))?;
    }
    Ok(NewCommunication {
        from_email: optional_email(new.from_email.as_deref())?,
        to_email: optional_email(new.to_email.as_deref())?,
        ..new
    })
}

/// POST /rpc/communications.create
async fn create(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<NewCommunication>,
) -> Result<Json<CommunicationRecord>, ApiError> {
    let new = validate_new(input)?;
    Refs {
        homeowner: new.homeowner_id,
        project: new.project_id,
        subcontractor: new.subcontractor_id,
        ..Default::default()
    }
    .check(&state, session.tenant.id)
    .await?;

    let communication = CommunicationRepo::new(&state.pool)
        .create(session.tenant.id, session.user.id, new)
        .await?;
    log_activity(&state, &session, "communication", "created", communication.id).await;
    Ok(Json(communication))
}

/// POST /rpc/communications.update
async fn update(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<UpdateInput<CommunicationPatch>>,
) -> Result<Json<CommunicationRecord>, ApiError> {
    let patch = input.data;
    Refs {
        homeowner: patch.homeowner_id.flatten(),
        project: patch.project_id.flatten(),
        subcontractor: patch.subcontractor_id.flatten(),
        ..Default::default()
    }
    .check(&state, session.tenant.id)
    .await?;

    let communication = CommunicationRepo::new(&state.pool)
        .update(session.tenant.id, input.id, patch)
        .await?;
    log_activity(&state, &session, "communication", "updated", communication.id).await;
    Ok(Json(communication))
}

/// POST /rpc/communications.mark_followed_up
async fn mark_followed_up(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<IdInput>,
) -> Result<Json<CommunicationRecord>, ApiError> {
    let communication = CommunicationRepo::new(&state.pool)
        .mark_followed_up(session.tenant.id, input.id)
        .await?;
    log_activity(&state, &session, "communication", "followed_up", communication.id).await;
    Ok(Json(communication))
}

#[derive(Debug, Deserialize)]
pub struct AddTranscriptionInput {
    pub communication_id: Uuid,
    #[serde(flatten)]
    pub transcription: NewTranscription,
}

fn validate_transcription(new: NewTranscription) -> Result<NewTranscription, ValidationError> {
    if let Some(confidence) = new.confidence {
        in_range("confidence", confidence, 0.0, 1.0)?;
    }
    for (field, value) in [("start", new.start_seconds), ("end", new.end_seconds)] {
        if let Some(seconds) = value {
            in_range(field, seconds, 0.0, f64::MAX)?;
        }
    }
    Ok(NewTranscription {
        speaker: bounded_text("speaker", &new.speaker, 1, 100)?,
        text: bounded_text("text", &new.text, 1, 20_000)?,
        ..new
    })
}

/// POST /rpc/communications.add_transcription
async fn add_transcription(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<AddTranscriptionInput>,
) -> Result<Json<TranscriptionRecord>, ApiError> {
    let transcription = validate_transcription(input.transcription)?;
    let communications = CommunicationRepo::new(&state.pool);
    if !communications
        .exists(session.tenant.id, input.communication_id)
        .await?
    {
        return Err(ApiError::not_found(format!(
            "communication '{}' not found",
            input.communication_id
        )));
    }

    let record = communications
        .add_transcription(input.communication_id, transcription)
        .await?;
    Ok(Json(record))
}

/// POST /rpc/communications.delete
async fn delete(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<IdInput>,
) -> Result<Json<Success>, ApiError> {
    CommunicationRepo::new(&state.pool)
        .delete(session.tenant.id, input.id)
        .await?;
    log_activity(&state, &session, "communication", "deleted", input.id).await;
    Ok(Json(Success::ok()))
}

/// POST /rpc/communications.stats
async fn stats(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
) -> Result<Json<CommunicationStats>, ApiError> {
    let stats = CommunicationRepo::new(&state.pool)
        .stats(session.tenant.id)
        .await?;
    Ok(Json(stats))
}

/// Communication routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rpc/communications.list", post(list))
        .route("/rpc/communications.get", post(get))
        .route("/rpc/communications.create", post(create))
        .route("/rpc/communications.update", post(update))
        .route("/rpc/communications.mark_followed_up", post(mark_followed_up))
        .route("/rpc/communications.add_transcription", post(add_transcription))
        .route("/rpc/communications.delete", post(delete))
        .route("/rpc/communications.stats", post(stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_filter_uses_type_key() {
        let input: ListInput =
            serde_json::from_str(r#"{"type": "call_missed", "urgent": true}"#).unwrap();
        assert_eq!(input.kind, Some(CommunicationType::CallMissed));
        assert!(input.urgent);
        let empty: ListInput = serde_json::from_str("{}").unwrap();
        assert!(!empty.urgent);
    }

    #[test]
    fn transcription_confidence_bounded() {
        let input: AddTranscriptionInput = serde_json::from_str(
            r#"{"communication_id": "00000000-0000-0000-0000-000000000001",
                "speaker": "caller", "text": "Water in the basement", "confidence": 1.4}"#,
        )
        .unwrap();
        assert!(validate_transcription(input.transcription).is_err());
    }

    #[test]
    fn transcription_text_trimmed() {
        let input: AddTranscriptionInput = serde_json::from_str(
            r#"{"communication_id": "00000000-0000-0000-0000-000000000001",
                "speaker": " agent ", "text": "Scheduling the inspection", "keywords": ["inspection"]}"#,
        )
        .unwrap();
        let t = validate_transcription(input.transcription).unwrap();
        assert_eq!(t.speaker, "agent");
        assert_eq!(t.keywords, vec!["inspection"]);
    }
}
