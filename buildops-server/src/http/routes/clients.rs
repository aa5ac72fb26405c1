//! `clients.*` procedures: companies the workspace sells to

use std::sync::Arc;

use axum::extract::State;
use axum::{routing::post, Json, Router};
use serde::Deserialize;

use super::{log_activity, IdInput, Success, UpdateInput};
use crate::db::repos::clients::{ClientPatch, NewClient};
use crate::db::repos::{ClientFilter, ClientRecord, ClientRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{Authed, Input};
use crate::models::{
    optional_name, optional_url, ClientStatus, DisplayName, Email, Paginated, PaginationParams,
    ValidationError,
};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListInput {
    #[serde(flatten)]
    pub page: PaginationParams,
    pub status: Option<ClientStatus>,
    pub search: Option<String>,
}

/// POST /rpc/clients.list
async fn list(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<ListInput>,
) -> Result<Json<Paginated<ClientRecord>>, ApiError> {
    let filter = ClientFilter {
        status: input.status,
        search: input.search,
    };
    let page = ClientRepo::new(&state.pool)
        .list(session.tenant.id, filter, input.page.into())
        .await?;
    Ok(Json(page))
}

/// POST /rpc/clients.get
async fn get(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<IdInput>,
) -> Result<Json<ClientRecord>, ApiError> {
    let client = ClientRepo::new(&state.pool)
        .get(session.tenant.id, input.id)
        .await?;
    Ok(Json(client))
}

fn validate_new(new: NewClient) -> Result<NewClient, ValidationError> {
    Ok(NewClient {
        company_name: DisplayName::new("company name", &new.company_name)?.into_string(),
        contact_name: DisplayName::new("contact name", &new.contact_name)?.into_string(),
        email: Email::new(&new.email)?.into_string(),
        website: optional_url("website", new.website.as_deref())?,
        ..new
    })
}

fn validate_patch(patch: ClientPatch) -> Result<ClientPatch, ValidationError> {
    Ok(ClientPatch {
        company_name: optional_name("company name", patch.company_name.as_deref())?,
        contact_name: optional_name("contact name", patch.contact_name.as_deref())?,
        email: patch
            .email
            .map(|e| Email::new(&e).map(Email::into_string))
            .transpose()?,
        website: patch
            .website
            .map(|w| optional_url("website", w.as_deref()))
            .transpose()?,
        ..patch
    })
}

/// POST /rpc/clients.create
async fn create(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<NewClient>,
) -> Result<Json<ClientRecord>, ApiError> {
    let client = ClientRepo::new(&state.pool)
        .create(session.tenant.id, validate_new(input)?)
        .await?;
    log_activity(&state, &session, "client", "created", client.id).await;
    Ok(Json(client))
}

/// POST /rpc/clients.update
async fn update(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<UpdateInput<ClientPatch>>,
) -> Result<Json<ClientRecord>, ApiError> {
    let client = ClientRepo::new(&state.pool)
        .update(session.tenant.id, input.id, validate_patch(input.data)?)
        .await?;
    log_activity(&state, &session, "client", "updated", client.id).await;
    Ok(Json(client))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusInput {
    pub id: uuid::Uuid,
    pub status: ClientStatus,
}

/// POST /rpc/clients.update_status
async fn update_status(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<UpdateStatusInput>,
) -> Result<Json<ClientRecord>, ApiError> {
    let client = ClientRepo::new(&state.pool)
        .update_status(session.tenant.id, input.id, input.status)
        .await?;
    log_activity(&state, &session, "client", "status_changed", client.id).await;
    Ok(Json(client))
}

/// POST /rpc/clients.delete
async fn delete(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<IdInput>,
) -> Result<Json<Success>, ApiError> {
    ClientRepo::new(&state.pool)
        .delete(session.tenant.id, input.id)
        .await?;
    log_activity(&state, &session, "client", "deleted", input.id).await;
    Ok(Json(Success::ok()))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rpc/clients.list", post(list))
        .route("/rpc/clients.get", post(get))
        .route("/rpc/clients.create", post(create))
        .route("/rpc/clients.update", post(update))
        .route("/rpc/clients.update_status", post(update_status))
        .route("/rpc/clients.delete", post(delete))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> NewClient {
        NewClient {
            company_name: " Acme Roofing ".into(),
            contact_name: "Dana Ruiz".into(),
            email: "Dana@Acme.TEST".into(),
            website: Some(String::new()),
            ..Default::default()
        }
    }

    #[test]
    fn new_client_is_normalised() {
        let new = validate_new(acme()).unwrap();
        assert_eq!(new.company_name, "Acme Roofing");
        assert_eq!(new.email, "dana@acme.test");
        assert_eq!(new.website, None);
    }

    #[test]
    fn new_client_requires_an_email() {
        let result = validate_new(NewClient {
            email: "not-an-email".into(),
            ..acme()
        });
        assert!(result.is_err());
    }

    #[test]
    fn patch_validates_only_what_it_touches() {
        let patch: ClientPatch =
            serde_json::from_str(r#"{"website": "notaurl", "notes": null}"#).unwrap();
        assert!(validate_patch(patch).is_err());

        let patch: ClientPatch = serde_json::from_str(r#"{"contact_name": " Lee Chen "}"#).unwrap();
        let patch = validate_patch(patch).unwrap();
        assert_eq!(patch.contact_name.as_deref(), Some("Lee Chen"));
        assert_eq!(patch.email, None);
    }

    #[test]
    fn list_input_takes_status_filter() {
        let input: ListInput =
            serde_json::from_str(r#"{"status": "churned", "page_size": 5}"#).unwrap();
        assert_eq!(input.status, Some(ClientStatus::Churned));
        assert_eq!(input.page.page_size, Some(5));
    }
}
