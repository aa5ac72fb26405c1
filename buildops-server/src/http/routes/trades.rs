//! `trades.*` procedures: the workspace trade catalogue

use std::sync::Arc;

use axum::extract::State;
use axum::{routing::post, Json, Router};

use super::{IdInput, Success, UpdateInput};
use crate::db::repos::trades::{NewTrade, TradeDetail, TradePatch};
use crate::db::repos::{TradeRecord, TradeRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{Authed, Input};
use crate::models::{in_range, optional_name, DisplayName, ValidationError};
use crate::state::AppState;

fn check_duration(days: Option<i32>) -> Result<Option<i32>, ValidationError> {
    if let Some(d) = days {
        in_range("typical duration", f64::from(d), 0.0, 3650.0)?;
    }
    Ok(days)
}

/// POST /rpc/trades.list
async fn list(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
) -> Result<Json<Vec<TradeRecord>>, ApiError> {
    let trades = TradeRepo::new(&state.pool).list(session.tenant.id).await?;
    Ok(Json(trades))
}

/// POST /rpc/trades.get
async fn get(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<IdInput>,
) -> Result<Json<TradeDetail>, ApiError> {
    let trade = TradeRepo::new(&state.pool)
        .get(session.tenant.id, input.id)
        .await?;
    Ok(Json(trade))
}

/// POST /rpc/trades.create
async fn create(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<NewTrade>,
) -> Result<Json<TradeRecord>, ApiError> {
    let new = NewTrade {
        name: DisplayName::new("trade name", &input.name)?.into_string(),
        typical_duration_days: check_duration(input.typical_duration_days)?,
        ..input
    };
    let trade = TradeRepo::new(&state.pool)
        .create(session.tenant.id, new)
        .await?;
    tracing::debug!(trade = %trade.name, category = %trade.category, "trade added");
    Ok(Json(trade))
}

/// POST /rpc/trades.update
async fn update(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<UpdateInput<TradePatch>>,
) -> Result<Json<TradeRecord>, ApiError> {
    let data = input.data;
    let patch = TradePatch {
        name: optional_name("trade name", data.name.as_deref())?,
        typical_duration_days: data
            .typical_duration_days
            .map(check_duration)
            .transpose()?,
        ..data
    };
    let trade = TradeRepo::new(&state.pool)
        .update(session.tenant.id, input.id, patch)
        .await?;
    Ok(Json(trade))
}

/// POST /rpc/trades.delete
async fn delete(
    State(state): State<Arc<AppState>>,
    Authed(session): Authed,
    Input(input): Input<IdInput>,
) -> Result<Json<Success>, ApiError> {
    TradeRepo::new(&state.pool)
        .delete(session.tenant.id, input.id)
        .await?;
    Ok(Json(Success::ok()))
}

/// Trade routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rpc/trades.list", post(list))
        .route("/rpc/trades.get", post(get))
        .route("/rpc/trades.create", post(create))
        .route("/rpc/trades.update", post(update))
        .route("/rpc/trades.delete", post(delete))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_in_days_bounded() {
        assert!(check_duration(Some(-1)).is_err());
        assert!(check_duration(Some(4000)).is_err());
        assert_eq!(check_duration(Some(14)).unwrap(), Some(14));
    }

    #[test]
    fn patch_can_clear_description() {
        let input: UpdateInput<TradePatch> = serde_json::from_str(
            r#"{"id": "00000000-0000-0000-0000-000000000001", "data": {"description": null}}"#,
        )
        .unwrap();
        assert_eq!(input.data.description, Some(None));
        assert_eq!(input.data.name, None);
    }
}
