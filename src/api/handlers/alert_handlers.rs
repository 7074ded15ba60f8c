use super::super::error::parse_body;
use super::super::{ApiError, ApiState};
use crate::services::price_service::is_supported;
use crate::types::*;
use axum::{
    body::Bytes,
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct AlertListQuery {
    pub active_only: Option<bool>,
}

pub async fn list_alerts(
    query: Result<Query<AlertListQuery>, QueryRejection>,
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<PriceAlert>>>, ApiError> {
    let user = state.current_user(&headers).await?;
    let Query(params) = query?;
    let alerts = state
        .store
        .get_user_price_alerts(user.id, params.active_only.unwrap_or(true))
        .await?;
    Ok(Json(ApiResponse::ok(alerts)))
}

pub async fn create_alert(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<PriceAlert>>), ApiError> {
    let user = state.current_user(&headers).await?;
    let body: CreateAlertBody = parse_body(&body)?;

    let symbol = body.symbol.trim().to_uppercase();
    if !is_supported(&symbol) {
        return Err(ApiError::bad_request(format!("Unsupported symbol: {}", symbol)));
    }
    if body.target_price <= Decimal::ZERO {
        return Err(ApiError::bad_request("Target price must be positive"));
    }

    let alert = state
        .store
        .create_price_alert(&NewPriceAlert {
            user_id: user.id,
            symbol,
            alert_type: body.alert_type,
            target_price: body.target_price,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(alert))))
}

pub async fn delete_alert(
    path: Result<Path<Uuid>, PathRejection>,
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Uuid>>, ApiError> {
    let user = state.current_user(&headers).await?;
    let Path(alert_id) = path?;

    if state.store.delete_price_alert(alert_id, user.id).await? {
        Ok(Json(ApiResponse::ok(alert_id).with_message("Alert deleted")))
    } else {
        Err(ApiError::not_found("Alert not found"))
    }
}
