use super::super::{ApiError, ApiState};
use super::maintenance_handlers::{cron_failure, cron_unauthorized, has_valid_api_key, CronResponse};
use crate::services::price_service::PriceService;
use crate::types::*;
use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{error, info};

pub const MAX_SYMBOLS_PER_REQUEST: usize = 50;

#[derive(Debug, Deserialize)]
pub struct PricesQuery {
    pub symbols: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub days: Option<i64>,
    pub limit: Option<i64>,
}

/// Splits a comma-separated list into trimmed, upper-cased symbols.
pub fn parse_symbols(raw: Option<&str>) -> Result<Vec<String>, ApiError> {
    let raw = raw.ok_or_else(|| ApiError::bad_request("symbols parameter required (comma-separated)"))?;

    let symbols: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();

    if symbols.is_empty() {
        return Err(ApiError::bad_request("At least one symbol required"));
    }
    if symbols.len() > MAX_SYMBOLS_PER_REQUEST {
        return Err(ApiError::bad_request(format!(
            "Maximum {} symbols allowed per request",
            MAX_SYMBOLS_PER_REQUEST
        )));
    }
    Ok(symbols)
}

// GET /api/prices?symbols=BTC,ETH
pub async fn get_prices(
    query: Result<Query<PricesQuery>, QueryRejection>,
    State(state): State<ApiState>,
) -> Result<Json<Value>, ApiError> {
    let Query(params) = query?;
    let symbols = parse_symbols(params.symbols.as_deref())?;

    let data: BTreeMap<String, PriceQuote> = state.prices.get_prices(&symbols).await.into_iter().collect();
    let count = data.len();

    Ok(Json(json!({ "success": true, "data": data, "count": count })))
}

pub async fn get_price(
    Path(symbol): Path<String>,
    State(state): State<ApiState>,
) -> Result<Json<ApiResponse<PriceQuote>>, ApiError> {
    let symbol = symbol.trim().to_uppercase();

    match state.prices.get_price(&symbol).await {
        Some(quote) => Ok(Json(ApiResponse::ok(quote))),
        None => Err(ApiError::not_found(format!("Price not found for symbol: {}", symbol))),
    }
}

pub async fn get_coin_details(
    Path(symbol): Path<String>,
    State(state): State<ApiState>,
) -> Result<Json<ApiResponse<PriceQuote>>, ApiError> {
    let symbol = symbol.trim().to_uppercase();

    match state.prices.get_coin_details(&symbol).await {
        Some(quote) => Ok(Json(ApiResponse::ok(quote))),
        None => Err(ApiError::not_found(format!("Coin details not found for symbol: {}", symbol))),
    }
}

pub async fn get_price_history(
    Path(symbol): Path<String>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
    State(state): State<ApiState>,
) -> Result<Json<ApiResponse<Vec<PriceHistory>>>, ApiError> {
    let Query(params) = query?;
    let symbol = symbol.trim().to_uppercase();
    let days = params.days.unwrap_or(7).clamp(1, 365);
    let limit = params.limit.unwrap_or(100).clamp(1, 1000);

    let history = state.store.get_price_history(&symbol, days, limit).await?;
    Ok(Json(ApiResponse::ok(history)))
}

/// Symbols named in the body, or the default list when the body is absent,
/// unparseable or empty.
fn requested_symbols(body: &[u8]) -> Vec<String> {
    serde_json::from_slice::<PriceUpdateBody>(body)
        .ok()
        .and_then(|b| b.symbols)
        .map(|symbols| {
            symbols
                .iter()
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|symbols| !symbols.is_empty())
        .unwrap_or_else(PriceService::default_symbols)
}

// POST /api/prices/update (cron)
pub async fn update_prices(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> CronResponse {
    if !has_valid_api_key(&state, &headers) {
        return cron_unauthorized(&["updated", "failed"]);
    }

    let symbols = requested_symbols(&body);
    let summary = state.price_service().update_prices(&symbols).await;

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "updated": summary.updated,
            "failed": summary.failed,
            "message": format!("Updated {} prices, {} failed", summary.updated, summary.failed),
        })),
    )
}

// POST /api/prices/alerts (cron)
pub async fn check_price_alerts(State(state): State<ApiState>, headers: HeaderMap) -> CronResponse {
    if !has_valid_api_key(&state, &headers) {
        return cron_unauthorized(&["triggered"]);
    }

    match state.store.check_and_trigger_price_alerts().await {
        Ok(triggered) => {
            info!("🔔 Triggered {} price alerts", triggered);
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "triggered": triggered,
                    "message": format!("Triggered {} price alerts", triggered),
                })),
            )
        }
        Err(e) => {
            error!("❌ Failed to check price alerts: {}", e);
            cron_failure(StatusCode::INTERNAL_SERVER_ERROR, &["triggered"], "Internal server error")
        }
    }
}
