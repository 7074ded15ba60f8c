use super::super::error::parse_body;
use super::super::{ApiError, ApiState};
use crate::error::PersistenceError;
use crate::services::wallet_service;
use crate::types::*;
use axum::{
    body::Bytes,
    extract::{rejection::PathRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use uuid::Uuid;

pub async fn list_wallets(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<Wallet>>>, ApiError> {
    let user = state.current_user(&headers).await?;
    let wallets = state.store.get_user_wallets(user.id).await?;
    Ok(Json(ApiResponse::ok(wallets)))
}

// POST /api/wallets/verify
pub async fn verify_wallet(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<Wallet>>), ApiError> {
    let user = state.current_user(&headers).await?;
    let body: WalletVerifyBody = parse_body(&body)?;
    let wallet = wallet_service::register_verified_wallet(state.store.as_ref(), user.id, &body).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(wallet).with_message("Wallet verified")),
    ))
}

pub async fn disconnect_wallet(
    path: Result<Path<Uuid>, PathRejection>,
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Wallet>>, ApiError> {
    let user = state.current_user(&headers).await?;
    let Path(wallet_id) = path?;

    match wallet_service::disconnect_wallet(state.store.as_ref(), user.id, wallet_id).await {
        Ok(wallet) => Ok(Json(ApiResponse::ok(wallet).with_message("Wallet disconnected"))),
        Err(PersistenceError::NotFound { .. }) => Err(ApiError::not_found("Wallet not found")),
        Err(e) => Err(e.into()),
    }
}
