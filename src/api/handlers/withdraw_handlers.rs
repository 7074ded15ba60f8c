use super::super::{ApiError, ApiState};
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
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct WithdrawalListQuery {
    pub limit: Option<i64>,
}

// POST /api/withdraw
// The body is taken raw so authentication runs before any parsing.
pub async fn create_withdrawal(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<WithdrawalReceipt>>), ApiError> {
    let receipt = state.withdrawals().commit(&headers, &body).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(receipt).with_message("Withdrawal request created successfully")),
    ))
}

pub async fn list_withdrawals(
    query: Result<Query<WithdrawalListQuery>, QueryRejection>,
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<WithdrawalRequest>>>, ApiError> {
    let user = state.current_user(&headers).await?;
    let Query(params) = query?;
    let limit = params.limit.unwrap_or(50).clamp(1, 200);

    let requests = state.store.get_withdrawal_requests(user.id, limit).await?;
    Ok(Json(ApiResponse::ok(requests)))
}

pub async fn get_withdrawal(
    path: Result<Path<Uuid>, PathRejection>,
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<WithdrawalRequest>>, ApiError> {
    let user = state.current_user(&headers).await?;
    let Path(id) = path?;

    match state.store.get_withdrawal_request(id).await? {
        Some(request) if request.user_id == user.id => Ok(Json(ApiResponse::ok(request))),
        _ => Err(ApiError::not_found("Withdrawal request not found")),
    }
}
